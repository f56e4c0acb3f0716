pub mod api;
pub mod atoms;
pub mod boxes;
pub mod error;
pub mod ilst;
pub mod known_boxes;
pub mod offsets;
pub mod options;
pub mod parser;
pub mod patcher;
pub mod plan;
pub mod tree;
pub mod util;
pub mod verify;

pub use api::{
    PlanSummary, clear, clear_tag, inspect, preview, read_tag, rewrite, write_ilst, write_tag,
};
pub use boxes::{BoxHeader, BoxRef, FourCC, NodeKind};
pub use error::{PatchError, VerifyFailure};
pub use ilst::{ItemKey, ItemValue, Tag, TagItem};
pub use offsets::OffsetTable;
pub use options::WriteOptions;
pub use parser::{parse_children, read_box_header};
pub use patcher::ContainerPatcher;
pub use plan::{MissingStructure, RewritePlan, Strategy};
pub use tree::BoxTree;
pub use verify::WriteVerifier;
