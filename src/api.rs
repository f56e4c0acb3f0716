use crate::{
    boxes::{BoxRef, NodeKind},
    error::{PatchError, Result},
    ilst::Tag,
    known_boxes::KnownBox,
    offsets::OffsetTable,
    options::WriteOptions,
    patcher::ContainerPatcher,
    plan::{Decision, RewritePlan},
    tree::BoxTree,
    util::read_slice,
};
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

/// Rewrite `source` into `destination` with `tag`, using default options.
///
/// See [`ContainerPatcher::rewrite`].
pub fn rewrite<R, W>(tag: &Tag, source: R, destination: W) -> Result<()>
where
    R: Read + Seek,
    W: Read + Write + Seek,
{
    ContainerPatcher::default().rewrite(tag, source, destination)
}

/// Rewrite `source` into `destination` with every tag item removed.
pub fn clear<R, W>(source: R, destination: W) -> Result<()>
where
    R: Read + Seek,
    W: Read + Write + Seek,
{
    ContainerPatcher::default().clear(source, destination)
}

/// The tag currently stored in the file; empty when there is no `ilst`.
pub fn read_tag<R: Read + Seek>(r: &mut R) -> Result<Tag> {
    let tree = BoxTree::read(r)?;
    let Some(ilst) = &tree.ilst else {
        return Ok(Tag::new());
    };
    let bytes = read_slice(r, ilst.start, ilst.end(tree.file_len) - ilst.start)?;
    Ok(Tag::from_ilst(&bytes)?)
}

/// Replace the tag of the file at `path`.
///
/// The new file is written next to the original and only renamed over it once
/// it has passed verification; on any error the original is left as it was.
///
/// ```no_run
/// use mp4patch::{Tag, WriteOptions, ilst::keys, write_tag};
///
/// let mut tag = Tag::new();
/// tag.set_text(keys::TITLE, "Intro");
/// write_tag("song.m4a", &tag, &WriteOptions::default())?;
/// # Ok::<(), mp4patch::PatchError>(())
/// ```
pub fn write_tag(path: impl AsRef<Path>, tag: &Tag, options: &WriteOptions) -> Result<()> {
    write_ilst(path, &tag.to_ilst(), options)
}

/// Like [`write_tag`], with an already serialized `ilst` box.
pub fn write_ilst(path: impl AsRef<Path>, ilst: &[u8], options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let source = File::open(path)?;
    let permissions = source.metadata()?.permissions();
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;

    ContainerPatcher::new(options.clone()).rewrite_ilst(ilst, source, temp.as_file_mut())?;
    temp.as_file().set_permissions(permissions)?;
    temp.persist(path).map_err(|e| PatchError::Io(e.error))?;
    tracing::debug!(path = %path.display(), "replaced original file");
    Ok(())
}

pub fn clear_tag(path: impl AsRef<Path>, options: &WriteOptions) -> Result<()> {
    write_tag(path, &Tag::new(), options)
}

/// What a rewrite with `tag` would do, without writing anything.
#[derive(Debug, Serialize)]
pub struct PlanSummary {
    pub decision: Decision,
    /// How far `mdat` would move.
    pub payload_shift: i64,
    pub input_len: u64,
    pub output_len: u64,
}

pub fn preview<R: Read + Seek>(r: &mut R, tag: &Tag) -> Result<PlanSummary> {
    let tree = BoxTree::read(r)?;
    let plan = RewritePlan::build(&tree, &tag.to_ilst())?;
    Ok(PlanSummary {
        decision: plan.decision,
        payload_shift: plan.payload_shift,
        input_len: tree.file_len,
        output_len: plan.output_len,
    })
}

/// A JSON-serializable view of one box, as shown by `mp4tag inspect`.
#[derive(Debug, Serialize)]
pub struct Box {
    /// Absolute byte offset of this box in the file
    pub offset: u64,
    /// Total size including header, 0 when the box runs to the end of its parent
    pub size: u64,
    pub header_size: u64,
    /// Four-character box type code (e.g., "moov", "©nam")
    pub typ: String,
    /// Human-readable box type name (e.g., "Movie Box")
    pub full_name: String,
    pub children: Option<Vec<Box>>,
}

/// Where the patcher's landmarks are in a file.
#[derive(Debug, Serialize)]
pub struct Layout {
    pub file_len: u64,
    pub boxes: Vec<Box>,
    pub metadata_region: Option<(u64, u64)>,
    pub meta_padding: Option<u64>,
    pub usable_top_padding: Option<u64>,
    pub payload: (u64, u64),
    pub offset_tables: Vec<OffsetTable>,
}

pub fn inspect<R: Read + Seek>(r: &mut R) -> Result<Layout> {
    let tree = BoxTree::read(r)?;
    Ok(Layout {
        file_len: tree.file_len,
        boxes: tree.top.iter().map(build_box).collect(),
        metadata_region: tree.ilst.as_ref().map(|h| (h.start, h.size)),
        meta_padding: tree.meta_padding.as_ref().map(|h| h.size),
        usable_top_padding: tree.usable_top_padding().map(|h| h.size),
        payload: (tree.mdat.start, tree.mdat.size),
        offset_tables: tree.offset_tables.clone(),
    })
}

fn build_box(b: &BoxRef) -> Box {
    let hdr = &b.hdr;
    let children = match &b.kind {
        NodeKind::Container(kids) => Some(kids.iter().map(build_box).collect()),
        NodeKind::Leaf { .. } => None,
    };
    Box {
        offset: hdr.start,
        size: hdr.size,
        header_size: hdr.header_size,
        typ: hdr.typ.to_string(),
        full_name: KnownBox::from(hdr.typ).full_name().to_string(),
        children,
    }
}
