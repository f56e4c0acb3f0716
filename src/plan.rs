//! Size classification and the immutable rewrite plan.
//!
//! A plan is the whole rewrite expressed as an ordered list of [`Edit`]s over
//! the source file: every byte outside an edit is copied verbatim, every edit
//! replaces `start..end` of the source with its bytes (an empty range is an
//! insertion, empty bytes a deletion).

use crate::atoms::{self, HEADER_LEN};
use crate::boxes::BoxHeader;
use crate::error::{PatchError, Result};
use crate::tree::BoxTree;
use serde::Serialize;
use std::cmp::Ordering;

/// Which part of the `udta/meta/hdlr` skeleton has to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MissingStructure {
    /// No `udta`: a full `udta/meta/hdlr/ilst` chain is appended to `moov`.
    UserData,
    /// `udta` without `meta`: `meta/hdlr/ilst` is put in front of its children.
    Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    Equal,
    ShrinkWithPadding,
    ShrinkNewPadding,
    ShrinkNoPadding,
    GrowWithPadding,
    GrowOverflowTopPaddingFits,
    GrowOverflowTopPaddingExact,
    GrowOverflowMustMove,
    GrowMissingStructure(MissingStructure),
}

/// What happens between the end of `moov` and `mdat` once `moov` has grown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TopLevel {
    ShrinkPadding,
    DropPadding,
    MovePayload,
}

/// The numbers classification depends on, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizes {
    /// Bytes currently occupied by the region being replaced, 0 for an insertion.
    pub old_region: u64,
    /// Bytes of the replacement: the new `ilst`, or the synthesized skeleton.
    pub new_region: u64,
    /// Size of the padding box right after `ilst`, if any.
    pub meta_padding: Option<u64>,
    pub missing: Option<MissingStructure>,
    /// Size of the top-level padding box usable for growth, if any.
    pub top_padding: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub strategy: Strategy,
    /// Applied to every header of the ancestor chain.
    pub ancestor_delta: i64,
    pub top_level: Option<TopLevel>,
}

pub fn classify(s: &Sizes) -> Decision {
    let h = HEADER_LEN as i64;
    let top_level_for = |overflow: i64| match s.top_padding {
        Some(size) if size as i64 >= overflow + h => TopLevel::ShrinkPadding,
        Some(size) if size as i64 == overflow => TopLevel::DropPadding,
        _ => TopLevel::MovePayload,
    };

    if let Some(kind) = s.missing {
        let overflow = s.new_region as i64 - s.old_region as i64;
        return Decision {
            strategy: Strategy::GrowMissingStructure(kind),
            ancestor_delta: overflow,
            top_level: Some(top_level_for(overflow)),
        };
    }

    match s.new_region.cmp(&s.old_region) {
        Ordering::Equal => Decision { strategy: Strategy::Equal, ancestor_delta: 0, top_level: None },
        Ordering::Less => {
            let saved = s.old_region - s.new_region;
            let (strategy, ancestor_delta) = if s.meta_padding.is_some() {
                (Strategy::ShrinkWithPadding, 0)
            } else if saved > HEADER_LEN {
                (Strategy::ShrinkNewPadding, 0)
            } else {
                (Strategy::ShrinkNoPadding, -(saved as i64))
            };
            Decision { strategy, ancestor_delta, top_level: None }
        }
        Ordering::Greater => {
            let extra = s.new_region - s.old_region;
            if let Some(pad) = s.meta_padding {
                if pad >= extra + HEADER_LEN || pad == extra {
                    return Decision { strategy: Strategy::GrowWithPadding, ancestor_delta: 0, top_level: None };
                }
            }
            // padding after ilst is used up entirely; may leave overflow in -7..0
            let overflow = extra as i64 - s.meta_padding.unwrap_or(0) as i64;
            let top = top_level_for(overflow);
            let strategy = match top {
                TopLevel::ShrinkPadding => Strategy::GrowOverflowTopPaddingFits,
                TopLevel::DropPadding => Strategy::GrowOverflowTopPaddingExact,
                TopLevel::MovePayload => Strategy::GrowOverflowMustMove,
            };
            Decision { strategy, ancestor_delta: overflow, top_level: Some(top) }
        }
    }
}

/// `moov`, then `udta` and `meta` when they exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorChain(Vec<BoxHeader>);

impl AncestorChain {
    pub fn from_tree(tree: &BoxTree) -> Self {
        let mut chain = vec![tree.moov.clone()];
        chain.extend(tree.udta.clone());
        if tree.udta.is_some() {
            chain.extend(tree.meta.clone());
        }
        AncestorChain(chain)
    }

    pub fn resize(self, delta: i64) -> Result<Self> {
        self.0
            .into_iter()
            .map(|h| h.resized(delta).ok_or(PatchError::SizeOverflow { typ: h.typ, delta }))
            .collect::<Result<Vec<_>>>()
            .map(AncestorChain)
    }

    pub fn headers(&self) -> &[BoxHeader] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: u64,
    pub end: u64,
    pub bytes: Vec<u8>,
}

impl Edit {
    fn replace(h: &BoxHeader, file_len: u64, bytes: Vec<u8>) -> Self {
        Edit { start: h.start, end: h.end(file_len), bytes }
    }

    fn delta(&self) -> i64 {
        self.bytes.len() as i64 - (self.end - self.start) as i64
    }
}

#[derive(Debug, Clone)]
pub struct RewritePlan {
    pub decision: Decision,
    pub chain: AncestorChain,
    /// How far `mdat` moves; every chunk offset moves with it.
    pub payload_shift: i64,
    pub edits: Vec<Edit>,
    pub output_len: u64,
}

// The region being replaced and what replaces it.
struct Site<'a> {
    start: u64,
    end: u64,
    bytes: Vec<u8>,
    meta_padding: Option<&'a BoxHeader>,
    file_len: u64,
}

impl RewritePlan {
    pub fn build(tree: &BoxTree, ilst: &[u8]) -> Result<Self> {
        let file_len = tree.file_len;
        let (missing, bytes) = match (&tree.udta, &tree.meta) {
            (None, _) => (Some(MissingStructure::UserData), atoms::user_data_box(&atoms::metadata_box(ilst))),
            (Some(_), None) => (Some(MissingStructure::Metadata), atoms::metadata_box(ilst)),
            (Some(_), Some(_)) => (None, ilst.to_vec()),
        };
        let (start, end) = match (missing, &tree.udta, &tree.ilst) {
            (Some(MissingStructure::UserData), _, _) => (tree.moov_end(), tree.moov_end()),
            (Some(MissingStructure::Metadata), Some(udta), _) => (udta.payload_start(), udta.payload_start()),
            (None, _, Some(ilst)) => (ilst.start, ilst.end(file_len)),
            _ => {
                let at = tree.region_start().ok_or(PatchError::NoContainerFound)?;
                (at, at)
            }
        };
        let site = Site {
            start,
            end,
            bytes,
            meta_padding: if missing.is_none() { tree.meta_padding.as_ref() } else { None },
            file_len,
        };

        let top_padding = tree.usable_top_padding();
        let decision = classify(&Sizes {
            old_region: site.end - site.start,
            new_region: site.bytes.len() as u64,
            meta_padding: site.meta_padding.map(|p| p.size),
            missing,
            top_padding: top_padding.map(|p| p.size),
        });
        tracing::info!(strategy = ?decision.strategy, delta = decision.ancestor_delta, "classified metadata rewrite");

        let mut edits = match decision.strategy {
            Strategy::Equal => equal(site),
            Strategy::ShrinkWithPadding => shrink_with_padding(site),
            Strategy::ShrinkNewPadding => shrink_new_padding(site),
            Strategy::ShrinkNoPadding => shrink_no_padding(site),
            Strategy::GrowWithPadding => grow_with_padding(site),
            Strategy::GrowOverflowTopPaddingFits
            | Strategy::GrowOverflowTopPaddingExact
            | Strategy::GrowOverflowMustMove => grow_overflow(site),
            Strategy::GrowMissingStructure(_) => grow_missing_structure(site),
        };

        let chain = AncestorChain::from_tree(tree).resize(decision.ancestor_delta)?;
        if decision.ancestor_delta != 0 {
            for h in chain.headers() {
                edits.push(Edit { start: h.start, end: h.start + h.header_size, bytes: h.to_bytes() });
            }
        }

        if let Some(tags) = &tree.tags {
            let end = tags.end(file_len);
            let free = atoms::padding_box(end - tags.start).ok_or(PatchError::SizeOverflow { typ: tags.typ, delta: 0 })?;
            edits.push(Edit { start: tags.start, end, bytes: free });
        }

        if let (Some(top), Some(pad)) = (decision.top_level, top_padding) {
            edits.extend(top_level_edit(top, pad, decision.ancestor_delta, file_len)?);
        }

        let moves = decision.strategy == Strategy::ShrinkNoPadding
            || decision.top_level == Some(TopLevel::MovePayload);
        let payload_shift = match (moves, tree.payload_follows_container()) {
            (true, true) => decision.ancestor_delta,
            (true, false) => {
                tracing::debug!(mdat = tree.mdat.start, moov = tree.moov.start, "mdat precedes moov, offsets stay");
                0
            }
            (false, _) => 0,
        };
        if payload_shift != 0 {
            for table in tree.offset_tables.iter().cloned() {
                let table = table.shift(payload_shift)?;
                edits.push(Edit {
                    start: table.entries_start,
                    end: table.entries_start + table.encoded_len(),
                    bytes: table.encode(),
                });
            }
        }

        edits.sort_by_key(|e| (e.start, e.end));
        debug_assert!(edits.windows(2).all(|w| w[0].end <= w[1].start), "overlapping edits");

        let output_len = edits
            .iter()
            .fold(file_len as i64, |len, e| len + e.delta()) as u64;
        tracing::debug!(edits = edits.len(), payload_shift, output_len, "rewrite plan ready");

        Ok(RewritePlan { decision, chain, payload_shift, edits, output_len })
    }
}

fn region(site: &Site<'_>, bytes: Vec<u8>) -> Edit {
    Edit { start: site.start, end: site.end, bytes }
}

fn equal(site: Site<'_>) -> Vec<Edit> {
    vec![region(&site, site.bytes.clone())]
}

fn shrink_with_padding(site: Site<'_>) -> Vec<Edit> {
    let saved = (site.end - site.start) - site.bytes.len() as u64;
    let mut edits = vec![region(&site, site.bytes.clone())];
    if let Some(pad) = site.meta_padding {
        let grown = atoms::padding_box(pad.end(site.file_len) - pad.start + saved).unwrap_or_default();
        edits.push(Edit::replace(pad, site.file_len, grown));
    }
    edits
}

fn shrink_new_padding(site: Site<'_>) -> Vec<Edit> {
    let saved = (site.end - site.start) - site.bytes.len() as u64;
    let mut bytes = site.bytes.clone();
    bytes.extend(atoms::padding_box(saved).unwrap_or_default());
    vec![region(&site, bytes)]
}

fn shrink_no_padding(site: Site<'_>) -> Vec<Edit> {
    vec![region(&site, site.bytes.clone())]
}

fn grow_with_padding(site: Site<'_>) -> Vec<Edit> {
    let extra = site.bytes.len() as u64 - (site.end - site.start);
    let mut edits = vec![region(&site, site.bytes.clone())];
    if let Some(pad) = site.meta_padding {
        let left = pad.end(site.file_len) - pad.start - extra;
        // exactly used up: the padding box disappears, header and all
        let bytes = atoms::padding_box(left).unwrap_or_default();
        edits.push(Edit::replace(pad, site.file_len, bytes));
    }
    edits
}

fn grow_overflow(site: Site<'_>) -> Vec<Edit> {
    let mut edits = vec![region(&site, site.bytes.clone())];
    if let Some(pad) = site.meta_padding {
        edits.push(Edit::replace(pad, site.file_len, Vec::new()));
    }
    edits
}

fn grow_missing_structure(site: Site<'_>) -> Vec<Edit> {
    vec![region(&site, site.bytes.clone())]
}

fn top_level_edit(top: TopLevel, pad: &BoxHeader, overflow: i64, file_len: u64) -> Result<Option<Edit>> {
    match top {
        TopLevel::ShrinkPadding => {
            let size = pad.size as i64 - overflow;
            let bytes = atoms::padding_box(size as u64)
                .ok_or(PatchError::SizeOverflow { typ: pad.typ, delta: -overflow })?;
            Ok(Some(Edit::replace(pad, file_len, bytes)))
        }
        TopLevel::DropPadding => Ok(Some(Edit::replace(pad, file_len, Vec::new()))),
        TopLevel::MovePayload => Ok(None),
    }
}
