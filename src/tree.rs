use crate::boxes::{BoxHeader, BoxRef};
use crate::error::{PatchError, Result};
use crate::known_boxes::KnownBox;
use crate::offsets::OffsetTable;
use crate::parser::{container_body_start, parse_children};
use std::io::{Read, Seek, SeekFrom};

/// Everything the patcher needs to know about a file, read in one pass.
///
/// ```text
/// ftyp
/// [free]
/// moov
///   trak .. stbl/stco|co64
///   udta
///     meta
///       hdlr
///       ilst
///       [free]        <- meta_padding
///     [tags]          <- legacy extension (or under meta)
/// [free]              <- top_padding
/// mdat
/// ```
#[derive(Debug, Clone)]
pub struct BoxTree {
    pub file_len: u64,
    pub top: Vec<BoxRef>,
    pub moov: BoxHeader,
    pub udta: Option<BoxHeader>,
    pub meta: Option<BoxHeader>,
    /// First child position inside `meta`, past version/flags when present.
    pub meta_body_start: Option<u64>,
    pub hdlr: Option<BoxHeader>,
    pub ilst: Option<BoxHeader>,
    /// Padding box immediately following `ilst` inside `meta`.
    pub meta_padding: Option<BoxHeader>,
    pub tags: Option<BoxHeader>,
    /// Top-level padding boxes in file order.
    pub top_padding: Vec<BoxHeader>,
    pub mdat: BoxHeader,
    pub offset_tables: Vec<OffsetTable>,
}

impl BoxTree {
    pub fn read<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let file_len = r.seek(SeekFrom::End(0))?;
        r.seek(SeekFrom::Start(0))?;
        let top = parse_children(r, file_len)?;

        let mdat = top
            .iter()
            .find(|b| KnownBox::from(b.hdr.typ) == KnownBox::Mdat)
            .map(|b| b.hdr.clone())
            .ok_or(PatchError::NoPayloadFound)?;
        let moov_ref = top
            .iter()
            .find(|b| KnownBox::from(b.hdr.typ) == KnownBox::Moov)
            .ok_or(PatchError::NoContainerFound)?;
        if moov_ref.hdr.size == 0 {
            return Err(PatchError::NoContainerFound);
        }

        let udta_ref = moov_ref.child(b"udta");
        let meta_ref = udta_ref.and_then(|u| u.child(b"meta"));

        let mut hdlr = None;
        let mut ilst = None;
        let mut meta_padding = None;
        if let Some(meta) = meta_ref {
            hdlr = meta.child(b"hdlr").map(|b| b.hdr.clone());
            let kids = meta.children();
            if let Some(i) = kids.iter().position(|c| &c.hdr.typ.0 == b"ilst") {
                ilst = Some(kids[i].hdr.clone());
                meta_padding = kids
                    .get(i + 1)
                    .filter(|c| KnownBox::from(c.hdr.typ).is_padding())
                    .map(|c| c.hdr.clone());
            }
        }

        let tags = udta_ref
            .and_then(|u| u.child(b"tags"))
            .or_else(|| meta_ref.and_then(|m| m.child(b"tags")))
            .map(|b| b.hdr.clone());

        let meta_body_start = match meta_ref {
            Some(m) => Some(container_body_start(r, &m.hdr)?),
            None => None,
        };

        let top_padding = top
            .iter()
            .filter(|b| KnownBox::from(b.hdr.typ).is_padding())
            .map(|b| b.hdr.clone())
            .collect();

        let mut chunk_boxes = Vec::new();
        moov_ref.find_all(b"stco", &mut chunk_boxes);
        moov_ref.find_all(b"co64", &mut chunk_boxes);
        chunk_boxes.sort_by_key(|b| b.hdr.start);
        let mut offset_tables = Vec::new();
        for b in chunk_boxes {
            if let Some(t) = OffsetTable::read(r, b)? {
                offset_tables.push(t);
            }
        }

        let tree = BoxTree {
            file_len,
            moov: moov_ref.hdr.clone(),
            udta: udta_ref.map(|b| b.hdr.clone()),
            meta: meta_ref.map(|b| b.hdr.clone()),
            meta_body_start,
            hdlr,
            ilst,
            meta_padding,
            tags,
            top_padding,
            mdat,
            offset_tables,
            top,
        };
        tracing::debug!(
            moov = tree.moov.start,
            mdat = tree.mdat.start,
            ilst = ?tree.ilst.as_ref().map(|h| (h.start, h.size)),
            meta_padding = ?tree.meta_padding.as_ref().map(|h| h.size),
            tables = tree.offset_tables.len(),
            "read box tree"
        );
        Ok(tree)
    }

    pub fn moov_end(&self) -> u64 {
        self.moov.end(self.file_len)
    }

    /// First offset of the first table, the value verification compares.
    pub fn first_offset(&self) -> Option<u64> {
        self.offset_tables.iter().find_map(|t| t.first_offset())
    }

    /// Whether `mdat` sits after `moov`, i.e. whether resizing `moov` moves it.
    pub fn payload_follows_container(&self) -> bool {
        self.mdat.start > self.moov.start
    }

    /// Top-level padding that may absorb growth: after `moov`, before `mdat`.
    pub fn usable_top_padding(&self) -> Option<&BoxHeader> {
        let moov_end = self.moov_end();
        self.top_padding
            .iter()
            .find(|p| p.start >= moov_end && p.start < self.mdat.start && p.size != 0)
    }

    /// Where the metadata region is, or would be inserted into an existing `meta`.
    pub fn region_start(&self) -> Option<u64> {
        if let Some(ilst) = &self.ilst {
            return Some(ilst.start);
        }
        match &self.hdlr {
            Some(h) => Some(h.end(self.file_len)),
            None => self.meta_body_start,
        }
    }
}
