#![allow(dead_code)]

use mp4patch::{BoxTree, ContainerPatcher, PatchError, Tag, atoms, ilst::keys, read_tag};
use std::io::Cursor;

pub const PAYLOAD_LEN: usize = 1000;

/// Synthetic M4A layout:
///
/// ```text
/// ftyp
/// [free]                  free_before_moov
/// moov
///   mvhd                  filler, sized to land the first chunk offset
///   trak/mdia/minf/stbl/stco|co64    one per track
///   [udta]
///     [meta]
///       hdlr
///       [ilst]
///       [free]            meta_padding
///     [chpl]
///     [tags]
/// [free]                  free_after_moov
/// mdat                    (or right after ftyp when payload_first)
/// [free]                  free_after_mdat
/// ```
#[derive(Debug, Clone)]
pub struct Fixture {
    pub udta: bool,
    pub meta: bool,
    pub ilst: Option<Tag>,
    pub meta_padding: Option<u64>,
    pub chapters: bool,
    pub tags: Option<u64>,
    pub free_before_moov: Option<u64>,
    pub free_after_moov: Option<u64>,
    pub free_after_mdat: Option<u64>,
    pub co64: bool,
    pub tracks: usize,
    pub payload_first: bool,
    /// Where the first chunk should start, i.e. `mdat` start + 8.
    pub first_offset: Option<u64>,
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture {
            udta: true,
            meta: true,
            ilst: Some(tag_of_len(100)),
            meta_padding: None,
            chapters: false,
            tags: None,
            free_before_moov: None,
            free_after_moov: None,
            free_after_mdat: None,
            co64: false,
            tracks: 1,
            payload_first: false,
            first_offset: None,
        }
    }
}

impl Fixture {
    pub fn build(&self) -> Vec<u8> {
        let mut brands = b"M4A ".to_vec();
        brands.extend_from_slice(&0u32.to_be_bytes());
        brands.extend_from_slice(b"M4A isom");
        let ftyp = boxed(b"ftyp", &brands);
        let before = self.free_before_moov.map(free).unwrap_or_default();
        let after = self.free_after_moov.map(free).unwrap_or_default();
        let trailing = self.free_after_mdat.map(free).unwrap_or_default();
        let mdat = boxed(b"mdat", &payload_bytes());

        let mdat_start = |moov_len: usize| {
            if self.payload_first {
                ftyp.len()
            } else {
                ftyp.len() + before.len() + moov_len + after.len()
            }
        };

        // entry values never change a box length, so one probe is enough
        let probe = self.moov(0, 0).len();
        let filler = match self.first_offset {
            Some(target) => target as usize - (mdat_start(probe) + 8),
            None => 0,
        };
        let first = (mdat_start(probe + filler) + 8) as u64;
        let moov = self.moov(filler, first);

        let mut parts = if self.payload_first {
            [ftyp, mdat, before, moov, after]
        } else {
            [ftyp, before, moov, after, mdat]
        }
        .concat();
        parts.extend(trailing);
        parts
    }

    fn moov(&self, filler: usize, first: u64) -> Vec<u8> {
        let mut body = boxed(b"mvhd", &vec![0u8; filler]);
        for track in 0..self.tracks as u64 {
            // tracks interleave: track n starts n * 10 bytes into the payload
            let start = first + track * 10;
            body.extend(self.trak(&[start, start + 100, start + 200]));
        }
        if self.udta {
            body.extend(self.udta_box());
        }
        boxed(b"moov", &body)
    }

    fn trak(&self, offsets: &[u64]) -> Vec<u8> {
        let mut table = vec![0u8; 4];
        table.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
        for &o in offsets {
            if self.co64 {
                table.extend_from_slice(&o.to_be_bytes());
            } else {
                table.extend_from_slice(&(o as u32).to_be_bytes());
            }
        }
        let chunk_box = boxed(if self.co64 { b"co64" } else { b"stco" }, &table);
        let stbl = boxed(b"stbl", &chunk_box);
        boxed(
            b"trak",
            &[boxed(b"tkhd", &[0u8; 12]), boxed(b"mdia", &boxed(b"minf", &stbl))].concat(),
        )
    }

    fn udta_box(&self) -> Vec<u8> {
        let mut body = Vec::new();
        if self.meta {
            let mut meta = vec![0u8; 4];
            meta.extend(atoms::handler_box());
            if let Some(tag) = &self.ilst {
                meta.extend(tag.to_ilst());
            }
            if let Some(p) = self.meta_padding {
                meta.extend(free(p));
            }
            body.extend(boxed(b"meta", &meta));
        }
        if self.chapters {
            body.extend(chapters_box());
        }
        if let Some(t) = self.tags {
            body.extend(boxed(b"tags", &vec![0x5a; t as usize - 8]));
        }
        boxed(b"udta", &body)
    }
}

pub fn boxed(typ: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(typ);
    out.extend_from_slice(body);
    out
}

pub fn free(total: u64) -> Vec<u8> {
    boxed(b"free", &vec![0u8; total as usize - 8])
}

pub fn chapters_box() -> Vec<u8> {
    boxed(b"chpl", &[1, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7])
}

pub fn payload_bytes() -> Vec<u8> {
    (0..PAYLOAD_LEN).map(|i| (i * 7 % 251) as u8).collect()
}

/// A tag whose `ilst` is exactly `len` bytes: one title item, or nothing for 8.
pub fn tag_of_len(len: usize) -> Tag {
    let mut tag = Tag::new();
    if len == 8 {
        return tag;
    }
    assert!(len >= 32, "smallest single-item ilst is 32 bytes");
    tag.set_text(keys::TITLE, "a".repeat(len - 32));
    assert_eq!(tag.to_ilst().len(), len);
    tag
}

pub fn patch(src: &[u8], tag: &Tag) -> Result<Vec<u8>, PatchError> {
    patch_with(&ContainerPatcher::default(), src, tag)
}

pub fn patch_with(p: &ContainerPatcher, src: &[u8], tag: &Tag) -> Result<Vec<u8>, PatchError> {
    let mut dst = Cursor::new(Vec::new());
    p.rewrite(tag, Cursor::new(src), &mut dst)?;
    Ok(dst.into_inner())
}

pub fn tree(bytes: &[u8]) -> BoxTree {
    BoxTree::read(&mut Cursor::new(bytes)).expect("parse tree")
}

/// The whole `mdat` box, header included.
pub fn payload(bytes: &[u8]) -> Vec<u8> {
    let t = tree(bytes);
    bytes[t.mdat.start as usize..t.mdat.end(t.file_len) as usize].to_vec()
}

pub fn first_offset(bytes: &[u8]) -> u64 {
    tree(bytes).first_offset().expect("chunk offsets")
}

pub fn tag_in(bytes: &[u8]) -> Tag {
    read_tag(&mut Cursor::new(bytes)).expect("read tag")
}

/// Every invariant a successful rewrite has to keep, whatever the strategy.
pub fn assert_consistent(before: &[u8], after: &[u8], tag: &Tag) {
    assert_eq!(payload(after), payload(before), "mdat bytes changed");
    let (old, new) = (tree(before), tree(after));
    assert_eq!(
        first_offset(after) as i64 - new.mdat.start as i64,
        first_offset(before) as i64 - old.mdat.start as i64,
        "chunk offsets no longer point at the same data"
    );
    assert_eq!(&tag_in(after), tag);
}
