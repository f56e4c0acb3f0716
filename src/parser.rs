use crate::boxes::{BoxHeader, BoxRef, FourCC, NodeKind};
use crate::known_boxes::KnownBox;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid box size")]
    InvalidSize,
    #[error("{typ} box at {start} runs past the end of its parent ({end} > {parent_end})")]
    Overrun { typ: FourCC, start: u64, end: u64, parent_end: u64 },
    #[error("{typ} box at {start} has size 0 but is not at the top level")]
    OpenEnded { typ: FourCC, start: u64 },
}

pub type Result<T> = std::result::Result<T, ParseError>;

pub fn read_box_header<R: Read + Seek>(r: &mut R) -> Result<BoxHeader> {
    let start = r.stream_position()?;
    let size32 = r.read_u32::<BigEndian>()?;
    let mut typ = [0u8; 4];
    r.read_exact(&mut typ)?;
    let mut size = size32 as u64;

    if size32 == 1 {
        size = r.read_u64::<BigEndian>()?;
    }

    let mut uuid = None;
    if &typ == b"uuid" {
        let mut u = [0u8; 16];
        r.read_exact(&mut u)?;
        uuid = Some(u);
    }

    let header_size = match (size32 == 1, &typ == b"uuid") {
        (true, true) => 8 + 8 + 16,
        (true, false) => 8 + 8,
        (false, true) => 8 + 16,
        (false, false) => 8,
    } as u64;

    if size != 0 && size < header_size {
        return Err(ParseError::InvalidSize);
    }

    Ok(BoxHeader { size, typ: FourCC(typ), uuid, header_size, start })
}

/// Offset of the first child of a container box.
///
/// iTunes-style `meta` is a full box (4 bytes of version/flags before the
/// children), QuickTime-style `meta` is a plain container. A zero word at the
/// start of the payload can only be version/flags, never a child size.
pub fn container_body_start<R: Read + Seek>(r: &mut R, h: &BoxHeader) -> Result<u64> {
    let content_start = h.payload_start();
    if &h.typ.0 != b"meta" || h.payload_size() < 4 {
        return Ok(content_start);
    }
    r.seek(SeekFrom::Start(content_start))?;
    let word = r.read_u32::<BigEndian>()?;
    Ok(if word == 0 { content_start + 4 } else { content_start })
}

/// Parse the boxes from the current position up to `parent_end`, descending
/// into known containers. Only top-level boxes may use size 0.
pub fn parse_children<R: Read + Seek>(r: &mut R, parent_end: u64) -> Result<Vec<BoxRef>> {
    parse_level(r, parent_end, true)
}

fn parse_level<R: Read + Seek>(r: &mut R, parent_end: u64, top: bool) -> Result<Vec<BoxRef>> {
    let mut kids = Vec::new();
    // a trailing run shorter than a header is slack, not a box
    while r.stream_position()? + 8 <= parent_end {
        let h = read_box_header(r)?;
        if h.size == 0 && !top {
            return Err(ParseError::OpenEnded { typ: h.typ, start: h.start });
        }
        let box_end = h.end(parent_end);
        if box_end > parent_end {
            return Err(ParseError::Overrun { typ: h.typ, start: h.start, end: box_end, parent_end });
        }

        let kind = if KnownBox::from(h.typ).is_container() {
            let body_start = container_body_start(r, &h)?;
            r.seek(SeekFrom::Start(body_start))?;
            NodeKind::Container(parse_level(r, box_end, false)?)
        } else {
            let data_offset = h.payload_start();
            let data_len = box_end.saturating_sub(data_offset);
            NodeKind::Leaf { data_offset, data_len }
        };

        // Skip to end of box
        r.seek(SeekFrom::Start(box_end))?;
        kids.push(BoxRef { hdr: h, kind });
    }
    Ok(kids)
}
