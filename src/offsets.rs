use crate::boxes::BoxRef;
use crate::error::{PatchError, Result};
use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;
use std::io::{Read, Seek, SeekFrom};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetWidth {
    /// `stco`
    Stco,
    /// `co64`
    Co64,
}

impl OffsetWidth {
    pub fn entry_len(&self) -> u64 {
        match self {
            OffsetWidth::Stco => 4,
            OffsetWidth::Co64 => 8,
        }
    }
}

/// One track's chunk offset table: absolute file offsets into `mdat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffsetTable {
    pub width: OffsetWidth,
    /// File position of the first entry.
    pub entries_start: u64,
    pub offsets: Vec<u64>,
}

impl OffsetTable {
    /// Read the table of an `stco` / `co64` box.
    pub fn read<R: Read + Seek>(r: &mut R, b: &BoxRef) -> std::io::Result<Option<Self>> {
        let width = match &b.hdr.typ.0 {
            b"stco" => OffsetWidth::Stco,
            b"co64" => OffsetWidth::Co64,
            _ => return Ok(None),
        };
        // version/flags + entry count
        if b.hdr.payload_size() < 8 {
            return Ok(None);
        }
        r.seek(SeekFrom::Start(b.hdr.payload_start() + 4))?;
        let declared = r.read_u32::<BigEndian>()? as u64;
        let room = (b.hdr.payload_size() - 8) / width.entry_len();
        let count = declared.min(room);

        let mut offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            offsets.push(match width {
                OffsetWidth::Stco => r.read_u32::<BigEndian>()? as u64,
                OffsetWidth::Co64 => r.read_u64::<BigEndian>()?,
            });
        }
        Ok(Some(OffsetTable { width, entries_start: b.hdr.payload_start() + 8, offsets }))
    }

    pub fn first_offset(&self) -> Option<u64> {
        self.offsets.first().copied()
    }

    /// Length in bytes of the encoded entries.
    pub fn encoded_len(&self) -> u64 {
        self.offsets.len() as u64 * self.width.entry_len()
    }

    /// Move every entry by `delta`. Consumes the table so a rewrite cannot
    /// apply two shifts to the same one.
    pub fn shift(self, delta: i64) -> Result<Self> {
        let limit = match self.width {
            OffsetWidth::Stco => u32::MAX as u64,
            OffsetWidth::Co64 => u64::MAX,
        };
        let offsets = self
            .offsets
            .iter()
            .map(|&offset| {
                offset
                    .checked_add_signed(delta)
                    .filter(|v| *v <= limit)
                    .ok_or(PatchError::OffsetOverflow { offset, delta })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(OffsetTable { offsets, ..self })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len() as usize);
        for &o in &self.offsets {
            match self.width {
                OffsetWidth::Stco => out.extend_from_slice(&(o as u32).to_be_bytes()),
                OffsetWidth::Co64 => out.extend_from_slice(&o.to_be_bytes()),
            }
        }
        out
    }
}
