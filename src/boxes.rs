use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Parse a code where every char maps to one byte (so `©nam` is `a9 6e 61 6d`).
    pub fn from_latin1(s: &str) -> Option<Self> {
        let mut out = [0u8; 4];
        let mut n = 0;
        for c in s.chars() {
            if n == 4 || (c as u32) > 0xff {
                return None;
            }
            out[n] = c as u32 as u8;
            n += 1;
        }
        (n == 4).then_some(FourCC(out))
    }

    pub fn to_latin1(&self) -> String {
        self.0.iter().map(|&c| c as char).collect()
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}
impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_latin1())
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_latin1())
    }
}

impl<'de> Deserialize<'de> for FourCC {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        FourCC::from_latin1(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("not a four character code: {s:?}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxHeader {
    pub size: u64,          // total size including header, or 0=to parent end
    pub typ: FourCC,        // 4CC or b"uuid"
    pub uuid: Option<[u8; 16]>,
    pub header_size: u64,   // 8, 16, or 24/32 for uuid
    pub start: u64,         // file offset of header start
}

impl BoxHeader {
    /// Header for a box that does not exist in any file yet.
    pub fn new(typ: FourCC, size: u64) -> Self {
        let header_size = if size > u32::MAX as u64 { 16 } else { 8 };
        BoxHeader { size, typ, uuid: None, header_size, start: 0 }
    }

    /// End offset of the box, resolving `size == 0` against the parent end.
    pub fn end(&self, parent_end: u64) -> u64 {
        if self.size == 0 { parent_end } else { self.start + self.size }
    }

    pub fn payload_start(&self) -> u64 {
        self.start + self.header_size
    }

    pub fn payload_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size)
    }

    fn is_large(&self) -> bool {
        let base = if self.uuid.is_some() { 24 } else { 8 };
        self.header_size > base
    }

    /// Same box with its total size moved by `delta`. The length field width is
    /// fixed by the original header, so a resize that does not fit is `None`.
    pub fn resized(&self, delta: i64) -> Option<BoxHeader> {
        // still runs to the end of its parent, whatever that becomes
        if self.size == 0 {
            return Some(self.clone());
        }
        let size = self.size.checked_add_signed(delta)?;
        if size < self.header_size || (!self.is_large() && size > u32::MAX as u64) {
            return None;
        }
        Some(BoxHeader { size, ..self.clone() })
    }

    /// Raw header bytes as they appear in the file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header_size as usize);
        if self.is_large() {
            out.extend_from_slice(&1u32.to_be_bytes());
            out.extend_from_slice(&self.typ.0);
            out.extend_from_slice(&self.size.to_be_bytes());
        } else {
            out.extend_from_slice(&(self.size as u32).to_be_bytes());
            out.extend_from_slice(&self.typ.0);
        }
        if let Some(u) = self.uuid {
            out.extend_from_slice(&u);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Container(Vec<BoxRef>),
    Leaf { data_offset: u64, data_len: u64 },
}

#[derive(Debug, Clone)]
pub struct BoxRef {
    pub hdr: BoxHeader,
    pub kind: NodeKind,
}

impl BoxRef {
    pub fn children(&self) -> &[BoxRef] {
        match &self.kind {
            NodeKind::Container(kids) => kids,
            NodeKind::Leaf { .. } => &[],
        }
    }

    pub fn child(&self, typ: &[u8; 4]) -> Option<&BoxRef> {
        self.children().iter().find(|c| &c.hdr.typ.0 == typ)
    }

    /// Depth-first search of this subtree, including `self`.
    pub fn find_all<'a>(&'a self, typ: &[u8; 4], out: &mut Vec<&'a BoxRef>) {
        if &self.hdr.typ.0 == typ {
            out.push(self);
        }
        for c in self.children() {
            c.find_all(typ, out);
        }
    }
}
