//! Logical tag model and its `ilst` serialization.
//!
//! Every item is an atom keyed by its four character code (`©nam`, `trkn`, ...)
//! or a freeform `----` atom keyed by `mean`/`name`, holding a `data` atom:
//!
//! ```text
//! [size]["data"][type indicator: u32][locale: u32][payload...]
//! ```

use crate::atoms::{self, HEADER_LEN};
use crate::boxes::{BoxHeader, FourCC};
use crate::parser::{ParseError, read_box_header};
use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Seek, SeekFrom};

pub mod keys {
    use crate::boxes::FourCC;

    pub const TITLE: FourCC = FourCC([0xa9, b'n', b'a', b'm']);
    pub const ARTIST: FourCC = FourCC([0xa9, b'A', b'R', b'T']);
    pub const ALBUM: FourCC = FourCC([0xa9, b'a', b'l', b'b']);
    pub const YEAR: FourCC = FourCC([0xa9, b'd', b'a', b'y']);
    pub const GENRE: FourCC = FourCC([0xa9, b'g', b'e', b'n']);
    pub const COMMENT: FourCC = FourCC([0xa9, b'c', b'm', b't']);
    pub const ENCODER: FourCC = FourCC([0xa9, b't', b'o', b'o']);
    pub const TRACK: FourCC = FourCC(*b"trkn");
    pub const DISC: FourCC = FourCC(*b"disk");
}

const TYPE_IMPLICIT: u32 = 0;
const TYPE_UTF8: u32 = 1;
const TYPE_BE_SIGNED: u32 = 21;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKey {
    Atom(FourCC),
    Freeform { mean: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemValue {
    Text { value: String },
    Integer { value: i64 },
    /// Track or disc position, `trkn` / `disk` layout.
    Pair { number: u16, total: u16 },
    Binary {
        type_indicator: u32,
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagItem {
    pub key: ItemKey,
    pub value: ItemValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub items: Vec<TagItem>,
}

impl Tag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&ItemValue> {
        self.items.iter().find(|i| &i.key == key).map(|i| &i.value)
    }

    pub fn text(&self, cc: FourCC) -> Option<&str> {
        match self.get(&ItemKey::Atom(cc))? {
            ItemValue::Text { value } => Some(value),
            _ => None,
        }
    }

    /// Replace the first item with this key, or append.
    pub fn set(&mut self, key: ItemKey, value: ItemValue) {
        match self.items.iter_mut().find(|i| i.key == key) {
            Some(item) => item.value = value,
            None => self.items.push(TagItem { key, value }),
        }
    }

    pub fn set_text(&mut self, cc: FourCC, value: impl Into<String>) {
        self.set(ItemKey::Atom(cc), ItemValue::Text { value: value.into() });
    }

    pub fn set_track(&mut self, number: u16, total: u16) {
        self.set(ItemKey::Atom(keys::TRACK), ItemValue::Pair { number, total });
    }

    pub fn remove(&mut self, key: &ItemKey) {
        self.items.retain(|i| &i.key != key);
    }

    /// Overlay every item of `other` onto this tag.
    pub fn merge(&mut self, other: Tag) {
        for item in other.items {
            self.set(item.key, item.value);
        }
    }

    /// The complete `ilst` box, header included.
    pub fn to_ilst(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for item in &self.items {
            body.extend_from_slice(&encode_item(item));
        }
        atoms::wrap(*b"ilst", &body)
    }

    /// Parse a complete `ilst` box. Unknown value layouts are kept as binary.
    pub fn from_ilst(bytes: &[u8]) -> Result<Tag, ParseError> {
        let mut cur = Cursor::new(bytes);
        let ilst = read_box_header(&mut cur)?;
        let end = ilst.end(bytes.len() as u64);
        if end > bytes.len() as u64 {
            return Err(ParseError::InvalidSize);
        }

        let mut tag = Tag::new();
        cur.seek(SeekFrom::Start(ilst.payload_start()))?;
        while cur.position() + HEADER_LEN <= end {
            let item = read_box_header(&mut cur)?;
            let item_end = item.end(end);
            if item_end > end {
                return Err(ParseError::InvalidSize);
            }
            decode_item(&mut cur, &item, item_end, &mut tag)?;
            cur.seek(SeekFrom::Start(item_end))?;
        }
        Ok(tag)
    }
}

fn encode_item(item: &TagItem) -> Vec<u8> {
    let (type_indicator, payload) = encode_value(&item.key, &item.value);
    let mut data = Vec::with_capacity(8 + payload.len());
    data.extend_from_slice(&type_indicator.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes()); // locale
    data.extend_from_slice(&payload);
    let data = atoms::wrap(*b"data", &data);

    match &item.key {
        ItemKey::Atom(cc) => atoms::wrap(cc.0, &data),
        ItemKey::Freeform { mean, name } => {
            let mut body = Vec::new();
            body.extend_from_slice(&full_box_string(*b"mean", mean));
            body.extend_from_slice(&full_box_string(*b"name", name));
            body.extend_from_slice(&data);
            atoms::wrap(*b"----", &body)
        }
    }
}

fn full_box_string(typ: [u8; 4], s: &str) -> Vec<u8> {
    let mut body = vec![0u8; 4]; // version/flags
    body.extend_from_slice(s.as_bytes());
    atoms::wrap(typ, &body)
}

fn encode_value(key: &ItemKey, value: &ItemValue) -> (u32, Vec<u8>) {
    match value {
        ItemValue::Text { value } => (TYPE_UTF8, value.as_bytes().to_vec()),
        ItemValue::Integer { value } => {
            let v = *value;
            let bytes = if let Ok(b) = i8::try_from(v) {
                b.to_be_bytes().to_vec()
            } else if let Ok(s) = i16::try_from(v) {
                s.to_be_bytes().to_vec()
            } else if let Ok(w) = i32::try_from(v) {
                w.to_be_bytes().to_vec()
            } else {
                v.to_be_bytes().to_vec()
            };
            (TYPE_BE_SIGNED, bytes)
        }
        ItemValue::Pair { number, total } => {
            let mut out = vec![0u8; 2];
            out.extend_from_slice(&number.to_be_bytes());
            out.extend_from_slice(&total.to_be_bytes());
            // disk stops after the total, trkn carries two more reserved bytes
            if key != &ItemKey::Atom(keys::DISC) {
                out.extend_from_slice(&[0u8; 2]);
            }
            (TYPE_IMPLICIT, out)
        }
        ItemValue::Binary { type_indicator, data } => (*type_indicator, data.clone()),
    }
}

fn decode_item(
    cur: &mut Cursor<&[u8]>,
    item: &BoxHeader,
    item_end: u64,
    tag: &mut Tag,
) -> Result<(), ParseError> {
    let mut mean = None;
    let mut name = None;
    let mut values = Vec::new();

    while cur.position() + HEADER_LEN <= item_end {
        let child = read_box_header(cur)?;
        let child_end = child.end(item_end);
        if child_end > item_end {
            return Err(ParseError::InvalidSize);
        }
        let mut payload = vec![0u8; (child_end - child.payload_start()) as usize];
        cur.read_exact(&mut payload)?;

        match &child.typ.0 {
            b"mean" if payload.len() >= 4 => {
                mean = Some(String::from_utf8_lossy(&payload[4..]).to_string())
            }
            b"name" if payload.len() >= 4 => {
                name = Some(String::from_utf8_lossy(&payload[4..]).to_string())
            }
            b"data" if payload.len() >= 8 => {
                let mut p = Cursor::new(&payload[..]);
                let type_indicator = p.read_u32::<BigEndian>()? & 0x00ff_ffff;
                let _locale = p.read_u32::<BigEndian>()?;
                values.push((type_indicator, payload[8..].to_vec()));
            }
            _ => {}
        }
    }

    let key = if &item.typ.0 == b"----" {
        match (mean, name) {
            (Some(mean), Some(name)) => ItemKey::Freeform { mean, name },
            _ => return Ok(()),
        }
    } else {
        ItemKey::Atom(item.typ)
    };

    for (type_indicator, data) in values {
        let value = decode_value(&key, type_indicator, data);
        tag.items.push(TagItem { key: key.clone(), value });
    }
    Ok(())
}

fn decode_value(key: &ItemKey, type_indicator: u32, data: Vec<u8>) -> ItemValue {
    let is_pair = matches!(key, ItemKey::Atom(cc) if *cc == keys::TRACK || *cc == keys::DISC);
    match type_indicator {
        TYPE_UTF8 => match String::from_utf8(data) {
            Ok(value) => ItemValue::Text { value },
            Err(e) => ItemValue::Binary { type_indicator, data: e.into_bytes() },
        },
        TYPE_BE_SIGNED if matches!(data.len(), 1 | 2 | 4 | 8) => {
            let mut c = Cursor::new(&data[..]);
            let value = match data.len() {
                1 => c.read_i8().map(i64::from),
                2 => c.read_i16::<BigEndian>().map(i64::from),
                4 => c.read_i32::<BigEndian>().map(i64::from),
                _ => c.read_i64::<BigEndian>(),
            };
            match value {
                Ok(value) => ItemValue::Integer { value },
                Err(_) => ItemValue::Binary { type_indicator, data },
            }
        }
        TYPE_IMPLICIT if is_pair && data.len() >= 6 => ItemValue::Pair {
            number: u16::from_be_bytes([data[2], data[3]]),
            total: u16::from_be_bytes([data[4], data[5]]),
        },
        _ => ItemValue::Binary { type_indicator, data },
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
