//! Constructors for the small boxes the patcher writes on its own account.

use crate::boxes::{BoxHeader, FourCC};

/// Header length of every box built here.
pub const HEADER_LEN: u64 = 8;

/// Length of the version/flags word of a full box.
pub const FULL_BOX_FLAGS_LEN: u64 = 4;

/// A zero-filled `free` box of `total` bytes, header included.
///
/// Returns `None` when `total` cannot even hold the header.
pub fn padding_box(total: u64) -> Option<Vec<u8>> {
    if total < HEADER_LEN {
        return None;
    }
    let mut out = BoxHeader::new(FourCC(*b"free"), total).to_bytes();
    out.resize(total as usize, 0);
    Some(out)
}

/// iTunes-style metadata handler: `mdir` handler, `appl` manufacturer, empty name.
pub fn handler_box() -> Vec<u8> {
    let mut body = Vec::with_capacity(25);
    body.extend_from_slice(&[0u8; 4]); // version/flags
    body.extend_from_slice(&[0u8; 4]); // pre_defined
    body.extend_from_slice(b"mdir");
    body.extend_from_slice(b"appl");
    body.extend_from_slice(&[0u8; 8]); // reserved
    body.push(0); // name

    wrap(*b"hdlr", &body)
}

/// `meta` full box holding a fresh handler and the given `ilst`.
pub fn metadata_box(ilst: &[u8]) -> Vec<u8> {
    let hdlr = handler_box();
    let mut body = vec![0u8; FULL_BOX_FLAGS_LEN as usize];
    body.reserve(hdlr.len() + ilst.len());
    body.extend_from_slice(&hdlr);
    body.extend_from_slice(ilst);

    wrap(*b"meta", &body)
}

pub fn user_data_box(children: &[u8]) -> Vec<u8> {
    wrap(*b"udta", children)
}

pub fn wrap(typ: [u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = BoxHeader::new(FourCC(typ), HEADER_LEN + body.len() as u64).to_bytes();
    out.extend_from_slice(body);
    out
}
