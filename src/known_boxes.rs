use crate::boxes::FourCC;

/// Typed view over the boxes the patcher has to recognise.
///
/// Anything not in this list becomes `KnownBox::Unknown(fourcc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownBox {
    // File-level / top-level
    Ftyp,
    Moov,
    Mdat,
    Free,
    Skip,
    Wide,

    // moov children
    Mvhd,
    Trak,
    Udta,

    // trak children
    Tkhd,
    Edts,
    Mdia,

    // mdia / minf
    Mdhd,
    Hdlr,
    Minf,
    Stbl,

    // stbl children
    Stsd,
    Stco,
    Co64,

    // udta / meta
    Meta,
    Ilst,
    Tags,
    Chpl,

    // Raw UUID/vendor
    Uuid,

    // Anything else
    Unknown(FourCC),
}

impl From<FourCC> for KnownBox {
    fn from(cc: FourCC) -> Self {
        match &cc.0 {
            b"ftyp" => KnownBox::Ftyp,
            b"moov" => KnownBox::Moov,
            b"mdat" => KnownBox::Mdat,
            b"free" => KnownBox::Free,
            b"skip" => KnownBox::Skip,
            b"wide" => KnownBox::Wide,

            b"mvhd" => KnownBox::Mvhd,
            b"trak" => KnownBox::Trak,
            b"udta" => KnownBox::Udta,

            b"tkhd" => KnownBox::Tkhd,
            b"edts" => KnownBox::Edts,
            b"mdia" => KnownBox::Mdia,

            b"mdhd" => KnownBox::Mdhd,
            b"hdlr" => KnownBox::Hdlr,
            b"minf" => KnownBox::Minf,
            b"stbl" => KnownBox::Stbl,

            b"stsd" => KnownBox::Stsd,
            b"stco" => KnownBox::Stco,
            b"co64" => KnownBox::Co64,

            b"meta" => KnownBox::Meta,
            b"ilst" => KnownBox::Ilst,
            b"tags" => KnownBox::Tags,
            b"chpl" => KnownBox::Chpl,

            b"uuid" => KnownBox::Uuid,

            _ => KnownBox::Unknown(cc),
        }
    }
}

impl KnownBox {
    /// Boxes the tree reader descends into. `ilst` and `tags` are replaced
    /// wholesale, so their children are never needed.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            KnownBox::Moov
                | KnownBox::Trak
                | KnownBox::Edts
                | KnownBox::Mdia
                | KnownBox::Minf
                | KnownBox::Stbl
                | KnownBox::Udta
                | KnownBox::Meta
        )
    }

    /// Boxes whose content only exists to be overwritten.
    pub fn is_padding(&self) -> bool {
        matches!(self, KnownBox::Free | KnownBox::Skip)
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            KnownBox::Ftyp => "File Type Box",
            KnownBox::Moov => "Movie Box",
            KnownBox::Mdat => "Media Data Box",
            KnownBox::Free => "Free Space Box",
            KnownBox::Skip => "Skip Box",
            KnownBox::Wide => "Wide Box",
            KnownBox::Mvhd => "Movie Header Box",
            KnownBox::Trak => "Track Box",
            KnownBox::Udta => "User Data Box",
            KnownBox::Tkhd => "Track Header Box",
            KnownBox::Edts => "Edit Box",
            KnownBox::Mdia => "Media Box",
            KnownBox::Mdhd => "Media Header Box",
            KnownBox::Hdlr => "Handler Reference Box",
            KnownBox::Minf => "Media Information Box",
            KnownBox::Stbl => "Sample Table Box",
            KnownBox::Stsd => "Sample Description Box",
            KnownBox::Stco => "Chunk Offset Box",
            KnownBox::Co64 => "64-bit Chunk Offset Box",
            KnownBox::Meta => "Metadata Box",
            KnownBox::Ilst => "Item List Box",
            KnownBox::Tags => "Nero Tags Box",
            KnownBox::Chpl => "Nero Chapter List Box",
            KnownBox::Uuid => "User Extension Box",
            KnownBox::Unknown(_) => "Unknown Box",
        }
    }
}
