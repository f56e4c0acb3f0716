use crate::boxes::FourCC;
use crate::parser::ParseError;

/// What the post-write check found wrong with a destination file.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    #[error("written file could not be parsed: {0}")]
    Unparseable(String),
    #[error("written file has no mdat box")]
    MissingPayload,
    #[error("mdat length changed from {expected} to {actual}")]
    PayloadLengthMismatch { expected: u64, actual: u64 },
    #[error("written file has no udta box")]
    MissingUserData,
    #[error("written file has no meta box")]
    MissingMetadata,
    #[error("written file lost its chunk offset tables")]
    MissingOffsets,
    #[error("chunk offsets are off by {discrepancy} bytes")]
    OffsetMismatch { discrepancy: i64 },
}

#[derive(thiserror::Error, Debug)]
pub enum PatchError {
    #[error("no mdat box found, cannot rewrite a file without media data")]
    NoPayloadFound,
    #[error("no moov box found")]
    NoContainerFound,
    #[error("source is not a usable container: {0}")]
    Malformed(#[from] ParseError),
    #[error("was meant to copy {expected} bytes but only copied {actual}")]
    ShortTransfer { expected: u64, actual: u64 },
    #[error("{typ} box cannot be resized by {delta} bytes")]
    SizeOverflow { typ: FourCC, delta: i64 },
    #[error("chunk offset {offset} cannot be shifted by {delta}")]
    OffsetOverflow { offset: u64, delta: i64 },
    #[error("verification of written file failed: {0}")]
    VerificationFailed(#[from] VerifyFailure),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PatchError>;
