use serde::Deserialize;
use std::path::Path;

/// Default piece size for copying unchanged spans such as `mdat`.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum OptionsError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid options file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriteOptions {
    /// Bytes copied per read/write when streaming unchanged regions.
    pub chunk_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions { chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

impl WriteOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn from_json(s: &str) -> Result<Self, OptionsError> {
        let opts: WriteOptions = serde_json::from_str(s)?;
        opts.validate()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(self) -> Result<Self, OptionsError> {
        if self.chunk_size == 0 {
            return Err(OptionsError::ZeroChunkSize);
        }
        Ok(self)
    }
}
