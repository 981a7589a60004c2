use std::io;
use std::path::PathBuf;

use crate::client::ClientError;
use crate::data::CoercionError;
use crate::obis_code::ObisCode;

/// Failures of an extraction run.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// The media could not be opened or the association failed.
    #[error("transport error: {0}")]
    Transport(#[source] ClientError),
    #[error("association cache {} is corrupt: {source}", path.display())]
    CacheCorruption { path: PathBuf, source: serde_json::Error },
    /// A read failed after the session was established.
    #[error("communication error: {0}")]
    Communication(#[source] ClientError),
    #[error("format error: {0}")]
    Format(#[from] CoercionError),
    #[error("profile generic {logical_name} (short name {short_name:?}) not found in the association view")]
    ProfileNotFound { logical_name: ObisCode, short_name: Option<u16> },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ReaderError {
    /// Whether the run has to stop. Other errors only abandon the step that raised them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReaderError::Transport(_) | ReaderError::ProfileNotFound { .. } | ReaderError::Config(_))
    }
}
