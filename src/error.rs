//! Error types for s-zipstream

use std::io;

/// Result type for s-zipstream operations
pub type Result<T> = std::result::Result<T, ZipStreamError>;

/// Error types that can occur while producing an archive
#[derive(Debug)]
pub enum ZipStreamError {
    /// I/O error, including read faults from an entry's source stream
    Io(io::Error),
    /// An entry (or the archive trailer) outgrew the field width committed
    /// to when its header was emitted
    SizeOverflow {
        /// Arcname of the entry, or a description of the archive-level field
        name: String,
        /// Size that did not fit
        size: u64,
    },
    /// Attempt to add or write after the archive was finalized
    ArchiveClosed,
    /// Arcname cannot be stored in a ZIP header
    InvalidName(String),
    /// Compression method not available in this build
    UnsupportedCompression(u16),
    /// Options the encoder cannot run with
    InvalidOptions(String),
}

impl std::fmt::Display for ZipStreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZipStreamError::Io(e) => write!(f, "I/O error: {}", e),
            ZipStreamError::SizeOverflow { name, size } => write!(
                f,
                "Size overflow: {} reached {} bytes without zip64 enabled",
                name, size
            ),
            ZipStreamError::ArchiveClosed => write!(f, "Archive already finalized"),
            ZipStreamError::InvalidName(msg) => write!(f, "Invalid entry name: {}", msg),
            ZipStreamError::UnsupportedCompression(method) => {
                write!(f, "Unsupported compression method: {}", method)
            }
            ZipStreamError::InvalidOptions(msg) => write!(f, "Invalid options: {}", msg),
        }
    }
}

impl std::error::Error for ZipStreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ZipStreamError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ZipStreamError {
    fn from(err: io::Error) -> Self {
        ZipStreamError::Io(err)
    }
}
