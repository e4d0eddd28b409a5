//! Error types for the repacking engine.

use thiserror::Error;

/// A Result type alias over [`ConvertError`].
pub type Result<V> = std::result::Result<V, ConvertError>;

/// Everything that can stop a conversion.
///
/// All variants are fatal to the run unless best-effort mode is enabled, in
/// which case [`ConvertError::is_entry_local`] decides what may be skipped.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("not a ZIP archive: no end of central directory record found")]
    NotAZipArchive,

    #[error("central directory truncated at offset {offset}: wanted {expected} bytes, got {actual}")]
    TruncatedDirectory {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("entry '{name}' truncated: wanted {expected} bytes, got {actual}")]
    TruncatedEntry {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("entry '{name}' uses unsupported compression method {method}")]
    UnsupportedCompressionMethod { name: String, method: u16 },

    #[error("entry '{name}' has an invalid local file header (signature {signature:#010x})")]
    InvalidLocalHeader { name: String, signature: u32 },

    #[error("entry name '{0}' escapes the output directory")]
    UnsafeEntryPath(String),

    #[error("entry '{name}' is too large for the output format ({size} bytes)")]
    SizeOverflow { name: String, size: u64 },

    #[error("entry '{name}' CRC-32 mismatch (directory: {expected:#010x}, payload: {actual:#010x})")]
    CrcMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("failed to read from source: {0}")]
    SourceRead(#[source] std::io::Error),

    #[error("failed to write output: {0}")]
    OutputWriteFailed(#[source] std::io::Error),
}

impl ConvertError {
    /// Whether the error only concerns a single entry, so the rest of the
    /// archive can still be converted.
    pub fn is_entry_local(&self) -> bool {
        matches!(
            self,
            ConvertError::TruncatedEntry { .. }
                | ConvertError::UnsupportedCompressionMethod { .. }
                | ConvertError::InvalidLocalHeader { .. }
                | ConvertError::UnsafeEntryPath(_)
                | ConvertError::SizeOverflow { .. }
                | ConvertError::CrcMismatch { .. }
        )
    }
}
