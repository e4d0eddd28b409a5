//! ZIP archive reading.
//!
//! Only the parts of the format needed to find each entry's raw payload are
//! read; nothing here inflates data.
//!
//! ## Architecture
//!
//! - [`structures`]: fixed-offset decoders for the EOCD, ZIP64 records,
//!   central directory headers and local file headers
//! - [`locator`]: finds the EOCD by scanning backwards from the end of file
//! - [`walker`]: visits central directory records in order
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The central directory is authoritative for sizes and CRC-32; local
//! headers are read only to find where each payload starts.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support

mod locator;
mod structures;
mod walker;

pub use locator::{CentralDirectoryLocation, MAX_COMMENT_SIZE, locate_eocd};
pub use structures::*;
pub use walker::{DirectoryWalker, WalkStep};
