//! # ziprepack
//!
//! Repack a ZIP archive into gzip files or a tarball without inflating or
//! re-deflating any entry.
//!
//! A DEFLATE entry in a ZIP archive carries exactly the bytes a gzip member
//! carries, and the central directory already records the CRC-32 and size a
//! gzip footer needs. Converting is therefore a matter of copying each
//! payload and writing new framing around it.
//!
//! ## Features
//!
//! - One standalone `.gz` file per entry
//! - A tarball whose members are gzip-wrapped (DEFLATE) or raw (STORE)
//!   entries, with pax `path` records for names ustar cannot hold
//! - Local files and HTTP/HTTPS URLs (via Range requests) as sources
//! - ZIP64 archives
//! - STORED and DEFLATE entries
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use ziprepack::{LocalFileReader, ZipRepacker};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(LocalFileReader::new(Path::new("archive.zip"))?);
//!     let repacker = ZipRepacker::new(reader);
//!
//!     let mut out = tokio::fs::File::create("archive.tar").await?;
//!     let summary = repacker
//!         .write_tar(&mut out, |entry| println!("{}", entry.output_name))
//!         .await?;
//!     println!("{} entries", summary.entries_written);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod repack;
pub mod transcode;
pub mod zip;

pub use cli::Cli;
pub use error::{ConvertError, Result};
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
pub use repack::{ConvertSummary, EntryReport, ZipRepacker};
pub use transcode::{ConvertOptions, Mode, TarOptions, Transcoder};
pub use zip::{DirectoryWalker, WalkStep, ZipFileEntry, locate_eocd};
