//! Sequential walk over central directory records.

use tracing::{debug, warn};

use crate::error::{ConvertError, Result};
use crate::io::ReadAt;

use super::locator::CentralDirectoryLocation;
use super::structures::{CDFH_SIGNATURE, CDFH_SIZE, CentralDirectoryHeader, ZipFileEntry};

/// One step of the walk.
#[derive(Debug, Clone)]
pub enum WalkStep {
    /// A well-formed record.
    Record(ZipFileEntry),
    /// A record with an unexpected signature. Its length fields were still
    /// used to step over it.
    Skipped { offset: u64, signature: u32 },
    /// All records announced by the EOCD have been visited.
    EndOfDirectory,
}

/// Reads central directory records one after another.
///
/// The walker keeps its own offset and only issues positioned reads, so
/// fetching entry payloads in between steps never disturbs it.
pub struct DirectoryWalker<'a, R: ReadAt + ?Sized> {
    reader: &'a R,
    offset: u64,
    remaining: u64,
}

impl<'a, R: ReadAt + ?Sized> DirectoryWalker<'a, R> {
    pub fn new(reader: &'a R, location: &CentralDirectoryLocation) -> Self {
        Self {
            reader,
            offset: location.cd_offset,
            remaining: location.total_records,
        }
    }

    /// Offset of the next record to be read.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of records not yet visited.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Read the next record.
    ///
    /// # Errors
    ///
    /// [`ConvertError::TruncatedDirectory`] if the fixed part or the
    /// name/extra/comment trailer of a record runs past the end of data.
    pub async fn next_entry(&mut self) -> Result<WalkStep> {
        if self.remaining == 0 {
            return Ok(WalkStep::EndOfDirectory);
        }

        let record_offset = self.offset;
        let mut fixed = [0u8; CDFH_SIZE];
        self.read_full(record_offset, &mut fixed).await?;
        let header = CentralDirectoryHeader::from_bytes(&fixed);

        let trailer_offset = record_offset + CDFH_SIZE as u64;
        let next_offset = trailer_offset + header.trailer_len() as u64;
        self.remaining -= 1;

        if header.signature != CDFH_SIGNATURE {
            warn!(
                offset = record_offset,
                signature = format_args!("{:#010x}", header.signature),
                "skipping central directory record with unexpected signature"
            );
            self.offset = next_offset;
            return Ok(WalkStep::Skipped {
                offset: record_offset,
                signature: header.signature,
            });
        }

        let mut trailer = vec![0u8; header.trailer_len()];
        self.read_full(trailer_offset, &mut trailer).await?;
        self.offset = next_offset;

        let entry = ZipFileEntry::from_header(&header, &trailer);
        debug!(
            name = %entry.file_name,
            method = entry.compression_method.as_u16(),
            compressed_size = entry.compressed_size,
            uncompressed_size = entry.uncompressed_size,
            lfh_offset = entry.lfh_offset,
            "read central directory record"
        );
        Ok(WalkStep::Record(entry))
    }

    async fn read_full(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let got = self
            .reader
            .read_exact_at(offset, buf)
            .await
            .map_err(ConvertError::SourceRead)?;
        if got < buf.len() {
            return Err(ConvertError::TruncatedDirectory {
                offset,
                expected: buf.len(),
                actual: got,
            });
        }
        Ok(())
    }
}
