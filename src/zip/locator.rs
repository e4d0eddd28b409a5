//! Locating the End of Central Directory record.
//!
//! The EOCD is the last record of an archive, followed only by its own
//! comment. A candidate is accepted when the signature matches *and* the
//! comment length it records equals the number of bytes left after it, so a
//! stray `PK\x05\x06` inside a comment is not mistaken for the real record.

use tracing::{debug, warn};

use crate::error::{ConvertError, Result};
use crate::io::ReadAt;

use super::structures::{EndOfCentralDirectory, Zip64EOCD, Zip64EOCDLocator};

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This bounds how far back from the end of the file the search goes.
pub const MAX_COMMENT_SIZE: u64 = 65535;

/// Where the central directory lives, as recorded by the EOCD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryLocation {
    /// Offset of the first central directory record from start of file.
    pub cd_offset: u64,
    /// Number of central directory records.
    pub total_records: u64,
    /// Offset of the EOCD record itself.
    pub eocd_offset: u64,
    /// Distance from the EOCD start to end of file (22 + comment length).
    pub eocd_distance_from_end: u64,
    /// The archive comment.
    pub comment: Vec<u8>,
}

/// Find the EOCD record and resolve the central directory location,
/// following the ZIP64 locator when the 32-bit fields are saturated.
///
/// # Errors
///
/// [`ConvertError::NotAZipArchive`] if no record whose comment length
/// corroborates its position exists within the last `22 + 65535` bytes.
pub async fn locate_eocd<R: ReadAt + ?Sized>(reader: &R) -> Result<CentralDirectoryLocation> {
    let size = reader.size();
    let eocd_size = EndOfCentralDirectory::SIZE as u64;
    if size < eocd_size {
        return Err(ConvertError::NotAZipArchive);
    }

    // Read the whole tail that could hold the EOCD plus a maximal comment
    let window_len = (MAX_COMMENT_SIZE + eocd_size).min(size);
    let window_start = size - window_len;
    let mut window = vec![0u8; window_len as usize];
    let got = reader
        .read_exact_at(window_start, &mut window)
        .await
        .map_err(ConvertError::SourceRead)?;
    if got < window.len() {
        return Err(ConvertError::TruncatedDirectory {
            offset: window_start,
            expected: window.len(),
            actual: got,
        });
    }

    let (eocd, index) = scan_for_eocd(&window).ok_or(ConvertError::NotAZipArchive)?;
    let eocd_offset = window_start + index as u64;
    let comment_start = index + EndOfCentralDirectory::SIZE;
    let comment = window[comment_start..].to_vec();

    debug!(
        eocd_offset,
        comment_len = eocd.comment_len,
        total_entries = eocd.total_entries,
        "located end of central directory"
    );

    let mut location = CentralDirectoryLocation {
        cd_offset: eocd.cd_offset as u64,
        total_records: eocd.total_entries as u64,
        eocd_offset,
        eocd_distance_from_end: size - eocd_offset,
        comment,
    };

    if eocd.is_zip64() {
        match read_zip64_eocd(reader, eocd_offset).await? {
            Some(eocd64) => {
                location.cd_offset = eocd64.cd_offset;
                location.total_records = eocd64.total_entries;
            }
            None => warn!(
                eocd_offset,
                "EOCD fields are saturated but no ZIP64 locator precedes it; using 32-bit values"
            ),
        }
    }

    Ok(location)
}

/// Walk candidate positions from the end of `window` backwards, one byte at
/// a time, returning the first record whose comment length matches the
/// bytes that follow it.
fn scan_for_eocd(window: &[u8]) -> Option<(EndOfCentralDirectory, usize)> {
    let last = window.len().checked_sub(EndOfCentralDirectory::SIZE)?;
    (0..=last).rev().find_map(|index| {
        let eocd = EndOfCentralDirectory::from_bytes(&window[index..])?;
        let trailing = window.len() - index - EndOfCentralDirectory::SIZE;
        (eocd.comment_len as usize == trailing).then_some((eocd, index))
    })
}

/// Read the ZIP64 End of Central Directory record.
///
/// The ZIP64 EOCD Locator sits immediately before the regular EOCD and
/// points at the ZIP64 record. Returns `None` if the locator is absent.
async fn read_zip64_eocd<R: ReadAt + ?Sized>(
    reader: &R,
    eocd_offset: u64,
) -> Result<Option<Zip64EOCD>> {
    let Some(locator_offset) = eocd_offset.checked_sub(Zip64EOCDLocator::SIZE as u64) else {
        return Ok(None);
    };

    let mut locator_buf = [0u8; Zip64EOCDLocator::SIZE];
    read_record(reader, locator_offset, &mut locator_buf).await?;
    let Some(locator) = Zip64EOCDLocator::from_bytes(&locator_buf) else {
        return Ok(None);
    };

    let mut eocd64_buf = [0u8; Zip64EOCD::MIN_SIZE];
    read_record(reader, locator.eocd64_offset, &mut eocd64_buf).await?;
    Zip64EOCD::from_bytes(&eocd64_buf)
        .map(Some)
        .ok_or(ConvertError::NotAZipArchive)
}

async fn read_record<R: ReadAt + ?Sized>(reader: &R, offset: u64, buf: &mut [u8]) -> Result<()> {
    let got = reader
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
