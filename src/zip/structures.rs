//! On-disk ZIP records.
//!
//! Every record is decoded field by field from a byte slice at fixed,
//! little-endian offsets. Callers make sure the slice is long enough.

use byteorder::{ByteOrder, LittleEndian};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    /// Short label used in listings.
    pub fn label(&self) -> &'static str {
        match self {
            CompressionMethod::Stored => "stored",
            CompressionMethod::Deflate => "deflate",
            CompressionMethod::Unknown(_) => "unknown",
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
///
/// ```text
///  0  signature          u32  0x06054b50
///  4  disk number        u16
///  6  disk with CD       u16
///  8  entries this disk  u16
/// 10  total entries      u16
/// 12  CD size            u32
/// 16  CD offset          u32
/// 20  comment length     u16
/// ```
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x06054b50;
    pub const SIZE: usize = 22;

    /// Decode a candidate record, or `None` if the signature does not match.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE || LittleEndian::read_u32(&data[0..4]) != Self::SIGNATURE {
            return None;
        }

        Some(Self {
            disk_number: LittleEndian::read_u16(&data[4..6]),
            disk_with_cd: LittleEndian::read_u16(&data[6..8]),
            disk_entries: LittleEndian::read_u16(&data[8..10]),
            total_entries: LittleEndian::read_u16(&data[10..12]),
            cd_size: LittleEndian::read_u32(&data[12..16]),
            cd_offset: LittleEndian::read_u32(&data[16..20]),
            comment_len: LittleEndian::read_u16(&data[20..22]),
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone)]
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: u32 = 0x07064b50;
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE || LittleEndian::read_u32(&data[0..4]) != Self::SIGNATURE {
            return None;
        }

        Some(Self {
            disk_with_eocd64: LittleEndian::read_u32(&data[4..8]),
            eocd64_offset: LittleEndian::read_u64(&data[8..16]),
            total_disks: LittleEndian::read_u32(&data[16..20]),
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
#[derive(Debug, Clone)]
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: u32 = 0x06064b50;
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::MIN_SIZE || LittleEndian::read_u32(&data[0..4]) != Self::SIGNATURE {
            return None;
        }

        Some(Self {
            eocd64_size: LittleEndian::read_u64(&data[4..12]),
            version_made_by: LittleEndian::read_u16(&data[12..14]),
            version_needed: LittleEndian::read_u16(&data[14..16]),
            disk_number: LittleEndian::read_u32(&data[16..20]),
            disk_with_cd: LittleEndian::read_u32(&data[20..24]),
            disk_entries: LittleEndian::read_u64(&data[24..32]),
            total_entries: LittleEndian::read_u64(&data[32..40]),
            cd_size: LittleEndian::read_u64(&data[40..48]),
            cd_offset: LittleEndian::read_u64(&data[48..56]),
        })
    }
}

/// Fixed part of a Central Directory File Header (CDFH) - 46 bytes
///
/// ```text
///  0  signature          u32  0x02014b50
///  4  version made by    u16
///  6  version needed     u16
///  8  flags              u16
/// 10  compression        u16
/// 12  mod time           u16
/// 14  mod date           u16
/// 16  crc-32             u32
/// 20  compressed size    u32
/// 24  uncompressed size  u32
/// 28  name length        u16
/// 30  extra length       u16
/// 32  comment length     u16
/// 34  disk number start  u16
/// 36  internal attrs     u16
/// 38  external attrs     u32
/// 42  local header off.  u32
/// ```
#[derive(Debug, Clone)]
pub struct CentralDirectoryHeader {
    pub signature: u32,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number_start: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub lfh_offset: u32,
}

pub const CDFH_SIGNATURE: u32 = 0x02014b50;
pub const CDFH_SIZE: usize = 46;

impl CentralDirectoryHeader {
    pub fn from_bytes(data: &[u8; CDFH_SIZE]) -> Self {
        Self {
            signature: LittleEndian::read_u32(&data[0..4]),
            version_made_by: LittleEndian::read_u16(&data[4..6]),
            version_needed: LittleEndian::read_u16(&data[6..8]),
            flags: LittleEndian::read_u16(&data[8..10]),
            compression_method: LittleEndian::read_u16(&data[10..12]),
            last_mod_time: LittleEndian::read_u16(&data[12..14]),
            last_mod_date: LittleEndian::read_u16(&data[14..16]),
            crc32: LittleEndian::read_u32(&data[16..20]),
            compressed_size: LittleEndian::read_u32(&data[20..24]),
            uncompressed_size: LittleEndian::read_u32(&data[24..28]),
            file_name_length: LittleEndian::read_u16(&data[28..30]),
            extra_field_length: LittleEndian::read_u16(&data[30..32]),
            file_comment_length: LittleEndian::read_u16(&data[32..34]),
            disk_number_start: LittleEndian::read_u16(&data[34..36]),
            internal_attrs: LittleEndian::read_u16(&data[36..38]),
            external_attrs: LittleEndian::read_u32(&data[38..42]),
            lfh_offset: LittleEndian::read_u32(&data[42..46]),
        }
    }

    /// Length of the name, extra field and comment that follow the fixed part.
    pub fn trailer_len(&self) -> usize {
        self.file_name_length as usize
            + self.extra_field_length as usize
            + self.file_comment_length as usize
    }
}

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: u32 = 0x04034b50;
pub const LFH_SIZE: usize = 30;

/// The two LFH fields needed to find where an entry's payload starts.
#[derive(Debug, Clone, Copy)]
pub struct LocalFileHeader {
    pub signature: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub fn from_bytes(data: &[u8; LFH_SIZE]) -> Self {
        Self {
            signature: LittleEndian::read_u32(&data[0..4]),
            file_name_length: LittleEndian::read_u16(&data[26..28]),
            extra_field_length: LittleEndian::read_u16(&data[28..30]),
        }
    }

    /// Offset of the payload given the offset of this header.
    pub fn data_offset(&self, lfh_offset: u64) -> u64 {
        lfh_offset
            + LFH_SIZE as u64
            + self.file_name_length as u64
            + self.extra_field_length as u64
    }
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub flags: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// Build an entry from a CDFH and its variable-length trailer.
    ///
    /// `trailer` holds the name, extra field and comment in that order.
    pub fn from_header(header: &CentralDirectoryHeader, trailer: &[u8]) -> Self {
        let name_end = header.file_name_length as usize;
        let extra_end = name_end + header.extra_field_length as usize;

        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let file_name = String::from_utf8_lossy(&trailer[..name_end]).into_owned();
        let is_directory = file_name.ends_with('/');

        let mut entry = Self {
            file_name,
            compression_method: CompressionMethod::from_u16(header.compression_method),
            flags: header.flags,
            compressed_size: header.compressed_size as u64,
            uncompressed_size: header.uncompressed_size as u64,
            crc32: header.crc32,
            lfh_offset: header.lfh_offset as u64,
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
            is_directory,
        };
        entry.apply_zip64_extra(&trailer[name_end..extra_end]);
        entry
    }

    /// Replace saturated 32-bit fields with values from the ZIP64 extended
    /// information extra field (ID 0x0001), if present.
    fn apply_zip64_extra(&mut self, extra: &[u8]) {
        let mut pos = 0;
        while pos + 4 <= extra.len() {
            let header_id = LittleEndian::read_u16(&extra[pos..pos + 2]);
            let field_size = LittleEndian::read_u16(&extra[pos + 2..pos + 4]) as usize;
            let body_start = pos + 4;
            let body_end = (body_start + field_size).min(extra.len());

            if header_id == 0x0001 {
                // Fields are present only if the header field is 0xFFFFFFFF
                let body = &extra[body_start..body_end];
                let mut at = 0;
                for field in [
                    &mut self.uncompressed_size,
                    &mut self.compressed_size,
                    &mut self.lfh_offset,
                ] {
                    if *field == 0xFFFFFFFF && at + 8 <= body.len() {
                        *field = LittleEndian::read_u64(&body[at..at + 8]);
                        at += 8;
                    }
                }
                return;
            }

            pos = body_end;
        }
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Modification time as seconds since the Unix epoch, reading the DOS
    /// timestamp as UTC. Out-of-range dates clamp to the epoch.
    pub fn unix_mtime(&self) -> u64 {
        let (year, month, day) = self.mod_date();
        let (hour, minute, second) = self.mod_time();
        if !(1..=12).contains(&month) || day == 0 {
            return 0;
        }

        // Days from civil date, shifted so March is the first month
        let (y, m) = if month <= 2 {
            (year as i64 - 1, month as i64 + 9)
        } else {
            (year as i64, month as i64 - 3)
        };
        let era = y.div_euclid(400);
        let yoe = y - era * 400;
        let doy = (153 * m + 2) / 5 + day as i64 - 1;
        let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
        let days = era * 146097 + doe - 719468;

        let secs = days * 86400 + hour as i64 * 3600 + minute as i64 * 60 + second as i64;
        secs.max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_dos_time(date: u16, time: u16) -> ZipFileEntry {
        ZipFileEntry {
            file_name: "a".to_string(),
            compression_method: CompressionMethod::Stored,
            flags: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: 0,
            last_mod_time: time,
            last_mod_date: date,
            is_directory: false,
        }
    }

    #[test]
    fn dos_timestamp_to_unix() {
        // 2021-06-15 12:30:10
        let date = ((2021 - 1980) << 9) | (6 << 5) | 15;
        let time = (12 << 11) | (30 << 5) | 5;
        let entry = entry_with_dos_time(date, time);
        assert_eq!(entry.mod_date(), (2021, 6, 15));
        assert_eq!(entry.mod_time(), (12, 30, 10));
        assert_eq!(entry.unix_mtime(), 1_623_760_210);
    }

    #[test]
    fn zero_dos_date_maps_to_epoch() {
        assert_eq!(entry_with_dos_time(0, 0).unix_mtime(), 0);
    }

    #[test]
    fn zip64_extra_overrides_saturated_fields() {
        let mut raw = [0u8; CDFH_SIZE];
        LittleEndian::write_u32(&mut raw[0..4], CDFH_SIGNATURE);
        LittleEndian::write_u16(&mut raw[10..12], 8);
        LittleEndian::write_u32(&mut raw[20..24], 0xFFFFFFFF);
        LittleEndian::write_u32(&mut raw[24..28], 0xFFFFFFFF);
        LittleEndian::write_u16(&mut raw[28..30], 3);
        LittleEndian::write_u16(&mut raw[30..32], 20);
        LittleEndian::write_u32(&mut raw[42..46], 1234);
        let header = CentralDirectoryHeader::from_bytes(&raw);

        let mut trailer = b"big".to_vec();
        trailer.extend_from_slice(&[0x01, 0x00, 16, 0]);
        trailer.extend_from_slice(&(5u64 << 32).to_le_bytes());
        trailer.extend_from_slice(&(3u64 << 32).to_le_bytes());

        let entry = ZipFileEntry::from_header(&header, &trailer);
        assert_eq!(entry.file_name, "big");
        assert_eq!(entry.compression_method, CompressionMethod::Deflate);
        assert_eq!(entry.uncompressed_size, 5u64 << 32);
        assert_eq!(entry.compressed_size, 3u64 << 32);
        assert_eq!(entry.lfh_offset, 1234);
    }

    #[test]
    fn eocd_rejects_wrong_signature() {
        let mut raw = [0u8; EndOfCentralDirectory::SIZE];
        assert!(EndOfCentralDirectory::from_bytes(&raw).is_none());
        LittleEndian::write_u32(&mut raw[0..4], EndOfCentralDirectory::SIGNATURE);
        LittleEndian::write_u16(&mut raw[10..12], 7);
        let eocd = EndOfCentralDirectory::from_bytes(&raw).unwrap();
        assert_eq!(eocd.total_entries, 7);
        assert!(!eocd.is_zip64());
    }
}
