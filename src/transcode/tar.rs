//! POSIX ustar header encoding.
//!
//! Numeric fields are zero-filled octal ASCII terminated by NUL. The
//! checksum is the unsigned byte sum of the whole block with the checksum
//! field read as eight spaces, stored as six octal digits, NUL, space.
//!
//! Paths that fit neither `name` nor a `prefix`/`name` split are carried by
//! a pax extended header (typeflag `x`) holding a `path` record, placed
//! right before the member's own header.

use crate::error::{ConvertError, Result};

pub const BLOCK_SIZE: usize = 512;
pub const NAME_LEN: usize = 100;
pub const PREFIX_LEN: usize = 155;

/// Two zero blocks terminate an archive.
pub const END_OF_ARCHIVE: [u8; 2 * BLOCK_SIZE] = [0; 2 * BLOCK_SIZE];

/// Largest size an 11-digit octal field can hold.
pub const MAX_MEMBER_SIZE: u64 = 0o777_7777_7777;

/// Name written in the header of a pax extended header member.
pub const PAX_HEADER_NAME: &str = "././@PaxHeader";

const NAME_OFF: usize = 0;
const MODE_OFF: usize = 100;
const UID_OFF: usize = 108;
const GID_OFF: usize = 116;
const SIZE_OFF: usize = 124;
const MTIME_OFF: usize = 136;
const CHKSUM_OFF: usize = 148;
const CHKSUM_LEN: usize = 8;
const TYPEFLAG_OFF: usize = 156;
const MAGIC_OFF: usize = 257;
const VERSION_OFF: usize = 263;
const PREFIX_OFF: usize = 345;

const MAGIC: &[u8; 6] = b"ustar\0";
const VERSION: &[u8; 2] = b"00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Regular,
    Directory,
    /// pax extended header for the member that follows.
    PaxExtension,
}

impl EntryType {
    fn typeflag(self) -> u8 {
        match self {
            EntryType::Regular => b'0',
            EntryType::Directory => b'5',
            EntryType::PaxExtension => b'x',
        }
    }
}

/// The fields this tool fills in; everything else stays zero.
#[derive(Debug, Clone)]
pub struct TarHeader {
    pub path: String,
    pub mode: u32,
    pub size: u64,
    pub mtime: u64,
    pub entry_type: EntryType,
}

impl TarHeader {
    pub fn regular(path: impl Into<String>, size: u64, mtime: u64) -> Self {
        Self {
            path: path.into(),
            mode: 0o644,
            size,
            mtime,
            entry_type: EntryType::Regular,
        }
    }

    pub fn directory(path: impl Into<String>, mtime: u64) -> Self {
        Self {
            path: path.into(),
            mode: 0o755,
            size: 0,
            mtime,
            entry_type: EntryType::Directory,
        }
    }

    /// Encode the header blocks that precede the member's content.
    ///
    /// A path that fits the ustar fields gives a single block. Otherwise
    /// the result is a pax extended header carrying the full path, its
    /// padded record block(s), then the member header with the path cut to
    /// the first 100 bytes.
    ///
    /// # Errors
    ///
    /// [`ConvertError::SizeOverflow`] if the size needs more than 11 octal
    /// digits.
    pub fn to_blocks(&self) -> Result<Vec<u8>> {
        if self.size > MAX_MEMBER_SIZE {
            return Err(ConvertError::SizeOverflow {
                name: self.path.clone(),
                size: self.size,
            });
        }

        if let Some((prefix, name)) = split_name(&self.path) {
            return Ok(self.encode(prefix.as_bytes(), name.as_bytes()).to_vec());
        }

        let record = pax_record("path", &self.path);
        let extension = TarHeader {
            path: PAX_HEADER_NAME.to_string(),
            mode: 0o644,
            size: record.len() as u64,
            mtime: self.mtime,
            entry_type: EntryType::PaxExtension,
        };

        let mut blocks = extension.encode(b"", PAX_HEADER_NAME.as_bytes()).to_vec();
        blocks.extend_from_slice(&record);
        blocks.resize(blocks.len() + padding(record.len() as u64), 0);
        let short = &self.path.as_bytes()[..NAME_LEN];
        blocks.extend_from_slice(&self.encode(b"", short));
        Ok(blocks)
    }

    fn encode(&self, prefix: &[u8], name: &[u8]) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[NAME_OFF..NAME_OFF + name.len()].copy_from_slice(name);
        write_octal(&mut block[MODE_OFF..MODE_OFF + 8], self.mode as u64);
        write_octal(&mut block[UID_OFF..UID_OFF + 8], 0);
        write_octal(&mut block[GID_OFF..GID_OFF + 8], 0);
        write_octal(&mut block[SIZE_OFF..SIZE_OFF + 12], self.size);
        write_octal(&mut block[MTIME_OFF..MTIME_OFF + 12], self.mtime.min(MAX_MEMBER_SIZE));
        block[TYPEFLAG_OFF] = self.entry_type.typeflag();
        block[MAGIC_OFF..MAGIC_OFF + 6].copy_from_slice(MAGIC);
        block[VERSION_OFF..VERSION_OFF + 2].copy_from_slice(VERSION);
        block[PREFIX_OFF..PREFIX_OFF + prefix.len()].copy_from_slice(prefix);

        let sum = checksum(&block);
        write_octal(&mut block[CHKSUM_OFF..CHKSUM_OFF + 7], sum as u64);
        block[CHKSUM_OFF + 7] = b' ';
        block
    }
}

/// One pax record, `"<len> <key>=<value>\n"`, where `len` counts the whole
/// record including its own digits.
pub fn pax_record(key: &str, value: &str) -> Vec<u8> {
    let body = key.len() + value.len() + 3;
    let mut len = body + 1;
    while len != body + len.to_string().len() {
        len = body + len.to_string().len();
    }
    format!("{len} {key}={value}\n").into_bytes()
}

/// Split a path into `(prefix, name)` for the ustar header, or `None` if
/// it does not fit.
///
/// Paths up to 100 bytes go entirely in `name`. Longer paths are split at
/// the last `/` that leaves at most 155 bytes of prefix and a non-empty name
/// of at most 100 bytes.
pub fn split_name(path: &str) -> Option<(&str, &str)> {
    if path.len() <= NAME_LEN {
        return Some(("", path));
    }

    let bytes = path.as_bytes();
    (1..=PREFIX_LEN.min(bytes.len() - 1))
        .rev()
        .filter(|&i| bytes[i] == b'/')
        .map(|i| (&path[..i], &path[i + 1..]))
        .find(|(_, name)| !name.is_empty() && name.len() <= NAME_LEN)
}

/// Unsigned byte sum of a header with the checksum field read as spaces.
pub fn checksum(block: &[u8; BLOCK_SIZE]) -> u32 {
    let field = CHKSUM_OFF..CHKSUM_OFF + CHKSUM_LEN;
    block
        .iter()
        .enumerate()
        .map(|(i, &b)| if field.contains(&i) { b' ' as u32 } else { b as u32 })
        .sum()
}

/// Zero bytes needed after `len` bytes to reach the next block boundary.
pub fn padding(len: u64) -> usize {
    let remainder = (len % BLOCK_SIZE as u64) as usize;
    if remainder == 0 { 0 } else { BLOCK_SIZE - remainder }
}

/// Fill `field` with zero-padded octal digits followed by a NUL.
fn write_octal(field: &mut [u8], value: u64) {
    let digits = field.len() - 1;
    let text = format!("{:0digits$o}", value, digits = digits);
    let text = &text.as_bytes()[text.len() - digits..];
    field[..digits].copy_from_slice(text);
    field[digits] = 0;
}
