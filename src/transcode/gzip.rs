//! Gzip member framing around an existing DEFLATE stream (RFC 1952).
//!
//! ```text
//! +----+----+----+-----+-----+-----+-----+-----+-----+----+
//! | 1f | 8b | CM | FLG |       MTIME           | XFL | OS |   header
//! +----+----+----+-----+-----+-----+-----+-----+-----+----+
//! |           ... DEFLATE stream ...                      |
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! |        CRC-32         |         ISIZE         |         footer
//! +-----+-----+-----+-----+-----+-----+-----+-----+
//! ```

use byteorder::{ByteOrder, LittleEndian};

pub const HEADER_LEN: usize = 10;
pub const FOOTER_LEN: usize = 8;

const MAGIC: [u8; 2] = [0x1f, 0x8b];
const METHOD_DEFLATE: u8 = 8;
const OS_UNIX: u8 = 3;

/// Largest payload a single DEFLATE stored block can carry.
pub const MAX_STORED_BLOCK: usize = 0xFFFF;

/// Size of the per-block header (BFINAL/BTYPE byte, LEN, NLEN).
const STORED_BLOCK_HEADER_LEN: usize = 5;

/// Fixed gzip header: no flags, no timestamp, OS = Unix.
pub fn header() -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0..2].copy_from_slice(&MAGIC);
    header[2] = METHOD_DEFLATE;
    header[9] = OS_UNIX;
    header
}

/// Gzip footer carrying the CRC-32 and the uncompressed size mod 2^32.
pub fn footer(crc32: u32, uncompressed_size: u64) -> [u8; FOOTER_LEN] {
    let mut footer = [0u8; FOOTER_LEN];
    LittleEndian::write_u32(&mut footer[0..4], crc32);
    LittleEndian::write_u32(&mut footer[4..8], uncompressed_size as u32);
    footer
}

/// Total size of a gzip member whose DEFLATE body is `body_len` bytes.
pub fn member_len(body_len: u64) -> u64 {
    body_len + (HEADER_LEN + FOOTER_LEN) as u64
}

/// Length of `payload_len` bytes once split into DEFLATE stored blocks.
pub fn stored_blocks_len(payload_len: u64) -> u64 {
    let blocks = payload_len.div_ceil(MAX_STORED_BLOCK as u64).max(1);
    payload_len + blocks * STORED_BLOCK_HEADER_LEN as u64
}

/// Wrap raw bytes in DEFLATE stored (uncompressed) blocks.
///
/// This is framing only: the bytes are copied, not compressed. An empty
/// payload still yields one final, empty block.
pub fn stored_blocks(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(stored_blocks_len(payload.len() as u64) as usize);
    let mut chunks = payload.chunks(MAX_STORED_BLOCK).peekable();

    if chunks.peek().is_none() {
        push_stored_block(&mut out, &[], true);
        return out;
    }

    while let Some(chunk) = chunks.next() {
        push_stored_block(&mut out, chunk, chunks.peek().is_none());
    }
    out
}

fn push_stored_block(out: &mut Vec<u8>, chunk: &[u8], last: bool) {
    let len = chunk.len() as u16;
    // BFINAL in bit 0, BTYPE=00 in bits 1-2, rest pads to the byte boundary
    out.push(u8::from(last));
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&(!len).to_le_bytes());
    out.extend_from_slice(chunk);
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Crc;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn gunzip(member: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(member).read_to_end(&mut out).unwrap();
        out
    }

    fn wrap_stored(payload: &[u8]) -> Vec<u8> {
        let mut crc = Crc::new();
        crc.update(payload);

        let mut member = header().to_vec();
        member.extend(stored_blocks(payload));
        member.extend_from_slice(&footer(crc.sum(), payload.len() as u64));
        member
    }

    #[test]
    fn header_layout() {
        assert_eq!(header(), [0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 3]);
    }

    #[test]
    fn footer_truncates_size_to_32_bits() {
        let footer = footer(0x01020304, (1u64 << 32) + 1000);
        assert_eq!(footer, [4, 3, 2, 1, 0xe8, 0x03, 0, 0]);
    }

    #[test]
    fn stored_blocks_round_trip() {
        for len in [0usize, 1, 5, MAX_STORED_BLOCK, MAX_STORED_BLOCK + 1, 200_000] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 % 251) as u8).collect();
            let body = stored_blocks(&payload);
            assert_eq!(body.len() as u64, stored_blocks_len(len as u64));
            assert_eq!(gunzip(&wrap_stored(&payload)), payload);
        }
    }

    #[test]
    fn empty_payload_is_one_final_block() {
        assert_eq!(stored_blocks(&[]), [1, 0, 0, 0xff, 0xff]);
        assert_eq!(member_len(5), 23);
    }
}
