//! Wrapping raw ZIP payloads in gzip and tar framing.
//!
//! A ZIP entry compressed with DEFLATE already holds exactly the bytes a
//! gzip member carries between its header and footer, so each entry is
//! converted by copying its payload untouched and writing new framing
//! around it. CRC-32 and uncompressed size come from the central directory.

pub mod gzip;
pub mod sink;
pub mod tar;

use tracing::{debug, warn};

use crate::error::{ConvertError, Result};
use crate::io::ReadAt;
use crate::zip::{CompressionMethod, LFH_SIGNATURE, LFH_SIZE, LocalFileHeader, ZipFileEntry};

use self::tar::TarHeader;

/// Output layout.
///
/// A plain tarball and a tarball of gzip members are the same byte stream:
/// DEFLATE payloads are wrapped in gzip framing, STORE payloads are copied
/// raw, and the tar stream itself is never compressed. Both use
/// [`Mode::Tar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One standalone `<name>.gz` file per entry.
    GzipFiles,
    /// A tar stream of gzip-wrapped (DEFLATE) and raw (STORE) members.
    Tar,
}

/// Tar member naming.
#[derive(Debug, Clone, Default)]
pub struct TarOptions {
    /// Append `.gz` to the names of gzip-wrapped members.
    pub gz_suffix: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub tar: TarOptions,
    /// Check STORE payloads against the directory CRC-32.
    pub verify_crc: bool,
    /// Log and skip entries that cannot be converted instead of aborting.
    pub skip_bad_entries: bool,
}

/// One entry's output, in write order: `head`, `body`, `tail`.
#[derive(Debug)]
pub struct Framed {
    /// Output name: member name in a tarball, file name otherwise.
    pub name: String,
    pub head: Vec<u8>,
    pub body: Vec<u8>,
    pub tail: Vec<u8>,
    pub is_directory: bool,
}

impl Framed {
    pub fn len(&self) -> u64 {
        (self.head.len() + self.body.len() + self.tail.len()) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns one directory record into its framed output.
///
/// Every read is positioned, so the caller's walk over the central
/// directory is never disturbed.
pub struct Transcoder<'a, R: ReadAt + ?Sized> {
    reader: &'a R,
    options: &'a ConvertOptions,
}

impl<'a, R: ReadAt + ?Sized> Transcoder<'a, R> {
    pub fn new(reader: &'a R, options: &'a ConvertOptions) -> Self {
        Self { reader, options }
    }

    /// Frame `entry` for `mode`.
    ///
    /// Nothing is written here; a failing entry leaves the destination
    /// untouched.
    pub async fn transcode(&self, entry: &ZipFileEntry, mode: Mode) -> Result<Framed> {
        if entry.is_directory {
            return self.frame_directory(entry, mode);
        }

        let payload = self.read_payload(entry).await?;
        match mode {
            Mode::GzipFiles => self.frame_gzip_file(entry, payload),
            Mode::Tar => self.frame_tar_member(entry, payload),
        }
    }

    /// Read an entry's raw payload, exactly `compressed_size` bytes.
    ///
    /// # Errors
    ///
    /// [`ConvertError::UnsupportedCompressionMethod`] for anything but STORE
    /// and DEFLATE, [`ConvertError::InvalidLocalHeader`] if the local header
    /// signature is wrong, [`ConvertError::TruncatedEntry`] on a short read.
    pub async fn read_payload(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        if let CompressionMethod::Unknown(method) = entry.compression_method {
            return Err(ConvertError::UnsupportedCompressionMethod {
                name: entry.file_name.clone(),
                method,
            });
        }
        if entry.flags & 0x1 != 0 {
            warn!(name = %entry.file_name, "entry is encrypted; copying ciphertext as-is");
        }

        let mut lfh_buf = [0u8; LFH_SIZE];
        let got = self.read_entry_bytes(entry, entry.lfh_offset, &mut lfh_buf).await?;
        if got < LFH_SIZE {
            return Err(truncated(entry, LFH_SIZE as u64, got as u64));
        }
        let lfh = LocalFileHeader::from_bytes(&lfh_buf);
        if lfh.signature != LFH_SIGNATURE {
            return Err(ConvertError::InvalidLocalHeader {
                name: entry.file_name.clone(),
                signature: lfh.signature,
            });
        }

        let len = usize::try_from(entry.compressed_size).map_err(|_| ConvertError::SizeOverflow {
            name: entry.file_name.clone(),
            size: entry.compressed_size,
        })?;
        let data_offset = lfh.data_offset(entry.lfh_offset);

        let mut payload = vec![0u8; len];
        let got = self.read_entry_bytes(entry, data_offset, &mut payload).await?;
        if got < len {
            return Err(truncated(entry, entry.compressed_size, got as u64));
        }

        debug!(name = %entry.file_name, data_offset, len, "read payload");

        if self.options.verify_crc && entry.compression_method == CompressionMethod::Stored {
            let mut crc = flate2::Crc::new();
            crc.update(&payload);
            if crc.sum() != entry.crc32 {
                return Err(ConvertError::CrcMismatch {
                    name: entry.file_name.clone(),
                    expected: entry.crc32,
                    actual: crc.sum(),
                });
            }
        }

        Ok(payload)
    }

    async fn read_entry_bytes(
        &self,
        entry: &ZipFileEntry,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize> {
        let got = self
            .reader
            .read_exact_at(offset, buf)
            .await
            .map_err(ConvertError::SourceRead)?;
        if got < buf.len() {
            debug!(name = %entry.file_name, offset, wanted = buf.len(), got, "short read");
        }
        Ok(got)
    }

    /// Standalone gzip file. STORE payloads go into DEFLATE stored blocks so
    /// the result is still a valid gzip stream.
    fn frame_gzip_file(&self, entry: &ZipFileEntry, payload: Vec<u8>) -> Result<Framed> {
        let body = match entry.compression_method {
            CompressionMethod::Deflate => payload,
            _ => gzip::stored_blocks(&payload),
        };

        Ok(Framed {
            name: format!("{}.gz", entry.file_name),
            head: gzip::header().to_vec(),
            body,
            tail: gzip::footer(entry.crc32, entry.uncompressed_size).to_vec(),
            is_directory: false,
        })
    }

    /// Tar member: DEFLATE payloads become a gzip member, STORE payloads are
    /// copied raw. The member is padded to the next block boundary.
    fn frame_tar_member(&self, entry: &ZipFileEntry, payload: Vec<u8>) -> Result<Framed> {
        let deflated = entry.compression_method == CompressionMethod::Deflate;
        let content_len = if deflated {
            gzip::member_len(payload.len() as u64)
        } else {
            payload.len() as u64
        };

        let name = if deflated && self.options.tar.gz_suffix {
            format!("{}.gz", entry.file_name)
        } else {
            entry.file_name.clone()
        };

        let mut head =
            TarHeader::regular(name.as_str(), content_len, entry.unix_mtime()).to_blocks()?;
        let mut tail = Vec::new();
        if deflated {
            head.extend_from_slice(&gzip::header());
            tail.extend_from_slice(&gzip::footer(entry.crc32, entry.uncompressed_size));
        }
        tail.resize(tail.len() + tar::padding(content_len), 0);

        Ok(Framed {
            name,
            head,
            body: payload,
            tail,
            is_directory: false,
        })
    }

    fn frame_directory(&self, entry: &ZipFileEntry, mode: Mode) -> Result<Framed> {
        let head = match mode {
            Mode::GzipFiles => Vec::new(),
            Mode::Tar => TarHeader::directory(entry.file_name.as_str(), entry.unix_mtime())
                .to_blocks()?,
        };

        Ok(Framed {
            name: entry.file_name.clone(),
            head,
            body: Vec::new(),
            tail: Vec::new(),
            is_directory: true,
        })
    }
}

fn truncated(entry: &ZipFileEntry, expected: u64, actual: u64) -> ConvertError {
    ConvertError::TruncatedEntry {
        name: entry.file_name.clone(),
        expected,
        actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    /// A local header for `name` followed by `payload`.
    fn local_entry(name: &str, payload: &[u8]) -> Vec<u8> {
        let mut data = LFH_SIGNATURE.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 22]);
        data.extend_from_slice(&(name.len() as u16).to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(name.as_bytes());
        data.extend_from_slice(payload);
        data
    }

    fn entry(name: &str, method: CompressionMethod, compressed: u64, crc32: u32) -> ZipFileEntry {
        ZipFileEntry {
            file_name: name.to_string(),
            compression_method: method,
            flags: 0,
            compressed_size: compressed,
            uncompressed_size: 1000,
            crc32,
            lfh_offset: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            is_directory: name.ends_with('/'),
        }
    }

    #[tokio::test]
    async fn stored_tar_member_is_raw_and_padded() {
        let reader = MemoryReader::new(local_entry("a.txt", b"hello"));
        let options = ConvertOptions::default();
        let transcoder = Transcoder::new(&reader, &options);
        let mut a = entry("a.txt", CompressionMethod::Stored, 5, 0x3610a686);
        a.uncompressed_size = 5;

        let framed = transcoder.transcode(&a, Mode::Tar).await.unwrap();
        assert_eq!(framed.name, "a.txt");
        assert_eq!(framed.head.len(), 512);
        assert_eq!(framed.body, b"hello");
        assert_eq!(framed.tail, vec![0u8; 507]);
        assert_eq!(framed.len() % 512, 0);
    }

    #[tokio::test]
    async fn deflate_tar_member_is_gzip_wrapped() {
        let payload = [0xAAu8; 40];
        let reader = MemoryReader::new(local_entry("b.bin", &payload));
        let options = ConvertOptions {
            tar: TarOptions { gz_suffix: true },
            ..Default::default()
        };
        let transcoder = Transcoder::new(&reader, &options);
        let b = entry("b.bin", CompressionMethod::Deflate, 40, 0xCAFEBABE);

        let framed = transcoder.transcode(&b, Mode::Tar).await.unwrap();
        assert_eq!(framed.name, "b.bin.gz");
        assert_eq!(framed.head.len(), 512 + gzip::HEADER_LEN);
        assert_eq!(&framed.head[512..], &gzip::header());
        assert_eq!(framed.body, payload);
        assert_eq!(&framed.tail[..8], &gzip::footer(0xCAFEBABE, 1000));
        assert_eq!(framed.len(), 1024);
    }

    #[tokio::test]
    async fn gzip_file_keeps_payload_untouched() {
        let payload = [0x55u8; 12];
        let reader = MemoryReader::new(local_entry("c", &payload));
        let options = ConvertOptions::default();
        let transcoder = Transcoder::new(&reader, &options);
        let c = entry("c", CompressionMethod::Deflate, 12, 7);

        let framed = transcoder.transcode(&c, Mode::GzipFiles).await.unwrap();
        assert_eq!(framed.name, "c.gz");
        assert_eq!(framed.head, gzip::header());
        assert_eq!(framed.body, payload);
        assert_eq!(framed.tail, gzip::footer(7, 1000));
    }

    #[tokio::test]
    async fn directory_becomes_tar_directory_member() {
        let reader = MemoryReader::new(Vec::new());
        let options = ConvertOptions::default();
        let transcoder = Transcoder::new(&reader, &options);
        let dir = entry("docs/", CompressionMethod::Stored, 0, 0);

        let framed = transcoder.transcode(&dir, Mode::Tar).await.unwrap();
        assert!(framed.is_directory);
        assert_eq!(framed.head.len(), 512);
        assert_eq!(framed.head[156], b'5');

        let framed = transcoder.transcode(&dir, Mode::GzipFiles).await.unwrap();
        assert!(framed.is_empty());
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected() {
        let reader = MemoryReader::new(local_entry("x.bz2", b"BZh"));
        let options = ConvertOptions::default();
        let transcoder = Transcoder::new(&reader, &options);
        let x = entry("x.bz2", CompressionMethod::Unknown(12), 3, 0);

        assert!(matches!(
            transcoder.transcode(&x, Mode::Tar).await,
            Err(ConvertError::UnsupportedCompressionMethod { method: 12, .. })
        ));
    }

    #[tokio::test]
    async fn short_payload_is_truncated_entry() {
        let reader = MemoryReader::new(local_entry("t", b"abc"));
        let options = ConvertOptions::default();
        let transcoder = Transcoder::new(&reader, &options);
        let t = entry("t", CompressionMethod::Stored, 10, 0);

        match transcoder.transcode(&t, Mode::Tar).await {
            Err(ConvertError::TruncatedEntry {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 10);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_local_header_signature() {
        let mut data = local_entry("l", b"abc");
        data[0] = 0;
        let reader = MemoryReader::new(data);
        let options = ConvertOptions::default();
        let transcoder = Transcoder::new(&reader, &options);
        let l = entry("l", CompressionMethod::Stored, 3, 0);

        assert!(matches!(
            transcoder.read_payload(&l).await,
            Err(ConvertError::InvalidLocalHeader { .. })
        ));
    }

    #[tokio::test]
    async fn stored_crc_is_checked_when_asked() {
        let reader = MemoryReader::new(local_entry("a.txt", b"hello"));
        let options = ConvertOptions {
            verify_crc: true,
            ..Default::default()
        };
        let transcoder = Transcoder::new(&reader, &options);

        let good = entry("a.txt", CompressionMethod::Stored, 5, 0x3610a686);
        assert_eq!(transcoder.read_payload(&good).await.unwrap(), b"hello");

        let bad = entry("a.txt", CompressionMethod::Stored, 5, 0x12345678);
        assert!(matches!(
            transcoder.read_payload(&bad).await,
            Err(ConvertError::CrcMismatch {
                actual: 0x3610a686,
                ..
            })
        ));
    }
}
