use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::error::{ConvertError, Result};
use crate::io::ReadAt;
use crate::transcode::sink::TarSink;
use crate::transcode::{ConvertOptions, Framed, Mode, Transcoder};
use crate::zip::{
    CentralDirectoryLocation, CompressionMethod, DirectoryWalker, WalkStep, ZipFileEntry,
    locate_eocd,
};

/// What happened to one entry, handed to the progress callback.
#[derive(Debug, Clone)]
pub struct EntryReport {
    /// Name inside the archive.
    pub source_name: String,
    /// Tar member name or output file name.
    pub output_name: String,
    pub method: CompressionMethod,
    pub payload_len: u64,
    pub output_len: u64,
    pub is_directory: bool,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub entries_written: u64,
    pub entries_skipped: u64,
    /// Central directory records with an unexpected signature.
    pub records_skipped: u64,
    pub payload_bytes: u64,
    pub output_bytes: u64,
}

/// ZIP archive repacker
///
/// Locates the central directory once, then walks it record by record,
/// transcoding and writing each entry before reading the next record.
pub struct ZipRepacker<R: ReadAt> {
    reader: Arc<R>,
    options: ConvertOptions,
}

impl<R: ReadAt> ZipRepacker<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            reader,
            options: ConvertOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn locate(&self) -> Result<CentralDirectoryLocation> {
        locate_eocd(&*self.reader).await
    }

    /// List all well-formed records in the central directory
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let location = self.locate().await?;
        let mut walker = DirectoryWalker::new(&*self.reader, &location);
        let mut entries = Vec::with_capacity(location.total_records.min(65536) as usize);

        loop {
            match walker.next_entry().await? {
                WalkStep::Record(entry) => entries.push(entry),
                WalkStep::Skipped { .. } => {}
                WalkStep::EndOfDirectory => break,
            }
        }

        Ok(entries)
    }

    /// Write every entry as a tar member: DEFLATE payloads gzip-wrapped,
    /// STORE payloads raw.
    ///
    /// The stream ends with two zero blocks. On error the writer is left
    /// with whatever was written up to that point.
    pub async fn write_tar<W, F>(&self, writer: W, mut progress: F) -> Result<ConvertSummary>
    where
        W: AsyncWrite + Unpin,
        F: FnMut(&EntryReport),
    {
        let mut sink = TarSink::new(writer);

        let location = self.locate().await?;
        let mut walker = DirectoryWalker::new(&*self.reader, &location);
        let transcoder = Transcoder::new(&*self.reader, &self.options);
        let mut summary = ConvertSummary::default();

        while let Some((entry, framed)) = self
            .next_framed(&mut walker, &transcoder, Mode::Tar, &mut summary)
            .await?
        {
            sink.write_all(&framed.head).await?;
            sink.write_all(&framed.body).await?;
            sink.write_all(&framed.tail).await?;
            record(&mut summary, &entry, &framed, &mut progress);
        }

        summary.output_bytes = sink.finish().await?;
        log_summary(&summary);
        Ok(summary)
    }

    /// Write one standalone `<name>.gz` file per entry under `out_dir`.
    /// Directory entries become directories.
    pub async fn write_gzip_files<F>(&self, out_dir: &Path, mut progress: F) -> Result<ConvertSummary>
    where
        F: FnMut(&EntryReport),
    {
        let location = self.locate().await?;
        let mut walker = DirectoryWalker::new(&*self.reader, &location);
        let transcoder = Transcoder::new(&*self.reader, &self.options);
        let mut summary = ConvertSummary::default();

        while let Some((entry, framed)) = self
            .next_framed(&mut walker, &transcoder, Mode::GzipFiles, &mut summary)
            .await?
        {
            let path = match output_path(out_dir, &framed.name) {
                Ok(path) => path,
                Err(e) => {
                    self.skip_or_fail(e, &mut summary)?;
                    continue;
                }
            };

            if framed.is_directory {
                fs::create_dir_all(&path)
                    .await
                    .map_err(ConvertError::OutputWriteFailed)?;
            } else {
                write_file(&path, &framed).await?;
            }

            summary.output_bytes += framed.len();
            record(&mut summary, &entry, &framed, &mut progress);
        }

        log_summary(&summary);
        Ok(summary)
    }

    /// Advance the walk to the next entry that transcodes successfully.
    async fn next_framed(
        &self,
        walker: &mut DirectoryWalker<'_, R>,
        transcoder: &Transcoder<'_, R>,
        mode: Mode,
        summary: &mut ConvertSummary,
    ) -> Result<Option<(ZipFileEntry, Framed)>> {
        loop {
            let entry = match walker.next_entry().await? {
                WalkStep::Record(entry) => entry,
                WalkStep::Skipped { .. } => {
                    summary.records_skipped += 1;
                    continue;
                }
                WalkStep::EndOfDirectory => return Ok(None),
            };

            match transcoder.transcode(&entry, mode).await {
                Ok(framed) => return Ok(Some((entry, framed))),
                Err(e) => self.skip_or_fail(e, summary)?,
            }
        }
    }

    fn skip_or_fail(&self, err: ConvertError, summary: &mut ConvertSummary) -> Result<()> {
        if self.options.skip_bad_entries && err.is_entry_local() {
            warn!(error = %err, "skipping entry");
            summary.entries_skipped += 1;
            Ok(())
        } else {
            Err(err)
        }
    }
}

fn record<F: FnMut(&EntryReport)>(
    summary: &mut ConvertSummary,
    entry: &ZipFileEntry,
    framed: &Framed,
    progress: &mut F,
) {
    summary.entries_written += 1;
    summary.payload_bytes += entry.compressed_size;
    progress(&EntryReport {
        source_name: entry.file_name.clone(),
        output_name: framed.name.clone(),
        method: entry.compression_method,
        payload_len: entry.compressed_size,
        output_len: framed.len(),
        is_directory: framed.is_directory,
    });
}

fn log_summary(summary: &ConvertSummary) {
    info!(
        written = summary.entries_written,
        skipped = summary.entries_skipped,
        bad_records = summary.records_skipped,
        payload_bytes = summary.payload_bytes,
        output_bytes = summary.output_bytes,
        "conversion finished"
    );
}

/// Join an entry name onto the output directory, refusing names that would
/// land outside it.
fn output_path(out_dir: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    let mut has_normal = false;
    for component in relative.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            _ => return Err(ConvertError::UnsafeEntryPath(name.to_string())),
        }
    }
    if !has_normal {
        return Err(ConvertError::UnsafeEntryPath(name.to_string()));
    }
    Ok(out_dir.join(relative))
}

async fn write_file(path: &Path, framed: &Framed) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(ConvertError::OutputWriteFailed)?;
        }
    }

    let mut file = fs::File::create(path)
        .await
        .map_err(ConvertError::OutputWriteFailed)?;
    for part in [&framed.head, &framed.body, &framed.tail] {
        file.write_all(part)
            .await
            .map_err(ConvertError::OutputWriteFailed)?;
    }
    file.flush().await.map_err(ConvertError::OutputWriteFailed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_stays_inside_directory() {
        let root = Path::new("/out");
        assert_eq!(
            output_path(root, "docs/a.txt.gz").unwrap(),
            PathBuf::from("/out/docs/a.txt.gz")
        );
        assert_eq!(
            output_path(root, "./b.gz").unwrap(),
            PathBuf::from("/out/./b.gz")
        );
        for bad in ["../evil.gz", "/etc/passwd.gz", "a/../../b.gz", "", "."] {
            assert!(
                matches!(output_path(root, bad), Err(ConvertError::UnsafeEntryPath(_))),
                "{bad} should be rejected"
            );
        }
    }
}
