use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{ConvertError, Result};

use super::tar::END_OF_ARCHIVE;

/// Destination of a tar stream.
///
/// Counts what it hands to the writer and closes the archive with the two
/// end-of-archive blocks on [`TarSink::finish`].
pub struct TarSink<W> {
    inner: W,
    written: u64,
}

impl<W: AsyncWrite + Unpin> TarSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes handed to the writer so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        self.inner
            .write_all(buf)
            .await
            .map_err(ConvertError::OutputWriteFailed)?;
        self.written += buf.len() as u64;
        Ok(())
    }

    /// Write the end-of-archive blocks and flush. Returns the total number
    /// of bytes written.
    pub async fn finish(mut self) -> Result<u64> {
        self.write_all(&END_OF_ARCHIVE).await?;
        self.inner
            .flush()
            .await
            .map_err(ConvertError::OutputWriteFailed)?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    struct DiskFull;

    impl AsyncWrite for DiskFull {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::other("disk full")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn appends_end_of_archive() {
        let mut out = Vec::new();
        let mut sink = TarSink::new(&mut out);
        sink.write_all(&[7u8; 512]).await.unwrap();
        assert_eq!(sink.written(), 512);
        let written = sink.finish().await.unwrap();

        assert_eq!(written, 1536);
        assert_eq!(out.len(), 1536);
        assert!(out[..512].iter().all(|&b| b == 7));
        assert!(out[512..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn write_errors_surface_as_output_failures() {
        let mut sink = TarSink::new(DiskFull);
        let err = sink.write_all(&[1u8; 16]).await.unwrap_err();
        assert!(matches!(err, ConvertError::OutputWriteFailed(_)));
        assert!(!err.is_entry_local());
        assert_eq!(sink.written(), 0);
    }
}
