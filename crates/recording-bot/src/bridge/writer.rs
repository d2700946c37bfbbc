//! Sequential appender for one recording file.
//!
//! Each file gets its own writer task fed by a bounded mailbox. The file is
//! opened lazily in append mode on the first chunk, so a recording that never
//! produces media never creates an empty file.
//!
//! A writer that receives nothing for its idle timeout closes its mailbox,
//! writes what was already queued, closes the file and exits. The host then
//! retires it and spawns a fresh writer if the file gets another chunk.

use crate::observability::metrics;
use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

/// Mailbox size of a single writer.
const WRITER_CHANNEL_BUFFER: usize = 64;

/// What a writer did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub chunks_written: u64,
    pub bytes_written: u64,
    pub failures: u64,
}

impl WriterStats {
    pub fn absorb(&mut self, other: WriterStats) {
        self.chunks_written += other.chunks_written;
        self.bytes_written += other.bytes_written;
        self.failures += other.failures;
    }
}

/// Handle to a running [`ChunkWriter`].
pub struct ChunkWriterHandle {
    sender: mpsc::Sender<Bytes>,
    task: JoinHandle<WriterStats>,
}

impl ChunkWriterHandle {
    /// Spawn a writer appending to `path` that exits after `idle_timeout`
    /// without chunks.
    #[must_use]
    pub fn spawn(path: PathBuf, idle_timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(WRITER_CHANNEL_BUFFER);
        let writer = ChunkWriter {
            path,
            file: None,
            receiver,
            idle_timeout,
            stats: WriterStats::default(),
        };
        Self {
            sender,
            task: tokio::spawn(writer.run()),
        }
    }

    /// Queue `data` for appending.
    ///
    /// # Errors
    ///
    /// Hands `data` back if the writer has stopped accepting chunks.
    pub async fn append(&self, data: Bytes) -> Result<(), Bytes> {
        self.sender.send(data).await.map_err(|e| e.0)
    }

    /// Whether the writer task has exited and its file is closed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Write everything queued, close the file and return the stats.
    pub async fn finish(self) -> WriterStats {
        drop(self.sender);
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(target: "rb.bridge", error = %e, "Chunk writer task failed");
                WriterStats {
                    failures: 1,
                    ..WriterStats::default()
                }
            }
        }
    }
}

struct ChunkWriter {
    path: PathBuf,
    file: Option<File>,
    receiver: mpsc::Receiver<Bytes>,
    idle_timeout: Duration,
    stats: WriterStats,
}

impl ChunkWriter {
    #[instrument(skip_all, name = "rb.bridge.writer", fields(path = %self.path.display()))]
    async fn run(mut self) -> WriterStats {
        loop {
            match tokio::time::timeout(self.idle_timeout, self.receiver.recv()).await {
                Ok(Some(data)) => self.append(&data).await,
                Ok(None) => break,
                Err(_) => {
                    debug!(target: "rb.bridge", path = %self.path.display(), "Writer idle");
                    self.receiver.close();
                    while let Ok(data) = self.receiver.try_recv() {
                        self.append(&data).await;
                    }
                    break;
                }
            }
        }

        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.sync_all().await {
                error!(
                    target: "rb.bridge",
                    path = %self.path.display(),
                    error = %e,
                    "Failed to sync recording"
                );
            }
        }

        debug!(
            target: "rb.bridge",
            path = %self.path.display(),
            chunks = self.stats.chunks_written,
            bytes = self.stats.bytes_written,
            "Recording file closed"
        );
        self.stats
    }

    async fn append(&mut self, data: &[u8]) {
        match self.write(data).await {
            Ok(()) => {
                self.stats.chunks_written += 1;
                self.stats.bytes_written += data.len() as u64;
                metrics::record_chunk_appended(data.len());
                debug!(
                    target: "rb.bridge",
                    path = %self.path.display(),
                    bytes = data.len(),
                    "Wrote chunk"
                );
            }
            Err(e) => {
                // Reopen on the next chunk
                self.file = None;
                self.stats.failures += 1;
                metrics::record_append_failure("io");
                error!(
                    target: "rb.bridge",
                    path = %self.path.display(),
                    error = %e,
                    "Failed to append chunk"
                );
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await?;
                self.file.insert(file)
            }
        };
        file.write_all(data).await?;
        file.flush().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const IDLE: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.webm");
        let writer = ChunkWriterHandle::spawn(path.clone(), IDLE);

        for chunk in [&b"first-"[..], b"second-", b"third"] {
            assert!(writer.append(Bytes::copy_from_slice(chunk)).await.is_ok());
        }
        let stats = writer.finish().await;

        assert_eq!(stats.chunks_written, 3);
        assert_eq!(stats.bytes_written, 18);
        assert_eq!(std::fs::read(&path).unwrap(), b"first-second-third");
    }

    #[tokio::test]
    async fn test_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.webm");
        std::fs::write(&path, b"old").unwrap();

        let writer = ChunkWriterHandle::spawn(path.clone(), IDLE);
        writer.append(Bytes::from_static(b"+new")).await.unwrap();
        writer.finish().await;

        assert_eq!(std::fs::read(&path).unwrap(), b"old+new");
    }

    #[tokio::test]
    async fn test_no_chunks_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.webm");

        let stats = ChunkWriterHandle::spawn(path.clone(), IDLE).finish().await;

        assert_eq!(stats, WriterStats::default());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_directory_counts_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("1.webm");

        let writer = ChunkWriterHandle::spawn(path, IDLE);
        writer.append(Bytes::from_static(b"lost")).await.unwrap();
        let stats = writer.finish().await;

        assert_eq!(stats.failures, 1);
        assert_eq!(stats.chunks_written, 0);
    }

    #[tokio::test]
    async fn test_idle_writer_exits_and_refuses_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.webm");
        let writer = ChunkWriterHandle::spawn(path.clone(), Duration::from_millis(20));

        writer.append(Bytes::from_static(b"kept")).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !writer.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("writer should exit when idle");

        let refused = writer.append(Bytes::from_static(b"late")).await;
        assert_eq!(refused, Err(Bytes::from_static(b"late")));

        let stats = writer.finish().await;
        assert_eq!(stats.chunks_written, 1);
        assert_eq!(std::fs::read(&path).unwrap(), b"kept");
    }

    #[test]
    fn test_stats_absorb() {
        let mut total = WriterStats {
            chunks_written: 1,
            bytes_written: 10,
            failures: 0,
        };
        total.absorb(WriterStats {
            chunks_written: 2,
            bytes_written: 5,
            failures: 1,
        });
        assert_eq!(
            total,
            WriterStats {
                chunks_written: 3,
                bytes_written: 15,
                failures: 1,
            }
        );
    }
}
