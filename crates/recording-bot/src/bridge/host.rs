//! Host side of the bridge.
//!
//! `BridgeHost` is an actor that executes [`BridgeCall`]s in arrival order
//! against the recordings root. Log calls are re-emitted as `tracing`
//! events under the `rb.hosted` target.
//!
//! Writers that went idle are retired before each append, so a file whose
//! recording ended does not hold a descriptor or a task until shutdown.

use super::messages::{BridgeCall, HostControl};
use super::writer::{ChunkWriterHandle, WriterStats};
use super::{resolve, validate_segments, BridgeConfig, BridgeError, BridgeSummary};
use crate::observability::metrics;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

pub struct BridgeHost {
    root: PathBuf,
    config: BridgeConfig,
    calls: mpsc::Receiver<BridgeCall>,
    control: mpsc::Receiver<HostControl>,
    writers: HashMap<PathBuf, ChunkWriterHandle>,
    /// Every file written to, including those whose writer was retired.
    files: HashSet<PathBuf>,
    retired: WriterStats,
    failures: u64,
}

impl BridgeHost {
    pub(crate) fn new(
        root: PathBuf,
        config: BridgeConfig,
        calls: mpsc::Receiver<BridgeCall>,
        control: mpsc::Receiver<HostControl>,
    ) -> Self {
        Self {
            root,
            config,
            calls,
            control,
            writers: HashMap::new(),
            files: HashSet::new(),
            retired: WriterStats::default(),
            failures: 0,
        }
    }

    #[instrument(skip_all, name = "rb.bridge.host", fields(root = %self.root.display()))]
    pub(crate) async fn run(mut self) {
        info!(target: "rb.bridge", root = %self.root.display(), "Bridge host started");

        let mut calls_open = true;
        loop {
            tokio::select! {
                biased;

                control = self.control.recv() => {
                    match control {
                        Some(HostControl::OpenWriters { respond_to }) => {
                            self.retire_idle_writers().await;
                            let _ = respond_to.send(self.writers.len());
                            continue;
                        }
                        Some(HostControl::Close { respond_to }) => {
                            let summary = self.close().await;
                            let _ = respond_to.send(summary);
                        }
                        None => {
                            self.close().await;
                        }
                    }
                    break;
                }

                call = self.calls.recv(), if calls_open => {
                    match call {
                        Some(call) => self.execute(call).await,
                        None => {
                            debug!(target: "rb.bridge", "All bridge clients gone");
                            calls_open = false;
                        }
                    }
                }
            }
        }

        info!(target: "rb.bridge", "Bridge host stopped");
    }

    async fn execute(&mut self, call: BridgeCall) {
        match call {
            BridgeCall::Debug { text } => debug!(target: "rb.hosted", "{text}"),
            BridgeCall::Info { text } => info!(target: "rb.hosted", "{text}"),
            BridgeCall::Error { text } => error!(target: "rb.hosted", "{text}"),
            BridgeCall::EnsureDirectory { path, respond_to } => {
                let result = self.ensure_directory(&path).await;
                if let Err(e) = &result {
                    warn!(
                        target: "rb.bridge",
                        path = %path.join("/"),
                        error = %e,
                        "ensureDirectory failed"
                    );
                }
                let _ = respond_to.send(result);
            }
            BridgeCall::AppendChunk { path, chunk } => self.append_chunk(&path, &chunk).await,
        }
    }

    async fn ensure_directory(&self, segments: &[String]) -> Result<(), BridgeError> {
        validate_segments(segments)?;
        let parents = segments.split_last().map_or(&[][..], |(_, dirs)| dirs);
        let dir = resolve(&self.root, parents);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| BridgeError::Io(format!("{}: {e}", dir.display())))?;
        debug!(target: "rb.bridge", dir = %dir.display(), "Ensured directory");
        Ok(())
    }

    async fn append_chunk(&mut self, segments: &[String], chunk: &str) {
        if let Err(e) = validate_segments(segments) {
            self.fail("invalid_path", segments, &e);
            return;
        }

        let data = match media_chunk::decode(chunk) {
            Ok(data) => data,
            Err(e) => {
                self.fail("decode", segments, &BridgeError::Decode(e));
                return;
            }
        };

        self.retire_idle_writers().await;

        let path = resolve(&self.root, segments);
        let data = match self.writers.get(&path) {
            Some(writer) => match writer.append(data).await {
                Ok(()) => return,
                Err(data) => data,
            },
            None => data,
        };

        // The old writer went idle after the check above. Its queued chunks
        // must land before a new writer appends to the same file.
        self.retire(&path).await;
        if self.spawn_writer(path, data).await.is_err() {
            self.fail("writer_gone", segments, &BridgeError::Closed);
        }
    }

    async fn spawn_writer(&mut self, path: PathBuf, data: Bytes) -> Result<(), Bytes> {
        let writer = ChunkWriterHandle::spawn(path.clone(), self.config.writer_idle_timeout);
        let result = writer.append(data).await;
        self.files.insert(path.clone());
        self.writers.insert(path, writer);
        result
    }

    async fn retire(&mut self, path: &Path) {
        if let Some(writer) = self.writers.remove(path) {
            let stats = writer.finish().await;
            self.retired.absorb(stats);
        }
    }

    async fn retire_idle_writers(&mut self) {
        let idle: Vec<PathBuf> = self
            .writers
            .iter()
            .filter(|(_, writer)| writer.is_finished())
            .map(|(path, _)| path.clone())
            .collect();
        for path in idle {
            debug!(target: "rb.bridge", path = %path.display(), "Retiring idle writer");
            self.retire(&path).await;
        }
    }

    fn fail(&mut self, reason: &'static str, segments: &[String], e: &BridgeError) {
        self.failures += 1;
        metrics::record_append_failure(reason);
        error!(
            target: "rb.bridge",
            path = %segments.join("/"),
            reason,
            error = %e,
            "Dropping chunk"
        );
    }

    /// Execute pending calls, finish every writer and refuse later calls.
    async fn close(&mut self) -> BridgeSummary {
        debug!(target: "rb.bridge", "Closing bridge host...");

        while let Ok(call) = self.calls.try_recv() {
            self.execute(call).await;
        }
        self.calls.close();
        while let Ok(call) = self.calls.try_recv() {
            metrics::record_chunk_dropped();
            warn!(
                target: "rb.bridge",
                method = call.method_name(),
                "Bridge call after shutdown, dropping"
            );
        }

        let mut stats = self.retired;
        for (_, writer) in self.writers.drain() {
            stats.absorb(writer.finish().await);
        }
        let summary = BridgeSummary {
            files: self.files.len(),
            chunks_written: stats.chunks_written,
            bytes_written: stats.bytes_written,
            failures: self.failures + stats.failures,
        };

        info!(
            target: "rb.bridge",
            files = summary.files,
            chunks = summary.chunks_written,
            bytes = summary.bytes_written,
            failures = summary.failures,
            "Closed bridge host"
        );
        summary
    }
}
