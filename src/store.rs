//! Persistence collaborator: chunk and aggregate files on disk.
//!
//! Strictly best-effort, matching the error design: a failed write or
//! delete is logged with `warn!` and skipped, never propagated. The pure
//! stages produce values; this module is the only place those values touch
//! the filesystem, which keeps segmentation, resolution, and interpolation
//! testable without one.
//!
//! Filenames are a deterministic sanitisation of the record's labels
//! (`<country>_<year>_page<index>.txt`). When the interpolator corrects a
//! label, [`ChunkStore::apply_relabels`] deletes the stale file and writes
//! the new one — the relabel list itself is the audit trail.

use crate::config::ExtractionConfig;
use crate::interpolate::Relabel;
use crate::record::{AggregatedDocument, PageRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Owns the output directories for page chunks and aggregated documents.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    output_dir: PathBuf,
    aggregate_dir: PathBuf,
}

impl ChunkStore {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            aggregate_dir: config.aggregate_dir.clone(),
        }
    }

    /// Create both output directories. Failure is fatal-adjacent enough to
    /// surface: without the directories every later write would warn.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::create_dir_all(&self.aggregate_dir).await?;
        Ok(())
    }

    /// Remove and recreate both output directories.
    pub async fn reset(&self) -> std::io::Result<()> {
        for dir in [&self.output_dir, &self.aggregate_dir] {
            if dir.exists() {
                tokio::fs::remove_dir_all(dir).await?;
            }
        }
        self.ensure_dirs().await
    }

    /// Path a record's chunk currently lives at.
    pub fn chunk_path(&self, record: &PageRecord) -> PathBuf {
        self.output_dir.join(record.chunk_file_name())
    }

    /// Write one page chunk; best-effort.
    pub async fn write_chunk(&self, record: &PageRecord) {
        let path = self.chunk_path(record);
        write_best_effort(&path, &record.text).await;
    }

    /// Apply the interpolator's corrections: delete each stale chunk file
    /// whose name changed, then write the corrected one.
    pub async fn apply_relabels(&self, records: &[PageRecord], relabels: &[Relabel]) {
        for relabel in relabels {
            if relabel.old_file != relabel.new_file {
                let stale = self.output_dir.join(&relabel.old_file);
                if let Err(e) = tokio::fs::remove_file(&stale).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %stale.display(), error = %e, "failed to remove stale chunk");
                    }
                }
            }
            if let Some(record) = records.get(relabel.index) {
                self.write_chunk(record).await;
            }
        }
    }

    /// Write one aggregated document; best-effort.
    pub async fn write_aggregate(&self, document: &AggregatedDocument) {
        let path = self.aggregate_dir.join(document.key.aggregate_file_name());
        write_best_effort(&path, &document.text).await;
    }
}

async fn write_best_effort(path: &Path, content: &str) {
    match tokio::fs::write(path, content).await {
        Ok(()) => debug!(path = %path.display(), bytes = content.len(), "wrote artifact"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to write artifact, skipping"),
    }
}
