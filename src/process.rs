//! Batch orchestration: sources in parallel, pages in strict order.
//!
//! Carry-forward and gap interpolation both depend on a fixed total order
//! over one source's pages, so each source is a single sequential fold.
//! Different sources share nothing but the read-only config and the OCR
//! backends, and fan out via `buffer_unordered`. Backend calls — the
//! dominant blocking operation — are additionally bounded by one shared
//! semaphore across all sources.
//!
//! ```text
//! pages ──▶ segment ──▶ extract ──▶ resolve ──▶ persist ──▶ interpolate ──▶ aggregate
//!  (per source, sequential)                       (chunks)   (relabels)    (all sources)
//! ```

use crate::aggregate::aggregate;
use crate::config::ExtractionConfig;
use crate::error::{PageFailure, ScanError};
use crate::interpolate::{interpolate_unknown_countries, Relabel};
use crate::ocr::OcrStack;
use crate::pipeline::extract::extract_page_text;
use crate::record::{AggregatedDocument, IndexRecord, PageImage, PageRecord, UNKNOWN};
use crate::resolve::{resolve_country, Cursor};
use crate::store::ChunkStore;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// One source document's pages, in ascending page order.
pub struct SourcePages {
    pub source: String,
    pub pages: Vec<PageImage>,
}

/// Everything one source produced, including the failure trail.
pub struct SourceReport {
    pub source: String,
    pub records: Vec<PageRecord>,
    pub failures: Vec<PageFailure>,
    pub relabels: Vec<Relabel>,
}

/// Final output of a batch run.
pub struct BatchOutput {
    /// Per-page records across all sources, post-interpolation.
    pub records: Vec<PageRecord>,
    /// One aggregated document per (country, year[, source]) key.
    pub documents: Vec<AggregatedDocument>,
    /// Per-source processing reports.
    pub reports: Vec<SourceReport>,
}

impl BatchOutput {
    /// The records handed to the external indexing collaborator: every
    /// page-level chunk followed by every aggregate.
    pub fn index_records(&self) -> Vec<IndexRecord> {
        self.records
            .iter()
            .map(PageRecord::index_record)
            .chain(self.documents.iter().map(AggregatedDocument::index_record))
            .collect()
    }
}

/// Process one source document: the sequential page fold plus the
/// post-source interpolation pass.
///
/// Pages whose extracted text is empty are dropped before resolution, so
/// they neither break carry-forward nor widen interpolation runs.
pub async fn process_source(
    pages: SourcePages,
    stack: &OcrStack,
    config: &ExtractionConfig,
    store: Option<&ChunkStore>,
    semaphore: &Semaphore,
) -> SourceReport {
    let source = pages.source;
    info!(source = %source, pages = pages.pages.len(), "processing source");

    let mut cursor = Cursor::for_source(config, &source);
    let mut records: Vec<PageRecord> = Vec::with_capacity(pages.pages.len());
    let mut failures: Vec<PageFailure> = Vec::new();

    for page in pages.pages {
        let year_hint = cursor.year.clone();
        let hint = (year_hint != UNKNOWN).then_some(year_hint.as_str());
        let text = extract_page_text(
            &page.image,
            hint,
            stack,
            config,
            semaphore,
            page.index,
            &mut failures,
        )
        .await;

        if text.trim().is_empty() {
            debug!(source = %source, page = page.index, "no text extracted, dropping page");
            failures.push(PageFailure::EmptyPage { page: page.index });
            continue;
        }

        let year = cursor.observe(&text);
        let country = resolve_country(config, &source, page.index, &text);
        let record = PageRecord::new(&source, page.index, country, year, &text);

        if let Some(store) = store {
            store.write_chunk(&record).await;
        }
        records.push(record);
    }

    let relabels = interpolate_unknown_countries(&mut records);
    if let Some(store) = store {
        store.apply_relabels(&records, &relabels).await;
    }

    info!(
        source = %source,
        chunks = records.len(),
        relabelled = relabels.len(),
        failures = failures.len(),
        "source complete"
    );
    SourceReport {
        source,
        records,
        failures,
        relabels,
    }
}

/// Process a batch of sources concurrently, then aggregate.
///
/// Chunk and aggregate files are written through `store` when present;
/// passing `None` keeps the whole run in memory (tests, dry runs).
pub async fn process_sources(
    sources: Vec<SourcePages>,
    stack: &OcrStack,
    config: &ExtractionConfig,
    store: Option<&ChunkStore>,
) -> BatchOutput {
    let semaphore = Arc::new(Semaphore::new(config.ocr_concurrency));

    let reports: Vec<SourceReport> = stream::iter(sources.into_iter().map(|pages| {
        let semaphore = Arc::clone(&semaphore);
        async move { process_source(pages, stack, config, store, &semaphore).await }
    }))
    .buffer_unordered(config.source_concurrency)
    .collect()
    .await;

    let mut records: Vec<PageRecord> = reports
        .iter()
        .flat_map(|r| r.records.iter().cloned())
        .collect();
    // Deterministic record order across the unordered source fan-out.
    records.sort_by(|a, b| (&a.source, a.page).cmp(&(&b.source, b.page)));

    let documents = aggregate(&records, config.group_by_source);
    if let Some(store) = store {
        for document in &documents {
            store.write_aggregate(document).await;
        }
    }

    info!(
        sources = reports.len(),
        chunks = records.len(),
        documents = documents.len(),
        "batch complete"
    );
    BatchOutput {
        records,
        documents,
        reports,
    }
}

/// Load every source directory under `root` and run the batch.
///
/// Layout contract with the rasterization collaborator: one sub-directory
/// per source document, holding that source's page images in filename
/// order. A source whose images cannot be read at all is skipped with a
/// warning; the batch continues.
pub async fn process_directory(
    root: &Path,
    stack: &OcrStack,
    config: &ExtractionConfig,
    store: Option<&ChunkStore>,
) -> Result<BatchOutput, ScanError> {
    let sources = load_sources(root).await?;
    if sources.is_empty() {
        return Err(ScanError::NoInput {
            path: root.to_path_buf(),
        });
    }
    Ok(process_sources(sources, stack, config, store).await)
}

/// Page-image file extensions accepted from the rasterization collaborator.
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "tif"];

/// Enumerate source sub-directories and decode their page images.
async fn load_sources(root: &Path) -> Result<Vec<SourcePages>, ScanError> {
    let mut dir = tokio::fs::read_dir(root).await.map_err(|_| ScanError::NoInput {
        path: root.to_path_buf(),
    })?;

    let mut sources = Vec::new();
    while let Ok(Some(entry)) = dir.next_entry().await {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let source = entry.file_name().to_string_lossy().to_string();
        match load_source_pages(&path, &source).await {
            Some(pages) if !pages.pages.is_empty() => sources.push(pages),
            Some(_) => debug!(source = %source, "source directory holds no page images"),
            // Unreadable source: the rasterization collaborator failed us,
            // skip this source and continue the batch.
            None => warn!(source = %source, "skipping unreadable source"),
        }
    }

    sources.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(sources)
}

/// Decode one source's page images, assigning contiguous zero-based
/// indices in filename order. Any undecodable page fails the whole source.
async fn load_source_pages(dir: &Path, source: &str) -> Option<SourcePages> {
    let mut files: Vec<std::path::PathBuf> = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            files.push(path);
        }
    }
    files.sort();

    let mut pages = Vec::with_capacity(files.len());
    for (index, path) in files.into_iter().enumerate() {
        // Decoding is CPU-bound; keep it off the async workers.
        let image = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .ok()?
            .ok()?;
        pages.push(PageImage {
            source: source.to_string(),
            index,
            image,
        });
    }

    Some(SourcePages {
        source: source.to_string(),
        pages,
    })
}
