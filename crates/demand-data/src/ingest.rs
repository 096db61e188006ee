//! Source file → trip store.

use demand_core::settings::IngestConfig;
use demand_core::{DemandError, Result};
use tracing::{error, info, warn};

use crate::reader::{TripChunk, TripChunks};
use crate::store::TripStore;

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub chunks_written: usize,
    pub chunks_skipped: usize,
    pub rows_written: u64,
}

/// Stream `cfg.source` into `cfg.table` of the store at `cfg.db`.
///
/// The source is checked before the store is touched, so a missing file
/// fails with [`DemandError::SourceNotFound`] and leaves no database behind.
pub fn ingest_csv(cfg: &IngestConfig) -> Result<IngestSummary> {
    if !cfg.source.is_file() {
        return Err(DemandError::SourceNotFound(cfg.source.clone()));
    }
    let chunks = TripChunks::open(&cfg.source, cfg.chunk_size)?;
    let mut store = TripStore::open(&cfg.db, &cfg.table)?;
    info!(
        source = %cfg.source.display(),
        db = %cfg.db.display(),
        table = %cfg.table,
        chunk_size = cfg.chunk_size,
        "starting ingestion"
    );
    load_chunks(&mut store, chunks)
}

/// Write every valid chunk into `store` inside one transaction.
///
/// Recoverable chunk errors are logged and skipped; any other error aborts
/// the run and rolls back everything written so far. When no chunk is valid
/// the existing table is left untouched.
pub fn load_chunks<I>(store: &mut TripStore, chunks: I) -> Result<IngestSummary>
where
    I: IntoIterator<Item = Result<TripChunk>>,
{
    let mut summary = IngestSummary::default();
    let mut load = store.begin_load()?;

    for chunk in chunks {
        match chunk {
            Ok(chunk) => {
                let rows = load.write_chunk(&chunk.records)?;
                summary.chunks_written += 1;
                info!(chunk = chunk.index, rows, "Ingested chunk {}", chunk.index);
            }
            Err(e) if e.is_recoverable() => {
                summary.chunks_skipped += 1;
                error!("{e}. Skipping this chunk.");
            }
            Err(e) => return Err(e),
        }
    }

    if !load.has_replaced() {
        warn!(
            skipped = summary.chunks_skipped,
            "no valid chunk found; table left unchanged"
        );
        return Ok(summary);
    }

    summary.rows_written = load.commit()?;
    info!(
        chunks = summary.chunks_written,
        skipped = summary.chunks_skipped,
        rows = summary.rows_written,
        "ingestion complete"
    );
    Ok(summary)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
