//! Bulk construction: many paths in, resolved chunks out.
//!
//! Metadata fetches are I/O bound, so they are spread over a dedicated rayon
//! pool of `min(N, cap)` threads. Each chunk is resolved by exactly one task
//! and results keep input order. A failure aborts the batch and reports the
//! lowest failing input.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use rayon::prelude::*;
use snafu::prelude::*;

use crate::chunk::Chunk;
use crate::context::ChunkContext;
use crate::error::{BulkResolveSnafu, ChunkResult, WorkerPoolSnafu};

/// Threads to use for `inputs` items under `cap`.
pub(crate) fn resolve_worker_count(inputs: usize, cap: usize) -> usize {
    inputs.min(cap).max(1)
}

impl ChunkContext {
    /// Build one chunk per path (default table) and resolve them in parallel.
    pub fn from_paths<I, P>(&self, paths: I) -> ChunkResult<Vec<Chunk>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let chunks: Vec<Chunk> = paths
            .into_iter()
            .map(|path| self.chunk(path).build())
            .collect();
        self.resolve_all(chunks)
    }

    /// Resolve already-built chunks in parallel, keeping their order.
    pub fn resolve_all(&self, chunks: Vec<Chunk>) -> ChunkResult<Vec<Chunk>> {
        if chunks.is_empty() {
            return Ok(chunks);
        }

        let threads = resolve_worker_count(chunks.len(), self.config().worker_cap());
        debug!(
            "resolving {} chunks on {threads} metadata workers",
            chunks.len()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context(WorkerPoolSnafu)?;

        // Tasks past a known failure are skipped; the lowest failing index
        // always runs, so the reported failure does not depend on scheduling.
        let first_failure = AtomicUsize::new(usize::MAX);
        let results: Vec<ChunkResult<()>> = pool.install(|| {
            chunks
                .par_iter()
                .enumerate()
                .map(|(index, chunk)| {
                    if index > first_failure.load(Ordering::Relaxed) {
                        return Ok(());
                    }
                    let result = chunk.resolve().context(BulkResolveSnafu {
                        index,
                        path: chunk.path().display().to_string(),
                    });
                    if result.is_err() {
                        first_failure.fetch_min(index, Ordering::Relaxed);
                    }
                    result
                })
                .collect()
        });
        results.into_iter().collect::<ChunkResult<()>>()?;

        Ok(chunks)
    }
}
