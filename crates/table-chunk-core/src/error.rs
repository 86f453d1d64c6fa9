//! Error types shared by chunk construction, resolution and partitioning.
//!
//! Integrity problems found by [`crate::Chunk::check_integrity`] are *not*
//! errors; they are reported as [`crate::integrity::IntegrityIssue`] values.
//! The variants here cover failures that stop an operation outright.

use snafu::prelude::*;

use crate::backend::BackendError;

/// Errors raised while building, resolving, slicing or partitioning chunks.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChunkError {
    /// The backing file could not be opened to fetch table metadata.
    #[snafu(display("Chunk source unavailable: {path} (table {table}): {source}"))]
    SourceUnavailable {
        /// Path of the backing file.
        path: String,
        /// Table that was requested inside the file.
        table: String,
        /// Backend error that caused the failure.
        source: BackendError,
    },

    /// The chunk's entry range is inverted (`entry_start > entry_stop`).
    #[snafu(display("Invalid entry range [{entry_start},{entry_stop}) for chunk {path}"))]
    InvalidRange {
        /// Path of the backing file.
        path: String,
        /// Start entry (inclusive).
        entry_start: u64,
        /// Stop entry (exclusive).
        entry_stop: u64,
    },

    /// A slice request does not fit in the chunk.
    #[snafu(display("Slice [{start},{stop}) out of bounds for chunk of length {len}: {path}"))]
    InvalidSlice {
        /// Path of the backing file.
        path: String,
        /// Requested local start.
        start: u64,
        /// Requested local stop.
        stop: u64,
        /// Length of the chunk being sliced.
        len: u64,
    },

    /// Partitioning was asked for a zero group size or given no chunks.
    #[snafu(display("Degenerate partition input: {detail}"))]
    DegenerateInput {
        /// What was wrong with the input.
        detail: String,
    },

    /// One input of a bulk construction failed to resolve.
    #[snafu(display("Failed to resolve input #{index} ({path}): {source}"))]
    BulkResolve {
        /// Position of the failing input in the caller's list.
        index: usize,
        /// Path of the failing input.
        path: String,
        /// The resolution error for that input.
        #[snafu(source(from(ChunkError, Box::new)))]
        source: Box<ChunkError>,
    },

    /// The worker pool used for bulk resolution could not be created.
    #[snafu(display("Failed to build metadata worker pool: {source}"))]
    WorkerPool {
        /// Error reported by rayon.
        source: rayon::ThreadPoolBuildError,
    },

    /// Reading the rows covered by a chunk failed.
    #[snafu(display("Failed to read rows of chunk {path}: {source}"))]
    Read {
        /// Path of the backing file.
        path: String,
        /// Backend error that caused the failure.
        source: BackendError,
    },
}

/// Convenience alias for results returned by chunk operations.
pub type ChunkResult<T> = Result<T, ChunkError>;
