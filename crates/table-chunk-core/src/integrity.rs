//! Reconcile a possibly stale chunk with the live file.
//!
//! A chunk written by an earlier job stage may carry metadata that no longer
//! matches its file: the file was replaced, lost columns, or shrank.
//! [`Chunk::check_integrity`] re-reads the file and reports every mismatch
//! instead of stopping at the first, together with a corrected chunk. Issues
//! are also logged (`error!`, or `warn!` for range problems).

use std::fmt;

use log::{error, warn};
use serde::Serialize;

use crate::chunk::{Chunk, ChunkBuilder, ChunkOverrides, ColumnSet, UniqueId};
use crate::error::ChunkResult;

/// One discrepancy between a chunk and its live file.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// The backing file does not exist.
    MissingFile {
        /// Path that was checked.
        path: String,
    },
    /// The file was replaced since the chunk was described.
    IdentityMismatch {
        /// Identity carried by the chunk.
        stored: UniqueId,
        /// Identity of the live file.
        live: UniqueId,
    },
    /// The table's row count changed.
    RangeMismatch {
        /// Row count carried by the chunk.
        stored: u64,
        /// Row count of the live table.
        live: u64,
    },
    /// Columns the chunk expects are gone from the file.
    ColumnsMissing {
        /// Expected columns absent from the live table.
        missing: ColumnSet,
    },
    /// The declared entry range does not fit the live table.
    OutOfRange {
        /// Declared start entry, if any.
        entry_start: Option<u64>,
        /// Declared stop entry, if any.
        entry_stop: Option<u64>,
        /// Row count of the live table.
        live_row_count: u64,
        /// Start entry of the corrected chunk.
        corrected_start: u64,
        /// Stop entry of the corrected chunk.
        corrected_stop: u64,
    },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::MissingFile { path } => write!(f, "file {path} not exists"),
            IntegrityIssue::IdentityMismatch { stored, live } => {
                write!(f, "unique id {stored}(stored) != {live}(file)")
            }
            IntegrityIssue::RangeMismatch { stored, live } => {
                write!(f, "number of entries {stored}(stored) != {live}(file)")
            }
            IntegrityIssue::ColumnsMissing { missing } => {
                let names: Vec<&str> = missing.iter().map(String::as_str).collect();
                write!(f, "columns [{}] not in file", names.join(", "))
            }
            IntegrityIssue::OutOfRange {
                live_row_count,
                corrected_start,
                corrected_stop,
                ..
            } => write!(
                f,
                "invalid entry range [0,{live_row_count}) -> [{corrected_start},{corrected_stop})"
            ),
        }
    }
}

/// Outcome of an integrity check.
#[derive(Clone, Debug)]
pub struct IntegrityReport {
    /// Corrected copy of the chunk; `None` when the file is missing.
    pub corrected: Option<Chunk>,
    /// Every problem found, in check order.
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    /// Whether no problem was found.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Clamp a declared range into `[0, live_rows]`, keeping `start <= stop`.
///
/// Returns the corrected range and whether the declared one was out of range.
fn clamp_range(start: Option<u64>, stop: Option<u64>, live_rows: u64) -> (u64, u64, bool) {
    let effective_start = start.unwrap_or(0);
    let mut out_of_range = false;

    if let Some(start) = start {
        out_of_range |= start >= live_rows;
    }
    if let Some(stop) = stop {
        out_of_range |= stop <= effective_start || stop > live_rows;
    }

    let corrected_stop = stop.unwrap_or(live_rows).min(live_rows);
    let corrected_start = effective_start.min(corrected_stop);
    (corrected_start, corrected_stop, out_of_range)
}

impl Chunk {
    /// Compare this chunk with its live file.
    ///
    /// Returns a report with every discrepancy and a corrected chunk carrying
    /// live metadata and a clamped range. `self` is left untouched. A missing
    /// file is reported, not raised; failing to open an existing file is an
    /// error.
    pub fn check_integrity(&self) -> ChunkResult<IntegrityReport> {
        if !self.backend().exists(self.path()) {
            let issue = IntegrityIssue::MissingFile {
                path: self.path().display().to_string(),
            };
            error!("chunk {self}: {issue}");
            return Ok(IntegrityReport {
                corrected: None,
                issues: vec![issue],
            });
        }

        let live = ChunkBuilder::new(self.path(), self.table_name(), self.backend().clone())
            .build_resolved()?;
        let live_id = live.unique_id()?;
        let live_rows = live.row_count()?;
        let live_columns = live.column_set()?;

        let mut issues = Vec::new();

        if let Some(stored) = self.known_unique_id() {
            if stored != live_id {
                issues.push(IntegrityIssue::IdentityMismatch {
                    stored: stored.clone(),
                    live: live_id.clone(),
                });
            }
        }

        if let Some(stored) = self.known_row_count() {
            if stored != live_rows {
                issues.push(IntegrityIssue::RangeMismatch {
                    stored,
                    live: live_rows,
                });
            }
        }

        let mut kept_columns = None;
        if let Some(stored) = self.known_column_set() {
            let missing: ColumnSet = stored.difference(live_columns).cloned().collect();
            if !missing.is_empty() {
                issues.push(IntegrityIssue::ColumnsMissing { missing });
            }
            kept_columns = Some(stored.intersection(live_columns).cloned().collect());
        }

        let start = self.declared_entry_start();
        let stop = self.declared_entry_stop();
        let (corrected_start, corrected_stop, out_of_range) = clamp_range(start, stop, live_rows);
        if out_of_range {
            issues.push(IntegrityIssue::OutOfRange {
                entry_start: start,
                entry_stop: stop,
                live_row_count: live_rows,
                corrected_start,
                corrected_stop,
            });
        }

        for issue in &issues {
            match issue {
                IntegrityIssue::OutOfRange { .. } => warn!("chunk {self}: {issue}"),
                _ => error!("chunk {self}: {issue}"),
            }
        }

        let mut overrides = ChunkOverrides::default().with_range(corrected_start, corrected_stop);
        overrides.column_set = kept_columns;
        let corrected = live.with_overrides(overrides);

        Ok(IntegrityReport {
            corrected: Some(corrected),
            issues,
        })
    }
}
