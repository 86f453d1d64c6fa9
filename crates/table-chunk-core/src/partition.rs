//! Order-preserving partitioning of chunks into equal-sized groups.
//!
//! Given chunks in a fixed scan order (possibly across many files of uneven
//! size) and a target size `S`, [`partition`] walks the rows once and cuts
//! them into groups of exactly `S` rows, slicing chunks at group boundaries.
//! Only the last group may be shorter.
//!
//! The walk is greedy and streaming: no look-ahead, no reordering, so the
//! concatenation of all groups reproduces the input rows exactly. It does not
//! try to minimise the number of split chunks.
//!
//! Lengths are read once when the partition is created (which may resolve
//! chunks); iterating the groups afterwards is pure and does no I/O.

use std::iter::FusedIterator;

use log::debug;
use snafu::prelude::*;

use crate::chunk::{Chunk, ChunkOverrides, ColumnSet};
use crate::error::{ChunkResult, DegenerateInputSnafu};

/// How to partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionOptions {
    /// Rows per group.
    pub size: u64,
    /// Restrict every slice to the columns shared by all chunks.
    pub common_columns: bool,
}

impl PartitionOptions {
    /// Groups of `size` rows, keeping each chunk's own columns.
    pub fn new(size: u64) -> Self {
        Self {
            size,
            common_columns: false,
        }
    }

    /// Toggle the common-columns restriction.
    pub fn with_common_columns(mut self, common_columns: bool) -> Self {
        self.common_columns = common_columns;
        self
    }
}

/// One unit of work: consecutive chunk slices and their total row count.
#[derive(Clone, Debug)]
pub struct ChunkGroup {
    slices: Vec<Chunk>,
    num_rows: u64,
}

impl ChunkGroup {
    /// Slices in scan order.
    pub fn slices(&self) -> &[Chunk] {
        &self.slices
    }

    /// Take ownership of the slices.
    pub fn into_slices(self) -> Vec<Chunk> {
        self.slices
    }

    /// Total rows across all slices.
    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    /// Iterate over the slices.
    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.slices.iter()
    }
}

impl<'a> IntoIterator for &'a ChunkGroup {
    type Item = &'a Chunk;
    type IntoIter = std::slice::Iter<'a, Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.slices.iter()
    }
}

/// Lazy sequence of [`ChunkGroup`]s produced by [`partition`].
///
/// Finite and single-pass; call [`partition`] again to regenerate.
#[derive(Debug)]
pub struct ChunkGroups {
    chunks: Vec<(Chunk, u64)>,
    size: u64,
    index: usize,
    offset: u64,
    rows_left: u64,
}

/// Columns present in every chunk. Resolves column sets as needed.
pub fn common_columns(chunks: &[Chunk]) -> ChunkResult<ColumnSet> {
    let mut iter = chunks.iter();
    let mut common = match iter.next() {
        Some(first) => first.column_set()?.clone(),
        None => return Ok(ColumnSet::new()),
    };
    for chunk in iter {
        let columns = chunk.column_set()?;
        common.retain(|name| columns.contains(name));
    }
    Ok(common)
}

/// Split `chunks` into groups of `options.size` rows, preserving order.
///
/// Fails with `DegenerateInput` for a zero size or an empty chunk list.
pub fn partition(chunks: &[Chunk], options: PartitionOptions) -> ChunkResult<ChunkGroups> {
    ensure!(
        options.size > 0,
        DegenerateInputSnafu {
            detail: "group size must be positive".to_string(),
        }
    );
    ensure!(
        !chunks.is_empty(),
        DegenerateInputSnafu {
            detail: "no chunks to partition".to_string(),
        }
    );

    let restricted;
    let chunks = if options.common_columns {
        let common = common_columns(chunks)?;
        debug!(
            "restricting {} chunks to {} common columns",
            chunks.len(),
            common.len()
        );
        restricted = chunks
            .iter()
            .map(|chunk| {
                chunk.with_overrides(ChunkOverrides::default().with_column_set(common.clone()))
            })
            .collect::<Vec<_>>();
        restricted.as_slice()
    } else {
        chunks
    };

    let mut sized = Vec::with_capacity(chunks.len());
    let mut rows_left = 0u64;
    for chunk in chunks {
        let len = chunk.len()?;
        rows_left = rows_left.checked_add(len).context(DegenerateInputSnafu {
            detail: format!("total rows overflow at {}", chunk.path().display()),
        })?;
        sized.push((chunk.clone(), len));
    }

    debug!(
        "partitioning {rows_left} rows from {} chunks into groups of {}",
        sized.len(),
        options.size
    );

    Ok(ChunkGroups {
        chunks: sized,
        size: options.size,
        index: 0,
        offset: 0,
        rows_left,
    })
}

impl Iterator for ChunkGroups {
    type Item = ChunkGroup;

    fn next(&mut self) -> Option<ChunkGroup> {
        let mut slices = Vec::new();
        let mut filled = 0u64;

        while self.index < self.chunks.len() && filled < self.size {
            let len = self.chunks[self.index].1;
            let available = len - self.offset;
            if available == 0 {
                self.index += 1;
                self.offset = 0;
                continue;
            }

            let take = (self.size - filled).min(available);
            slices.push(self.chunks[self.index].0.slice_unchecked(self.offset, self.offset + take));
            filled += take;
            self.offset += take;
            self.rows_left -= take;

            if self.offset == len {
                self.index += 1;
                self.offset = 0;
            }
        }

        if slices.is_empty() {
            None
        } else {
            Some(ChunkGroup {
                slices,
                num_rows: filled,
            })
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let groups = usize::try_from(self.rows_left.div_ceil(self.size)).unwrap_or(usize::MAX);
        (groups, Some(groups))
    }
}

impl ExactSizeIterator for ChunkGroups {}

impl FusedIterator for ChunkGroups {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::chunk::ChunkBuilder;
    use crate::error::ChunkError;
    use crate::test_util::{MemoryBackend, TestResult};

    fn chunks_with_rows(backend: &Arc<MemoryBackend>, rows: &[u64]) -> Vec<Chunk> {
        rows.iter()
            .enumerate()
            .map(|(i, &n)| {
                let path = format!("f{i}.parquet");
                backend.put(&path, "Events", &["pt", "eta"], n);
                ChunkBuilder::new(path, "Events", backend.as_dyn()).build()
            })
            .collect()
    }

    fn spans(group: &ChunkGroup) -> ChunkResult<Vec<(String, u64, u64)>> {
        group
            .iter()
            .map(|c| {
                Ok((
                    c.path().display().to_string(),
                    c.entry_start(),
                    c.entry_stop()?,
                ))
            })
            .collect()
    }

    #[test]
    fn uneven_files_balance_into_equal_groups() -> TestResult {
        let backend = Arc::new(MemoryBackend::new());
        let chunks = chunks_with_rows(&backend, &[250, 100, 400]);

        let groups: Vec<ChunkGroup> = partition(&chunks, PartitionOptions::new(300))?.collect();

        let sizes: Vec<u64> = groups.iter().map(ChunkGroup::num_rows).collect();
        assert_eq!(sizes, vec![300, 300, 150]);

        let f = |i: usize, a: u64, b: u64| (format!("f{i}.parquet"), a, b);
        assert_eq!(spans(&groups[0])?, vec![f(0, 0, 250), f(1, 0, 50)]);
        assert_eq!(spans(&groups[1])?, vec![f(1, 50, 100), f(2, 0, 250)]);
        assert_eq!(spans(&groups[2])?, vec![f(2, 250, 400)]);
        Ok(())
    }

    #[test]
    fn empty_table_yields_no_groups() -> TestResult {
        let backend = Arc::new(MemoryBackend::new());
        let chunks = chunks_with_rows(&backend, &[0]);

        let groups = partition(&chunks, PartitionOptions::new(10))?;
        assert_eq!(groups.len(), 0);
        assert_eq!(groups.count(), 0);
        Ok(())
    }

    #[test]
    fn zero_length_chunks_never_produce_slices() -> TestResult {
        let backend = Arc::new(MemoryBackend::new());
        let chunks = chunks_with_rows(&backend, &[0, 5, 0, 0, 5, 0]);

        let groups: Vec<ChunkGroup> = partition(&chunks, PartitionOptions::new(4))?.collect();
        for group in &groups {
            for slice in group {
                assert!(slice.len()? > 0);
            }
        }
        let sizes: Vec<u64> = groups.iter().map(ChunkGroup::num_rows).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        Ok(())
    }

    #[test]
    fn groups_cover_rows_in_order_without_gaps() -> TestResult {
        let backend = Arc::new(MemoryBackend::new());
        let rows = [7, 1, 0, 13, 22, 3, 9];
        let total: u64 = rows.iter().sum();

        for size in 1..=total + 3 {
            let chunks = chunks_with_rows(&backend, &rows);
            let groups = partition(&chunks, PartitionOptions::new(size))?;
            assert_eq!(groups.len() as u64, total.div_ceil(size));

            let groups: Vec<ChunkGroup> = groups.collect();
            let last = groups.len() - 1;

            let mut cursor = (0usize, 0u64);
            for (g, group) in groups.iter().enumerate() {
                if g < last {
                    assert_eq!(group.num_rows(), size);
                }
                assert!(group.num_rows() <= size);

                let mut sum = 0;
                for slice in group {
                    // Skip exhausted or empty inputs to find where this slice must start.
                    while cursor.1 == rows[cursor.0] {
                        cursor = (cursor.0 + 1, 0);
                    }
                    assert_eq!(slice.path().display().to_string(), format!("f{}.parquet", cursor.0));
                    assert_eq!(slice.entry_start(), cursor.1);
                    cursor.1 = slice.entry_stop()?;
                    sum += slice.len()?;
                }
                assert_eq!(sum, group.num_rows());
            }
            assert_eq!(cursor, (rows.len() - 1, rows[rows.len() - 1]));
        }
        Ok(())
    }

    #[test]
    fn respects_existing_entry_ranges() -> TestResult {
        let backend = Arc::new(MemoryBackend::new().with_table("a.parquet", "Events", &["pt"], 1000));
        let chunks = vec![
            ChunkBuilder::new("a.parquet", "Events", backend.as_dyn())
                .entry_range(100, 160)
                .build(),
            ChunkBuilder::new("a.parquet", "Events", backend.as_dyn())
                .entry_range(500, 520)
                .build(),
        ];

        let groups: Vec<ChunkGroup> = partition(&chunks, PartitionOptions::new(50))?.collect();
        let f = |a: u64, b: u64| ("a.parquet".to_string(), a, b);
        assert_eq!(spans(&groups[0])?, vec![f(100, 150)]);
        assert_eq!(spans(&groups[1])?, vec![f(150, 160), f(500, 520)]);
        assert_eq!(groups.len(), 2);
        // Declared ranges mean lengths needed no I/O.
        assert_eq!(backend.opens(), 0);
        Ok(())
    }

    #[test]
    fn common_columns_restricts_every_slice() -> TestResult {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_table("a.parquet", "Events", &["pt", "eta", "phi"], 10)
                .with_table("b.parquet", "Events", &["pt", "eta", "mass"], 10)
                .with_table("c.parquet", "Events", &["eta", "pt"], 10),
        );
        let chunks: Vec<Chunk> = ["a.parquet", "b.parquet", "c.parquet"]
            .into_iter()
            .map(|p| ChunkBuilder::new(p, "Events", backend.as_dyn()).build())
            .collect();

        let expected: ColumnSet = ["eta", "pt"].iter().map(|s| s.to_string()).collect();
        assert_eq!(common_columns(&chunks)?, expected);

        let groups = partition(&chunks, PartitionOptions::new(7).with_common_columns(true))?;
        for group in groups {
            for slice in &group {
                assert!(slice.column_set()?.is_subset(&expected));
            }
        }
        Ok(())
    }

    #[test]
    fn without_flag_columns_are_untouched() -> TestResult {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_table("a.parquet", "Events", &["pt", "phi"], 4)
                .with_table("b.parquet", "Events", &["pt"], 4),
        );
        let chunks: Vec<Chunk> = ["a.parquet", "b.parquet"]
            .into_iter()
            .map(|p| ChunkBuilder::new(p, "Events", backend.as_dyn()).build_resolved())
            .collect::<ChunkResult<_>>()?;

        let groups: Vec<ChunkGroup> = partition(&chunks, PartitionOptions::new(8))?.collect();
        let first = &groups[0].slices()[0];
        assert_eq!(first.column_set()?.len(), 2);
        Ok(())
    }

    #[test]
    fn degenerate_input_fails_fast() {
        let backend = Arc::new(MemoryBackend::new());
        let chunks = chunks_with_rows(&backend, &[5]);

        assert!(matches!(
            partition(&chunks, PartitionOptions::new(0)).unwrap_err(),
            ChunkError::DegenerateInput { .. }
        ));
        assert!(matches!(
            partition(&[], PartitionOptions::new(5)).unwrap_err(),
            ChunkError::DegenerateInput { .. }
        ));
    }

    #[test]
    fn overflowing_row_total_is_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let huge: Vec<Chunk> = ["a.parquet", "b.parquet"]
            .into_iter()
            .map(|path| {
                ChunkBuilder::new(path, "Events", backend.as_dyn())
                    .entry_range(0, u64::MAX)
                    .build()
            })
            .collect();

        match partition(&huge, PartitionOptions::new(10)).unwrap_err() {
            ChunkError::DegenerateInput { detail } => assert!(detail.contains("b.parquet")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.opens(), 0);
    }

    #[test]
    fn iteration_is_pure_after_construction() -> TestResult {
        let backend = Arc::new(MemoryBackend::new());
        let chunks = chunks_with_rows(&backend, &[30, 30]);

        let groups = partition(&chunks, PartitionOptions::new(25))?;
        let opens = backend.opens();
        let collected: Vec<ChunkGroup> = groups.collect();
        assert_eq!(collected.len(), 3);
        assert_eq!(backend.opens(), opens);
        Ok(())
    }

    #[test]
    fn exhausted_sequence_stays_exhausted() -> TestResult {
        let backend = Arc::new(MemoryBackend::new());
        let chunks = chunks_with_rows(&backend, &[3]);

        let mut groups = partition(&chunks, PartitionOptions::new(2))?;
        assert_eq!(groups.len(), 2);
        assert!(groups.next().is_some());
        assert_eq!(groups.len(), 1);
        assert!(groups.next().is_some());
        assert!(groups.next().is_none());
        assert!(groups.next().is_none());
        Ok(())
    }
}
