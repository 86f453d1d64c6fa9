//! Row-range descriptors over file-backed columnar tables.
//!
//! This crate models a *chunk*: a contiguous row range of a named table
//! inside a file. It provides:
//!
//! - [`Chunk`], built from partial information and completed lazily with a
//!   single metadata fetch through a pluggable [`backend::TableBackend`]
//!   (`chunk` module).
//! - An integrity checker that reconciles a possibly stale chunk with the
//!   live file and reports every discrepancy (`integrity` module).
//! - Bulk construction that resolves many files on a bounded worker pool
//!   (`bulk` module, via [`ChunkContext::from_paths`]).
//! - An order-preserving partitioner that regroups chunks from many files
//!   into equal-sized units of work (`partition` module).
//! - Serializable records for handing chunks between job stages (`record`
//!   module).
//!
//! A Parquet backend ([`backend::parquet_file::ParquetBackend`]) ships with
//! the crate; other formats plug in by implementing the backend traits.
#![deny(missing_docs)]

pub mod backend;
mod bulk;
pub mod chunk;
pub mod config;
pub mod context;
pub mod error;
pub mod integrity;
pub mod partition;
pub mod record;

#[cfg(test)]
pub(crate) mod test_util;

pub use chunk::{Chunk, ChunkBuilder, ChunkKey, ChunkOverrides, ColumnSet, UniqueId};
pub use config::{ChunkConfig, ConfigError};
pub use context::ChunkContext;
pub use error::{ChunkError, ChunkResult};
pub use integrity::{IntegrityIssue, IntegrityReport};
pub use partition::{ChunkGroup, ChunkGroups, PartitionOptions, common_columns, partition};
pub use record::{ChunkRecord, TaskRecord};
