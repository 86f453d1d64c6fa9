//! Parquet implementation of the backend capabilities.
//!
//! A Parquet file holds exactly one table. The table's name is stored in the
//! footer key/value metadata under [`TABLE_NAME_KEY`]; files written without
//! that entry answer to the configured default table name.

use std::{fs::File, io, path::Path};

use parquet::{
    arrow::{ProjectionMask, arrow_reader::ParquetRecordBatchReaderBuilder},
    file::{
        metadata::KeyValue,
        reader::{FileReader, SerializedFileReader},
    },
};
use snafu::prelude::*;

use arrow_array::RecordBatch;

use crate::backend::{
    ArrowSnafu, BackendResult, ChunkReader, IoSnafu, NotFoundSnafu, ParquetSnafu, ReadRequest,
    TableBackend, TableInfo, TableNotFoundSnafu,
};
use crate::chunk::{ColumnSet, UniqueId};

/// Footer key/value entry naming the table stored in a file.
pub const TABLE_NAME_KEY: &str = "table_name";

/// Reads table metadata and rows from local Parquet files.
#[derive(Clone, Debug)]
pub struct ParquetBackend {
    default_table_name: String,
    batch_size: usize,
}

impl ParquetBackend {
    /// Create a backend; files without a [`TABLE_NAME_KEY`] entry are named
    /// `default_table_name`.
    pub fn new(default_table_name: impl Into<String>, batch_size: usize) -> Self {
        Self {
            default_table_name: default_table_name.into(),
            batch_size: batch_size.max(1),
        }
    }

    fn open_file(path: &Path) -> BackendResult<File> {
        let path_str = path.display().to_string();
        match File::open(path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(e).context(NotFoundSnafu { path: path_str })
            }
            Err(e) => Err(e).context(IoSnafu { path: path_str }),
        }
    }

    fn stored_table_name<'a>(&'a self, kv: Option<&'a Vec<KeyValue>>) -> &'a str {
        kv.and_then(|entries| {
            entries
                .iter()
                .find(|entry| entry.key == TABLE_NAME_KEY)
                .and_then(|entry| entry.value.as_deref())
        })
        .unwrap_or(&self.default_table_name)
    }

    fn ensure_table(
        &self,
        path: &Path,
        kv: Option<&Vec<KeyValue>>,
        table_name: &str,
    ) -> BackendResult<()> {
        let available = self.stored_table_name(kv);
        ensure!(
            available == table_name,
            TableNotFoundSnafu {
                path: path.display().to_string(),
                table: table_name.to_string(),
                available: available.to_string(),
            }
        );
        Ok(())
    }
}

/// Derive the content identity of a file.
///
/// Hashes a domain tag and the complete file bytes with BLAKE3 and keeps the
/// first 32 hex chars behind a `uid-` prefix. Rewriting a file with different
/// contents at the same path yields a different id.
pub fn unique_id_v1(data: &[u8]) -> UniqueId {
    let mut h = unique_id_hasher();
    h.update(data);
    finish_unique_id(&h)
}

/// Same id as [`unique_id_v1`], hashing the reader's contents in blocks.
pub fn unique_id_v1_reader(reader: impl io::Read) -> io::Result<UniqueId> {
    let mut h = unique_id_hasher();
    h.update_reader(reader)?;
    Ok(finish_unique_id(&h))
}

fn unique_id_hasher() -> blake3::Hasher {
    let mut h = blake3::Hasher::new();
    h.update(b"chunk-uid-v1");
    h.update(b"\0");
    h
}

fn finish_unique_id(h: &blake3::Hasher) -> UniqueId {
    let hex = h.finalize().to_hex();
    UniqueId(format!("uid-{}", &hex[..32]))
}

impl TableBackend for ParquetBackend {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn open(&self, path: &Path, table_name: &str) -> BackendResult<TableInfo> {
        let mut file = Self::open_file(path)?;
        let unique_id = unique_id_v1_reader(&mut file).context(IoSnafu {
            path: path.display().to_string(),
        })?;

        // Footer reads seek explicitly; the offset left by hashing is moot.
        let reader = SerializedFileReader::new(file).context(ParquetSnafu {
            path: path.display().to_string(),
        })?;
        let file_meta = reader.metadata().file_metadata();
        self.ensure_table(path, file_meta.key_value_metadata(), table_name)?;

        let columns: ColumnSet = file_meta
            .schema_descr()
            .root_schema()
            .get_fields()
            .iter()
            .map(|field| field.name().to_string())
            .collect();

        // Footer row counts are never negative for well-formed files.
        let row_count = u64::try_from(file_meta.num_rows()).unwrap_or(0);

        Ok(TableInfo {
            columns,
            row_count,
            unique_id,
        })
    }
}

impl ChunkReader for ParquetBackend {
    fn read(&self, request: &ReadRequest<'_>) -> BackendResult<Vec<RecordBatch>> {
        let path_str = request.path.display().to_string();
        let file = Self::open_file(request.path)?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file).context(ParquetSnafu {
            path: path_str.clone(),
        })?;
        self.ensure_table(
            request.path,
            builder.metadata().file_metadata().key_value_metadata(),
            request.table_name,
        )?;

        let mask = match request.column_set {
            Some(columns) => {
                ProjectionMask::columns(builder.parquet_schema(), columns.iter().map(String::as_str))
            }
            None => ProjectionMask::all(),
        };

        let offset = usize::try_from(request.entry_start).unwrap_or(usize::MAX);
        let limit = usize::try_from(request.num_rows()).unwrap_or(usize::MAX);

        let reader = builder
            .with_projection(mask)
            .with_batch_size(self.batch_size)
            .with_offset(offset)
            .with_limit(limit)
            .build()
            .context(ParquetSnafu {
                path: path_str.clone(),
            })?;

        reader
            .collect::<Result<Vec<_>, _>>()
            .context(ArrowSnafu { path: path_str })
    }
}
