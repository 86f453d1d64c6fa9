use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use arrow::array::{Float64Builder, Int64Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow_array::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use crate::backend::parquet_file::TABLE_NAME_KEY;
use crate::backend::{BackendError, BackendResult, TableBackend, TableInfo};
use crate::chunk::UniqueId;

pub(crate) type TestResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Clone, Debug)]
struct MemoryTable {
    table_name: String,
    columns: Vec<String>,
    row_count: u64,
    version: u32,
}

/// In-memory backend that counts metadata opens.
#[derive(Debug, Default)]
pub(crate) struct MemoryBackend {
    tables: Mutex<HashMap<PathBuf, MemoryTable>>,
    opens: AtomicUsize,
}

impl MemoryBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_table(self, path: &str, table: &str, columns: &[&str], rows: u64) -> Self {
        self.put(path, table, columns, rows);
        self
    }

    /// Insert or replace the file at `path`; replacing bumps its identity.
    pub(crate) fn put(&self, path: &str, table: &str, columns: &[&str], rows: u64) {
        let mut tables = self.tables.lock().unwrap();
        let version = tables
            .get(Path::new(path))
            .map(|t| t.version + 1)
            .unwrap_or(1);
        tables.insert(
            PathBuf::from(path),
            MemoryTable {
                table_name: table.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                row_count: rows,
                version,
            },
        );
    }

    pub(crate) fn remove(&self, path: &str) {
        self.tables.lock().unwrap().remove(Path::new(path));
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn as_dyn(self: &Arc<Self>) -> Arc<dyn TableBackend> {
        self.clone()
    }
}

impl TableBackend for MemoryBackend {
    fn exists(&self, path: &Path) -> bool {
        self.tables.lock().unwrap().contains_key(path)
    }

    fn open(&self, path: &Path, table_name: &str) -> BackendResult<TableInfo> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        let table = tables.get(path).ok_or_else(|| BackendError::NotFound {
            path: path.display().to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such table file"),
        })?;
        if table.table_name != table_name {
            return Err(BackendError::TableNotFound {
                path: path.display().to_string(),
                table: table_name.to_string(),
                available: table.table_name.clone(),
            });
        }
        Ok(TableInfo {
            columns: table.columns.iter().cloned().collect(),
            row_count: table.row_count,
            unique_id: UniqueId(format!("uid-{}-v{}", path.display(), table.version)),
        })
    }
}

/// Write a Parquet file with columns `run`, `event` and `jet_pt`.
///
/// `event` counts up from `first_event`. When `table_name` is given it is
/// stored in the footer.
pub(crate) fn write_events_parquet(
    path: &Path,
    first_event: i64,
    rows: usize,
    table_name: Option<&str>,
) -> TestResult {
    let schema = Arc::new(Schema::new(vec![
        Field::new("run", DataType::Int64, false),
        Field::new("event", DataType::Int64, false),
        Field::new("jet_pt", DataType::Float64, false),
    ]));

    let mut run = Int64Builder::with_capacity(rows);
    let mut event = Int64Builder::with_capacity(rows);
    let mut jet_pt = Float64Builder::with_capacity(rows);
    for i in 0..rows {
        run.append_value(1);
        event.append_value(first_event + i as i64);
        jet_pt.append_value(20.0 + i as f64 * 0.5);
    }

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(run.finish()),
            Arc::new(event.finish()),
            Arc::new(jet_pt.finish()),
        ],
    )?;

    let props = WriterProperties::builder()
        .set_key_value_metadata(
            table_name.map(|name| vec![KeyValue::new(TABLE_NAME_KEY.to_string(), name.to_string())]),
        )
        .build();

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
