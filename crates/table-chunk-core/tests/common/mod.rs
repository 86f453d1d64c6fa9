use std::{fs::File, path::Path, sync::Arc};

use arrow::array::{Float64Builder, Int64Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use table_chunk_core::backend::parquet_file::TABLE_NAME_KEY;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Write `rows` events numbered from `first_event`, plus any `extra` columns
/// (filled with zeros).
pub fn write_events(
    path: &Path,
    first_event: i64,
    rows: usize,
    extra: &[&str],
    table_name: Option<&str>,
) -> TestResult {
    let mut fields = vec![
        Field::new("event", DataType::Int64, false),
        Field::new("jet_pt", DataType::Float64, false),
    ];
    for name in extra {
        fields.push(Field::new(*name, DataType::Float64, false));
    }
    let schema = Arc::new(Schema::new(fields));

    let mut event = Int64Builder::with_capacity(rows);
    let mut jet_pt = Float64Builder::with_capacity(rows);
    for i in 0..rows {
        event.append_value(first_event + i as i64);
        jet_pt.append_value(30.0 + (i % 17) as f64);
    }

    let mut columns: Vec<arrow::array::ArrayRef> =
        vec![Arc::new(event.finish()), Arc::new(jet_pt.finish())];
    for _ in extra {
        let mut b = Float64Builder::with_capacity(rows);
        b.append_slice(&vec![0.0; rows]);
        columns.push(Arc::new(b.finish()));
    }

    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let props = WriterProperties::builder()
        .set_max_row_group_size(64)
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
