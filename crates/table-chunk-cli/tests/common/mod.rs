use std::{fs::File, path::Path, sync::Arc};

use arrow::array::{Float64Builder, Int64Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn write_parquet_rows(path: &Path, rows: usize, with_eta: bool) -> TestResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut fields = vec![
        Field::new("event", DataType::Int64, false),
        Field::new("jet_pt", DataType::Float64, false),
    ];
    if with_eta {
        fields.push(Field::new("eta", DataType::Float64, false));
    }
    let schema = Arc::new(Schema::new(fields));

    let mut event = Int64Builder::with_capacity(rows);
    let mut jet_pt = Float64Builder::with_capacity(rows);
    let mut eta = Float64Builder::with_capacity(rows);
    for i in 0..rows {
        event.append_value(i as i64);
        jet_pt.append_value(25.0 + i as f64);
        eta.append_value(-2.5 + (i % 50) as f64 * 0.1);
    }

    let mut columns: Vec<arrow::array::ArrayRef> =
        vec![Arc::new(event.finish()), Arc::new(jet_pt.finish())];
    if with_eta {
        columns.push(Arc::new(eta.finish()));
    }

    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
