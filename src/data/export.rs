//! Writers for the current dataset. Format is picked from the file extension:
//! `.csv`, `.json` (records-oriented) or `.parquet`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use super::model::{Column, DType, Dataset, Value};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export extension: .{0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Parquet,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<ExportFormat, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "parquet" | "pq" => Ok(ExportFormat::Parquet),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Write `dataset` to `path`, dispatching on the extension.
pub fn export(dataset: &Dataset, path: &Path) -> Result<ExportFormat, ExportError> {
    let format = ExportFormat::from_path(path)?;
    let file = File::create(path)?;
    match format {
        ExportFormat::Csv => write_csv(dataset, file)?,
        ExportFormat::Json => write_json(dataset, BufWriter::new(file))?,
        ExportFormat::Parquet => write_parquet(dataset, file)?,
    }
    log::info!("exported {} rows to '{}'", dataset.len(), path.display());
    Ok(format)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

pub fn write_csv<W: Write>(dataset: &Dataset, out: W) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(dataset.column_names())?;
    for i in 0..dataset.len() {
        writer.write_record(dataset.row(i).iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

fn to_json(v: &Value) -> JsonValue {
    match v {
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Integer(i) => JsonValue::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Timestamp(t) => JsonValue::String(t.format("%Y-%m-%dT%H:%M:%S").to_string()),
        Value::Date(d) => JsonValue::String(d.to_string()),
        Value::Null => JsonValue::Null,
    }
}

/// `[{ "column": value, ... }, ...]`
pub fn write_json<W: Write>(dataset: &Dataset, mut out: W) -> Result<(), ExportError> {
    let names = dataset.column_names();
    let records: Vec<JsonValue> = (0..dataset.len())
        .map(|i| {
            let obj: Map<String, JsonValue> = names
                .iter()
                .zip(dataset.row(i))
                .map(|(name, v)| (name.to_string(), to_json(v)))
                .collect();
            JsonValue::Object(obj)
        })
        .collect();
    serde_json::to_writer(&mut out, &records)?;
    out.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn to_arrow(col: &Column) -> (DataType, ArrayRef) {
    match col.dtype() {
        DType::Integer => (
            DataType::Int64,
            Arc::new(Int64Array::from(
                col.values.iter().map(Value::as_whole_i64).collect::<Vec<_>>(),
            )),
        ),
        DType::Float => (
            DataType::Float64,
            Arc::new(Float64Array::from(
                col.values.iter().map(Value::as_f64).collect::<Vec<_>>(),
            )),
        ),
        DType::Bool => (
            DataType::Boolean,
            Arc::new(BooleanArray::from(
                col.values
                    .iter()
                    .map(|v| match v {
                        Value::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
        ),
        DType::Timestamp => (
            DataType::Timestamp(TimeUnit::Millisecond, None),
            Arc::new(TimestampMillisecondArray::from(
                col.values
                    .iter()
                    .map(|v| match v {
                        Value::Timestamp(t) => Some(t.and_utc().timestamp_millis()),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
        ),
        DType::Date => {
            let epoch = DateTime::<Utc>::UNIX_EPOCH.date_naive();
            (
                DataType::Date32,
                Arc::new(Date32Array::from(
                    col.values
                        .iter()
                        .map(|v| match v {
                            Value::Date(d) => Some((*d - epoch).num_days() as i32),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                )),
            )
        }
        DType::String | DType::Object | DType::Empty => (
            DataType::Utf8,
            Arc::new(StringArray::from(
                col.values
                    .iter()
                    .map(|v| (!v.is_null()).then(|| v.to_string()))
                    .collect::<Vec<_>>(),
            )),
        ),
    }
}

/// One nullable Arrow field per column.
pub fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch, ExportError> {
    let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = dataset
        .columns()
        .iter()
        .map(|c| {
            let (dtype, array) = to_arrow(c);
            (Field::new(c.name.clone(), dtype, true), array)
        })
        .unzip();
    let schema = Arc::new(Schema::new(fields));
    Ok(RecordBatch::try_new(schema, arrays)?)
}

/// The first `rows` rows rendered as a text table.
pub fn preview(dataset: &Dataset, rows: usize) -> Result<String, ExportError> {
    let head: Vec<usize> = (0..rows.min(dataset.len())).collect();
    let batch = to_record_batch(&dataset.take_rows(&head))?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

pub fn write_parquet<W: Write + Send>(dataset: &Dataset, out: W) -> Result<(), ExportError> {
    let batch = to_record_batch(dataset)?;
    let mut writer = ArrowWriter::try_new(out, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
