//! Save a table of per-city trend slopes to a parquet file.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::Result;
use arrow::{
    array::{ArrayRef, Float64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};
use serde::Serialize;

/// Trend slope of one model run at one city.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlopeRow {
    pub driving_model: String,
    pub rcm: String,
    pub city: String,
    pub slope: f64,
}

pub fn save_slopes(rows: &[SlopeRow], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("driving_model", DataType::Utf8, false),
        Field::new("rcm", DataType::Utf8, false),
        Field::new("city", DataType::Utf8, false),
        Field::new("slope", DataType::Float64, false),
    ]));

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let driving_models: Vec<&str> = rows.iter().map(|r| r.driving_model.as_str()).collect();
    let rcms: Vec<&str> = rows.iter().map(|r| r.rcm.as_str()).collect();
    let cities: Vec<&str> = rows.iter().map(|r| r.city.as_str()).collect();
    let slopes: Vec<f64> = rows.iter().map(|r| r.slope).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(driving_models)),
        Arc::new(StringArray::from(rcms)),
        Arc::new(StringArray::from(cities)),
        Arc::new(Float64Array::from(slopes)),
    ];

    let batch = RecordBatch::try_new(schema, columns)?;

    writer.write(&batch)?;

    writer.close()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------
