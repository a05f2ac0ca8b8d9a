//! Helpers for building small test tables.
//!
//! Available to integration tests and, behind the `test-utils` feature, to
//! downstream crates writing their own stage tests.

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use crate::sources::MemoryTable;
use crate::store::{ArtifactValue, Handle};

/// Builds a batch of named Float64 columns.
///
/// Every column must have the same length.
pub fn f64_batch(columns: &[(&str, Vec<f64>)]) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, _)| Field::new(*name, DataType::Float64, false))
        .collect();
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, values)| Arc::new(Float64Array::from(values.clone())) as ArrayRef)
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).expect("valid batch")
}

/// Wraps a batch as an in-memory table source.
pub fn memory_table(batch: RecordBatch) -> Arc<MemoryTable> {
    Arc::new(MemoryTable::new(batch))
}

/// Builds an in-memory Table handle around a batch.
pub fn table_handle(name: &str, batch: RecordBatch) -> Handle {
    Handle::in_memory(name, ArtifactValue::Table(memory_table(batch)), None)
}

/// A small catalog-like batch: `id`, `mag_r` and `redshift` columns.
pub fn catalog_batch(n: usize) -> RecordBatch {
    let ids = Int64Array::from_iter_values(0..n as i64);
    let mags = Float64Array::from_iter_values((0..n).map(|i| 20.0 + 0.05 * i as f64));
    let redshifts = Float64Array::from_iter_values((0..n).map(|i| 0.1 + 0.02 * i as f64));
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("mag_r", DataType::Float64, false),
        Field::new("redshift", DataType::Float64, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![Arc::new(ids), Arc::new(mags), Arc::new(redshifts)],
    )
    .expect("valid batch")
}
