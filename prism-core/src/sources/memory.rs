//! In-memory table source backed by a single `RecordBatch`.

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use crate::chunk::Chunk;
use crate::error::Result;

use super::{check_bounds, TableSource};

/// A table held entirely in memory.
///
/// Chunk reads are zero-copy slices of the backing batch, so an in-memory
/// table can feed the chunked execution path without duplicating rows.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    batch: RecordBatch,
}

impl MemoryTable {
    /// Wraps a single batch.
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Concatenates several batches of the same schema into one table.
    ///
    /// # Errors
    ///
    /// Fails if the batch list is empty or the schemas disagree.
    pub fn from_batches(batches: &[RecordBatch]) -> Result<Self> {
        let first = batches.first().ok_or_else(|| {
            crate::error::PrismError::internal("cannot build a table from zero batches")
        })?;
        let batch = concat_batches(&first.schema(), batches)?;
        Ok(Self { batch })
    }

    /// The backing batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }
}

#[async_trait]
impl TableSource for MemoryTable {
    fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    async fn read_chunk(&self, chunk: Chunk) -> Result<RecordBatch> {
        check_bounds(chunk, self.num_rows())?;
        Ok(self.batch.slice(chunk.start, chunk.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn table_of(values: Vec<i64>) -> MemoryTable {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap();
        MemoryTable::new(batch)
    }

    #[tokio::test]
    async fn chunk_reads_slice_the_batch() {
        let table = table_of((0..10).collect());
        let rows = table.read_chunk(Chunk::new(3, 7)).await.unwrap();
        assert_eq!(rows.num_rows(), 4);
        let ids = rows
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(ids.value(0), 3);
        assert_eq!(ids.value(3), 6);
    }

    #[tokio::test]
    async fn out_of_bounds_chunk_is_rejected() {
        let table = table_of((0..5).collect());
        assert!(table.read_chunk(Chunk::new(3, 8)).await.is_err());
    }

    #[tokio::test]
    async fn read_all_covers_every_row() {
        let table = table_of((0..5).collect());
        let rows = table.read_all().await.unwrap();
        assert_eq!(rows.num_rows(), 5);
    }

    #[tokio::test]
    async fn empty_table_reads_empty_batch() {
        let table = table_of(vec![]);
        let rows = table.read_all().await.unwrap();
        assert_eq!(rows.num_rows(), 0);
    }

    #[tokio::test]
    async fn from_batches_concatenates_in_order() {
        let a = table_of(vec![0, 1]).batch().clone();
        let b = table_of(vec![2, 3, 4]).batch().clone();
        let table = MemoryTable::from_batches(&[a, b]).unwrap();
        assert_eq!(table.num_rows(), 5);
        let rows = table.read_chunk(Chunk::new(1, 4)).await.unwrap();
        let ids = rows
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(&ids.values()[..], &[1, 2, 3]);
        assert!(MemoryTable::from_batches(&[]).is_err());
    }
}
