//! Table storage behind the chunked execution protocol.
//!
//! The core treats tables as opaque stores of rows with random access by
//! row range: a [`TableSource`] reports how many rows it has and reads any
//! `[start, stop)` slice as an Arrow `RecordBatch`. Where a table lives
//! inside a container (the `table_group` configuration qualifier) is
//! resolved when the source is constructed; the executor only ever sees row
//! ranges.

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::fmt::Debug;

use crate::chunk::Chunk;
use crate::error::Result;

pub mod memory;
pub mod parquet;

pub use memory::MemoryTable;
pub use parquet::{write_parquet, ParquetTable, ParquetTableLoader};

/// Random row-range access to a stored table.
#[async_trait]
pub trait TableSource: Send + Sync + Debug {
    /// Total number of rows in the table.
    fn num_rows(&self) -> usize;

    /// The Arrow schema of the table.
    fn schema(&self) -> SchemaRef;

    /// Reads the rows covered by `chunk` as a single `RecordBatch`.
    ///
    /// # Errors
    ///
    /// Fails if the chunk reaches past the end of the table or the
    /// underlying storage cannot be read.
    async fn read_chunk(&self, chunk: Chunk) -> Result<RecordBatch>;

    /// Reads the whole table as a single `RecordBatch`.
    ///
    /// Convenient for fit stages and small tables; streaming callers should
    /// prefer [`TableSource::read_chunk`].
    async fn read_all(&self) -> Result<RecordBatch> {
        self.read_chunk(Chunk::new(0, self.num_rows())).await
    }
}

pub(crate) fn check_bounds(chunk: Chunk, num_rows: usize) -> Result<()> {
    if chunk.start > chunk.stop || chunk.stop > num_rows {
        return Err(crate::error::PrismError::internal(format!(
            "chunk [{}, {}) is out of bounds for a table of {} rows",
            chunk.start, chunk.stop, num_rows
        )));
    }
    Ok(())
}
