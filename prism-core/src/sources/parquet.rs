//! Parquet-backed table source with row-range random access.

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReaderBuilder, RowSelection, RowSelector};
use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

use crate::chunk::Chunk;
use crate::error::{PrismError, Result};
use crate::store::{ArtifactLoader, ArtifactValue};

use super::{check_bounds, TableSource};

/// A table stored in a Parquet file.
///
/// Opening reads only the file metadata; row data is fetched per chunk with
/// a Parquet row selection, so tables far larger than memory can be
/// streamed. File I/O runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct ParquetTable {
    path: PathBuf,
    num_rows: usize,
    schema: SchemaRef,
}

impl ParquetTable {
    /// Opens a Parquet file, reading its metadata.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or is not valid Parquet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let num_rows = builder.metadata().file_metadata().num_rows() as usize;
        let schema = builder.schema().clone();
        Ok(Self {
            path,
            num_rows,
            schema,
        })
    }

    /// The file this table reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_chunk_blocking(path: &Path, schema: &SchemaRef, chunk: Chunk) -> Result<RecordBatch> {
        let file = File::open(path)?;
        let mut selectors = Vec::with_capacity(2);
        if chunk.start > 0 {
            selectors.push(RowSelector::skip(chunk.start));
        }
        selectors.push(RowSelector::select(chunk.len()));
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_row_selection(RowSelection::from(selectors))
            .with_batch_size(chunk.len())
            .build()?;
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        if batches.is_empty() {
            return Ok(RecordBatch::new_empty(schema.clone()));
        }
        Ok(concat_batches(schema, &batches)?)
    }
}

#[async_trait]
impl TableSource for ParquetTable {
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn read_chunk(&self, chunk: Chunk) -> Result<RecordBatch> {
        check_bounds(chunk, self.num_rows)?;
        if chunk.is_empty() {
            return Ok(RecordBatch::new_empty(self.schema.clone()));
        }
        let path = self.path.clone();
        let schema = self.schema.clone();
        tokio::task::spawn_blocking(move || Self::read_chunk_blocking(&path, &schema, chunk))
            .await
            .map_err(|e| PrismError::internal(format!("parquet read task failed: {e}")))?
    }
}

/// Writes a batch to a Parquet file, replacing any existing content.
pub fn write_parquet(path: impl AsRef<Path>, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Loader materializing a disk-backed Table handle from a Parquet file.
#[derive(Debug, Clone, Default)]
pub struct ParquetTableLoader;

#[async_trait]
impl ArtifactLoader for ParquetTableLoader {
    async fn load(&self, path: &Path) -> Result<ArtifactValue> {
        let path = path.to_path_buf();
        let table = tokio::task::spawn_blocking(move || ParquetTable::open(&path))
            .await
            .map_err(|e| PrismError::internal(format!("parquet open task failed: {e}")))??;
        Ok(ArtifactValue::Table(Arc::new(table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::catalog_batch;
    use arrow::array::Int64Array;

    #[tokio::test]
    async fn round_trips_and_reads_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.parquet");
        let batch = catalog_batch(100);
        write_parquet(&path, &batch).unwrap();

        let table = ParquetTable::open(&path).unwrap();
        assert_eq!(table.num_rows(), 100);

        let rows = table.read_chunk(Chunk::new(40, 55)).await.unwrap();
        assert_eq!(rows.num_rows(), 15);
        let ids = rows
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(ids.value(0), 40);
        assert_eq!(ids.value(14), 54);
    }

    #[tokio::test]
    async fn chunk_reads_match_memory_slices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.parquet");
        let batch = catalog_batch(37);
        write_parquet(&path, &batch).unwrap();

        let table = ParquetTable::open(&path).unwrap();
        for chunk in crate::chunk::ChunkIterator::new(37, 10).unwrap() {
            let from_file = table.read_chunk(chunk).await.unwrap();
            let from_memory = batch.slice(chunk.start, chunk.len());
            assert_eq!(from_file, from_memory);
        }
    }

    #[tokio::test]
    async fn loader_materializes_a_table_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.parquet");
        write_parquet(&path, &catalog_batch(10)).unwrap();

        let value = ParquetTableLoader.load(&path).await.unwrap();
        match value {
            ArtifactValue::Table(table) => assert_eq!(table.num_rows(), 10),
            other => panic!("expected a table, got {other:?}"),
        }
    }
}
