//! # Prism — execution core for staged catalog pipelines
//!
//! Prism is the shared machinery behind pipelines of interchangeable
//! scientific algorithms — photometric-redshift estimators, summarizers,
//! degraders, creators — exposed behind one uniform "stage" calling
//! convention. Concrete algorithms are leaf plug-ins; what this crate
//! provides is the part they all rely on:
//!
//! - a **data store**: a named-artifact registry tracking what each stage
//!   produced and consumed, with at-most-one-producer-per-name enforcement
//!   and load-on-demand handles,
//! - a **chunked execution protocol**: any stage can process tables far
//!   larger than memory by streaming fixed-size row chunks through a
//!   per-chunk transform and deterministically recombining the partials,
//! - a **configuration layer**: keyword arguments are validated against a
//!   declared schema and resolved into an immutable configuration before
//!   any algorithm runs.
//!
//! ## Quick start
//!
//! A minimal summarizer: count the rows of a table, chunk by chunk.
//!
//! ```rust
//! use prism_core::prelude::*;
//! use arrow::array::Int64Array;
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct RowCounter;
//!
//! #[async_trait]
//! impl TransformStage for RowCounter {
//!     type Partial = Vec<f64>;
//!     type Output = Vec<f64>;
//!
//!     fn name(&self) -> &str {
//!         "row_counter"
//!     }
//!
//!     fn schema(&self) -> Result<ParamSchema> {
//!         ParamSchema::builder().extend(&CHUNKED_PARAMS).build()
//!     }
//!
//!     fn outputs(&self) -> Vec<OutputSpec> {
//!         vec![OutputSpec::new("output", ArtifactKind::Opaque)]
//!     }
//!
//!     async fn process_chunk(
//!         &self,
//!         _chunk: Chunk,
//!         rows: RecordBatch,
//!         _inputs: &ResolvedInputs,
//!         _config: &Config,
//!     ) -> Result<Vec<f64>> {
//!         Ok(vec![rows.num_rows() as f64])
//!     }
//!
//!     fn aggregator(&self) -> Box<dyn Aggregator<Vec<f64>, Vec<f64>>> {
//!         Box::new(SumVectors)
//!     }
//!
//!     fn into_artifacts(
//!         &self,
//!         output: Vec<f64>,
//!         _config: &Config,
//!     ) -> Result<Vec<(String, ArtifactValue)>> {
//!         Ok(vec![("output".to_string(), ArtifactValue::opaque(output))])
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = DataStore::new();
//!
//! let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
//! let batch = RecordBatch::try_new(
//!     schema,
//!     vec![Arc::new(Int64Array::from_iter_values(0..10))],
//! )
//! .unwrap();
//! store
//!     .put(Handle::in_memory(
//!         "input",
//!         ArtifactValue::Table(Arc::new(MemoryTable::new(batch))),
//!         None,
//!     ))
//!     .await
//!     .unwrap();
//!
//! let mut stage = TransformHarness::builder(RowCounter, "count_1")
//!     .set("chunk_size", 3i64)
//!     .bind_output("output", "row_count")
//!     .build()
//!     .unwrap();
//! stage.execute(&store).await.unwrap();
//!
//! let total = store
//!     .get("row_count")
//!     .await
//!     .unwrap()
//!     .opaque::<Vec<f64>>()
//!     .await
//!     .unwrap();
//! assert_eq!(*total, vec![10.0]);
//! # });
//! ```
//!
//! ## Architecture
//!
//! - **`store`**: the per-run artifact registry ([`store::DataStore`]) and
//!   typed handles ([`store::Handle`]) with materialize-once storage
//! - **`config`**: parameter schemas, shared presets and one-pass
//!   resolution into an immutable [`config::Config`]
//! - **`chunk`**: the row-range [`chunk::ChunkIterator`] partitioning a
//!   table exactly once
//! - **`exec`**: the [`exec::ChunkExecutor`] (sequential or bounded
//!   parallel, order-preserving) and reusable [`exec::Aggregator`]
//!   strategies
//! - **`stage`**: the three execution shapes — fit, chunked transform,
//!   sample — and the harnesses driving their shared lifecycle
//! - **`sources`**: table storage behind the chunk protocol (in-memory,
//!   Parquet)
//! - **`model`** / **`ensemble`**: the Model and DistributionEnsemble
//!   artifact types
//! - **`logging`**: `tracing` subscriber setup for pipeline runs
//!
//! ## Execution model
//!
//! Per-stage output is invariant to the decomposition into chunks and to
//! the degree of parallelism: the executor re-sorts completions by chunk
//! start before aggregation, and `max_workers = 1` yields byte-identical
//! results to any larger pool. A stage either completes fully — outputs
//! registered atomically at finalize — or fails entirely, leaving the data
//! store exactly as it was.

pub mod chunk;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod exec;
pub mod logging;
pub mod model;
pub mod prelude;
pub mod sources;
pub mod stage;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
