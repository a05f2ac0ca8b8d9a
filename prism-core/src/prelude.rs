//! Convenience re-exports for building and running stages.
//!
//! ```rust
//! use prism_core::prelude::*;
//! ```

pub use crate::chunk::{Chunk, ChunkIterator};
pub use crate::config::{
    Config, ConfigViolation, ParamKind, ParamSchema, ParamValue, SchemaBuilder, CHUNKED_PARAMS,
    GRID_PARAMS, SAMPLER_PARAMS, SELECTION_PARAMS,
};
pub use crate::ensemble::{DistributionEnsemble, PointEstimate};
pub use crate::error::{PrismError, Result};
pub use crate::exec::{
    Aggregator, ChunkExecutor, ConcatBatches, ConcatEnsembles, FoldAggregator, SumVectors,
};
pub use crate::model::Model;
pub use crate::sources::{MemoryTable, ParquetTable, ParquetTableLoader, TableSource};
pub use crate::stage::{
    chunk_rng, FitHarness, FitStage, InputSpec, OutputSpec, ResolvedInputs, SampleHarness,
    SampleStage, StageState, TransformHarness, TransformStage,
};
pub use crate::store::{
    ArtifactKind, ArtifactLoader, ArtifactValue, DataStore, Handle, ModelFileLoader,
};
