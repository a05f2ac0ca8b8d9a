//! Error types for the Prism execution core.
//!
//! All failures surfaced by the core are represented by the [`PrismError`]
//! enum. Every variant carries enough structured detail (offending parameter
//! name, failing chunk range, artifact name) to diagnose a run without
//! re-running with added logging.

use thiserror::Error;

use crate::config::ConfigViolations;
use crate::stage::StageState;
use crate::store::ArtifactKind;

/// The main error type for the Prism execution core.
#[derive(Error, Debug)]
pub enum PrismError {
    /// One or more stage parameters failed schema validation.
    ///
    /// Resolution collects every violation in a single pass, so this variant
    /// lists all of them, not just the first.
    #[error("invalid configuration: {violations}")]
    Config {
        /// Every violation found during resolution.
        violations: ConfigViolations,
    },

    /// A parameter schema was itself malformed.
    ///
    /// Raised at schema-definition time, before any stage runs.
    #[error("invalid parameter schema: {message}")]
    Schema {
        /// What was wrong with the schema definition.
        message: String,
    },

    /// A required input could not be resolved from the data store.
    #[error("stage '{stage}' is missing required input '{role}' (artifact '{artifact}')")]
    MissingInput {
        /// Instance name of the stage whose input resolution failed.
        stage: String,
        /// Logical input role that could not be resolved.
        role: String,
        /// Artifact name the role was bound to.
        artifact: String,
    },

    /// An artifact name already has a live producer in this run.
    #[error("artifact '{name}' is already registered (produced by '{producer}')")]
    DuplicateArtifact {
        /// The contested artifact name.
        name: String,
        /// Producer of the existing registration.
        producer: String,
    },

    /// No artifact is registered under the requested name.
    #[error("no artifact registered under name '{name}'")]
    UnknownArtifact {
        /// The name that was looked up.
        name: String,
    },

    /// An artifact was accessed as a different kind than it holds.
    #[error("artifact '{name}' holds {found}, expected {expected}")]
    ArtifactKindMismatch {
        /// Name of the mis-accessed artifact.
        name: String,
        /// Kind the caller asked for.
        expected: ArtifactKind,
        /// Kind actually registered.
        found: ArtifactKind,
    },

    /// A non-positive chunk size was requested.
    #[error("chunk size must be positive, got {given}")]
    InvalidChunkSize {
        /// The rejected value.
        given: i64,
    },

    /// A per-chunk transform failed.
    ///
    /// Carries the failing chunk's row range and the original cause. No
    /// stage output is registered when this is raised.
    #[error("processing of chunk [{start}, {stop}) failed: {source}")]
    ChunkProcessing {
        /// First row of the failing chunk.
        start: usize,
        /// One past the last row of the failing chunk.
        stop: usize,
        /// The underlying failure.
        #[source]
        source: Box<PrismError>,
    },

    /// The aggregator received a malformed partial sequence.
    ///
    /// Wrong arity or order is an internal invariant violation and always
    /// fatal; an empty partial sequence is reported here as well so callers
    /// handle the zero-row edge case explicitly.
    #[error("aggregation failed: {message}")]
    Aggregation {
        /// What the aggregator observed.
        message: String,
    },

    /// A declared output was not produced by the stage body.
    #[error("stage '{stage}' did not produce declared output '{role}'")]
    MissingOutput {
        /// Instance name of the stage.
        stage: String,
        /// The declared output role that is missing.
        role: String,
    },

    /// A finished or failed stage object was driven again.
    #[error("stage '{stage}' has already reached terminal state {state}")]
    StageAlreadyTerminal {
        /// Instance name of the stage.
        stage: String,
        /// The terminal state it is in.
        state: StageState,
    },

    /// A model failed its creator/version validation.
    #[error("model {field} does not match: expected {expected}, found {found}")]
    ModelMismatch {
        /// Which field mismatched ("creator" or "version").
        field: String,
        /// Value the consumer required.
        expected: String,
        /// Value carried by the model.
        found: String,
    },

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from Parquet operations.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Error from serialization/deserialization operations.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error for conditions the core's invariants should prevent.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, PrismError>` used throughout the crate.
pub type Result<T> = std::result::Result<T, PrismError>;

impl PrismError {
    /// Creates a schema-definition error with the given message.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates an aggregation error with the given message.
    pub fn aggregation(message: impl Into<String>) -> Self {
        Self::Aggregation {
            message: message.into(),
        }
    }

    /// Creates an internal error with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wraps an error as the cause of a failing chunk.
    pub fn chunk(start: usize, stop: usize, source: PrismError) -> Self {
        Self::ChunkProcessing {
            start,
            stop,
            source: Box::new(source),
        }
    }
}

impl From<serde_json::Error> for PrismError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
