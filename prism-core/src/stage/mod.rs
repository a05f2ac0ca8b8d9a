//! Stages: the unit of computation, in three execution shapes.
//!
//! A stage declares named input and output roles, owns a resolved
//! configuration and implements one of a closed set of shapes:
//!
//! - **fit** ([`FitStage`]): single pass over its inputs, typically
//!   producing a Model — the inform/train side of an algorithm.
//! - **chunked transform** ([`TransformStage`]): streams a table input
//!   chunk by chunk through a per-chunk function and folds the ordered
//!   partials with an [`Aggregator`] — estimators, summarizers, degraders.
//! - **sample** ([`SampleStage`]): produces new data with no table input at
//!   all; its own generation loop is the chunk source.
//!
//! Each shape comes with a harness that drives the shared lifecycle:
//! resolve inputs from the [`DataStore`], run, and register every declared
//! output atomically on success. A stage never reads state it was not
//! explicitly given as an input, and a failed stage leaves the store
//! exactly as it was.
//!
//! [`Aggregator`]: crate::exec::Aggregator

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, ParamValue};
use crate::ensemble::DistributionEnsemble;
use crate::error::{PrismError, Result};
use crate::model::Model;
use crate::sources::TableSource;
use crate::store::{ArtifactKind, ArtifactValue, DataStore, Handle};

pub mod fit;
pub mod lifecycle;
pub mod sample;
pub mod transform;

pub use fit::{FitBuilder, FitHarness, FitStage};
pub use lifecycle::StageState;
pub use sample::{chunk_rng, SampleBuilder, SampleHarness, SampleStage};
pub use transform::{TransformBuilder, TransformHarness, TransformStage};

/// A declared input role of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    role: String,
    kind: ArtifactKind,
    required: bool,
}

impl InputSpec {
    /// Declares an input the stage cannot run without.
    pub fn required(role: &str, kind: ArtifactKind) -> Self {
        Self {
            role: role.to_string(),
            kind,
            required: true,
        }
    }

    /// Declares an input that may be absent from the store.
    pub fn optional(role: &str, kind: ArtifactKind) -> Self {
        Self {
            role: role.to_string(),
            kind,
            required: false,
        }
    }

    /// The logical role name.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The artifact kind this role must resolve to.
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Whether resolution fails when the artifact is absent.
    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// A declared output role of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    role: String,
    kind: ArtifactKind,
}

impl OutputSpec {
    /// Declares an output role.
    pub fn new(role: &str, kind: ArtifactKind) -> Self {
        Self {
            role: role.to_string(),
            kind,
        }
    }

    /// The logical role name.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The artifact kind this role produces.
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }
}

/// The input handles a stage resolved when it entered `Running`.
///
/// Optional roles that were absent from the store are simply missing here;
/// [`ResolvedInputs::has`] distinguishes that case.
#[derive(Debug, Clone, Default)]
pub struct ResolvedInputs {
    handles: HashMap<String, Arc<Handle>>,
}

impl ResolvedInputs {
    /// The handle resolved for a role, if any.
    pub fn handle(&self, role: &str) -> Option<&Arc<Handle>> {
        self.handles.get(role)
    }

    /// Whether the role resolved to an artifact.
    pub fn has(&self, role: &str) -> bool {
        self.handles.contains_key(role)
    }

    /// The table resolved for a role.
    pub async fn table(&self, role: &str) -> Result<Arc<dyn TableSource>> {
        self.required(role)?.table().await
    }

    /// The model resolved for a role.
    pub async fn model(&self, role: &str) -> Result<Arc<Model>> {
        self.required(role)?.model().await
    }

    /// The distribution ensemble resolved for a role.
    pub async fn ensemble(&self, role: &str) -> Result<Arc<DistributionEnsemble>> {
        self.required(role)?.ensemble().await
    }

    /// An opaque input downcast to `T`.
    pub async fn opaque<T: Any + Send + Sync>(&self, role: &str) -> Result<Arc<T>> {
        self.required(role)?.opaque::<T>().await
    }

    fn required(&self, role: &str) -> Result<&Arc<Handle>> {
        self.handles.get(role).ok_or_else(|| {
            PrismError::internal(format!(
                "input role '{role}' was not declared or did not resolve"
            ))
        })
    }
}

/// Resolves every declared input role from the store.
///
/// An unbound role resolves to the artifact named after the role itself.
pub(crate) async fn resolve_inputs(
    stage: &str,
    specs: &[InputSpec],
    bindings: &HashMap<String, String>,
    store: &DataStore,
) -> Result<ResolvedInputs> {
    let mut handles = HashMap::with_capacity(specs.len());
    for spec in specs {
        let artifact = bindings
            .get(spec.role())
            .map(String::as_str)
            .unwrap_or(spec.role());
        if !store.has(artifact).await {
            if spec.is_required() {
                return Err(PrismError::MissingInput {
                    stage: stage.to_string(),
                    role: spec.role().to_string(),
                    artifact: artifact.to_string(),
                });
            }
            continue;
        }
        let handle = store.get(artifact).await?;
        if handle.kind() != spec.kind() {
            return Err(PrismError::ArtifactKindMismatch {
                name: artifact.to_string(),
                expected: spec.kind(),
                found: handle.kind(),
            });
        }
        handles.insert(spec.role().to_string(), handle);
    }
    Ok(ResolvedInputs { handles })
}

/// Turns the values a stage produced into handles, one per declared role.
///
/// An unbound output role registers under `"<instance>.<role>"`. Every
/// declared role must be produced exactly once, with the declared kind;
/// undeclared roles are rejected.
pub(crate) fn build_output_handles(
    instance: &str,
    specs: &[OutputSpec],
    bindings: &HashMap<String, String>,
    artifacts: Vec<(String, ArtifactValue)>,
) -> Result<Vec<(String, Handle)>> {
    let mut produced: HashMap<String, ArtifactValue> = HashMap::with_capacity(artifacts.len());
    for (role, value) in artifacts {
        if produced.insert(role.clone(), value).is_some() {
            return Err(PrismError::internal(format!(
                "stage '{instance}' produced output role '{role}' more than once"
            )));
        }
    }
    let mut handles = Vec::with_capacity(specs.len());
    for spec in specs {
        let value = produced.remove(spec.role()).ok_or_else(|| {
            PrismError::MissingOutput {
                stage: instance.to_string(),
                role: spec.role().to_string(),
            }
        })?;
        let artifact = bindings
            .get(spec.role())
            .cloned()
            .unwrap_or_else(|| format!("{instance}.{}", spec.role()));
        if value.kind() != spec.kind() {
            return Err(PrismError::ArtifactKindMismatch {
                name: artifact,
                expected: spec.kind(),
                found: value.kind(),
            });
        }
        handles.push((
            spec.role().to_string(),
            Handle::in_memory(artifact, value, Some(instance)),
        ));
    }
    if let Some(role) = produced.into_keys().next() {
        return Err(PrismError::internal(format!(
            "stage '{instance}' produced undeclared output role '{role}'"
        )));
    }
    Ok(handles)
}

/// Reads the positive chunk size out of a resolved config.
pub(crate) fn chunk_size_from(config: &Config) -> Result<usize> {
    let given = config.get_i64("chunk_size")?;
    if given <= 0 {
        return Err(PrismError::InvalidChunkSize { given });
    }
    Ok(given as usize)
}

/// Reads the worker bound out of a resolved config; absent means sequential.
pub(crate) fn max_workers_from(config: &Config) -> usize {
    config
        .get("max_workers")
        .and_then(ParamValue::as_i64)
        .map(|v| v.max(1) as usize)
        .unwrap_or(1)
}
