//! Typed, named references to data artifacts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::ensemble::DistributionEnsemble;
use crate::error::{PrismError, Result};
use crate::model::Model;
use crate::sources::TableSource;

/// The kind of data an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// A row-addressable table.
    Table,
    /// An opaque trained model.
    Model,
    /// A per-row set of estimated distributions.
    DistributionEnsemble,
    /// Anything else; accessed by downcast.
    Opaque,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Table => write!(f, "a table"),
            ArtifactKind::Model => write!(f, "a model"),
            ArtifactKind::DistributionEnsemble => write!(f, "a distribution ensemble"),
            ArtifactKind::Opaque => write!(f, "an opaque artifact"),
        }
    }
}

/// A materialized artifact value.
#[derive(Clone)]
pub enum ArtifactValue {
    /// A row-addressable table.
    Table(Arc<dyn TableSource>),
    /// An opaque trained model.
    Model(Arc<Model>),
    /// A per-row set of estimated distributions.
    Ensemble(Arc<DistributionEnsemble>),
    /// Anything else; accessed by downcast.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl ArtifactValue {
    /// The kind of this value.
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactValue::Table(_) => ArtifactKind::Table,
            ArtifactValue::Model(_) => ArtifactKind::Model,
            ArtifactValue::Ensemble(_) => ArtifactKind::DistributionEnsemble,
            ArtifactValue::Opaque(_) => ArtifactKind::Opaque,
        }
    }

    /// Wraps an arbitrary value as an opaque artifact.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        ArtifactValue::Opaque(Arc::new(value))
    }
}

impl fmt::Debug for ArtifactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactValue::Table(t) => write!(f, "Table({} rows)", t.num_rows()),
            ArtifactValue::Model(m) => write!(f, "Model(creator={}, v{})", m.creator, m.version),
            ArtifactValue::Ensemble(e) => write!(f, "Ensemble({} objects)", e.len()),
            ArtifactValue::Opaque(_) => write!(f, "Opaque"),
        }
    }
}

/// Materializes a disk-backed artifact.
#[async_trait]
pub trait ArtifactLoader: Send + Sync + fmt::Debug {
    /// Loads the artifact stored at `path`.
    async fn load(&self, path: &Path) -> Result<ArtifactValue>;
}

/// Loader materializing a disk-backed Model handle from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct ModelFileLoader;

#[async_trait]
impl ArtifactLoader for ModelFileLoader {
    async fn load(&self, path: &Path) -> Result<ArtifactValue> {
        let path = path.to_path_buf();
        let model = tokio::task::spawn_blocking(move || Model::read(&path))
            .await
            .map_err(|e| PrismError::internal(format!("model read task failed: {e}")))??;
        Ok(ArtifactValue::Model(Arc::new(model)))
    }
}

#[derive(Debug)]
enum HandleStorage {
    Memory(ArtifactValue),
    OnDisk {
        path: PathBuf,
        loader: Arc<dyn ArtifactLoader>,
        cache: OnceCell<ArtifactValue>,
    },
}

/// A typed reference to a named data artifact.
///
/// The handle is independent of where the bytes live: an in-memory value is
/// returned directly, a disk-backed one is materialized through its loader
/// on first access and cached for the remainder of the run.
#[derive(Debug)]
pub struct Handle {
    name: String,
    kind: ArtifactKind,
    producer: Option<String>,
    created_at: DateTime<Utc>,
    storage: HandleStorage,
}

impl Handle {
    /// Creates a handle around an in-memory value.
    ///
    /// The kind is derived from the value.
    pub fn in_memory(name: impl Into<String>, value: ArtifactValue, producer: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind: value.kind(),
            producer: producer.map(str::to_string),
            created_at: Utc::now(),
            storage: HandleStorage::Memory(value),
        }
    }

    /// Creates a handle around a disk-backed artifact.
    ///
    /// Nothing is read until the first access; the loader must materialize a
    /// value of the declared kind.
    pub fn on_disk(
        name: impl Into<String>,
        kind: ArtifactKind,
        path: impl Into<PathBuf>,
        loader: Arc<dyn ArtifactLoader>,
        producer: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            producer: producer.map(str::to_string),
            created_at: Utc::now(),
            storage: HandleStorage::OnDisk {
                path: path.into(),
                loader,
                cache: OnceCell::new(),
            },
        }
    }

    /// The artifact name this handle is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared kind.
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The stage that produced this artifact, if recorded.
    pub fn producer(&self) -> Option<&str> {
        self.producer.as_deref()
    }

    /// When the handle was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the value is already materialized.
    pub fn is_loaded(&self) -> bool {
        match &self.storage {
            HandleStorage::Memory(_) => true,
            HandleStorage::OnDisk { cache, .. } => cache.initialized(),
        }
    }

    /// Returns the value, materializing and caching it on first access.
    ///
    /// # Errors
    ///
    /// Loader failures, or [`PrismError::ArtifactKindMismatch`] if the
    /// loader produced a value of a different kind than declared.
    pub async fn value(&self) -> Result<ArtifactValue> {
        match &self.storage {
            HandleStorage::Memory(value) => Ok(value.clone()),
            HandleStorage::OnDisk {
                path,
                loader,
                cache,
            } => {
                let value = cache
                    .get_or_try_init(|| async {
                        let loaded = loader.load(path).await?;
                        if loaded.kind() != self.kind {
                            return Err(PrismError::ArtifactKindMismatch {
                                name: self.name.clone(),
                                expected: self.kind,
                                found: loaded.kind(),
                            });
                        }
                        Ok(loaded)
                    })
                    .await?;
                Ok(value.clone())
            }
        }
    }

    /// Returns the value as a table.
    pub async fn table(&self) -> Result<Arc<dyn TableSource>> {
        match self.value().await? {
            ArtifactValue::Table(table) => Ok(table),
            other => Err(self.kind_mismatch(ArtifactKind::Table, other.kind())),
        }
    }

    /// Returns the value as a model.
    pub async fn model(&self) -> Result<Arc<Model>> {
        match self.value().await? {
            ArtifactValue::Model(model) => Ok(model),
            other => Err(self.kind_mismatch(ArtifactKind::Model, other.kind())),
        }
    }

    /// Returns the value as a distribution ensemble.
    pub async fn ensemble(&self) -> Result<Arc<DistributionEnsemble>> {
        match self.value().await? {
            ArtifactValue::Ensemble(ensemble) => Ok(ensemble),
            other => Err(self.kind_mismatch(ArtifactKind::DistributionEnsemble, other.kind())),
        }
    }

    /// Returns an opaque value downcast to `T`.
    pub async fn opaque<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        match self.value().await? {
            ArtifactValue::Opaque(any) => any.downcast::<T>().map_err(|_| {
                PrismError::internal(format!(
                    "opaque artifact '{}' does not hold the requested type",
                    self.name
                ))
            }),
            other => Err(self.kind_mismatch(ArtifactKind::Opaque, other.kind())),
        }
    }

    fn kind_mismatch(&self, expected: ArtifactKind, found: ArtifactKind) -> PrismError {
        PrismError::ArtifactKindMismatch {
            name: self.name.clone(),
            expected,
            found,
        }
    }
}
