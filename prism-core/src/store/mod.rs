//! The named-artifact registry shared by every stage of a run.
//!
//! The store maps artifact name → [`Handle`], enforcing exactly one live
//! producer per name. Registration happens only when a stage finalizes, so
//! readers never observe a partially written artifact. The store is scoped
//! to one pipeline run: it is created (or [`DataStore::clear`]ed) at run
//! start and carries no state across runs.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{PrismError, Result};

pub mod handle;

pub use handle::{ArtifactKind, ArtifactLoader, ArtifactValue, Handle, ModelFileLoader};

/// Registry of the artifacts produced and consumed during one pipeline run.
///
/// Cloning is cheap and shares the underlying registry, so one store value
/// is created per run and handed to every stage harness.
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    inner: Arc<RwLock<HashMap<String, Arc<Handle>>>>,
}

impl DataStore {
    /// Creates an empty store for a new run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle under its artifact name.
    ///
    /// # Errors
    ///
    /// [`PrismError::DuplicateArtifact`] if the name already has a live
    /// producer; the existing registration is left untouched.
    #[instrument(skip(self, handle), fields(artifact = handle.name()))]
    pub async fn put(&self, handle: Handle) -> Result<Arc<Handle>> {
        let mut entries = self.inner.write().await;
        if let Some(existing) = entries.get(handle.name()) {
            return Err(duplicate(existing));
        }
        let handle = Arc::new(handle);
        debug!(
            artifact = handle.name(),
            producer = handle.producer().unwrap_or("unknown"),
            "registered artifact"
        );
        entries.insert(handle.name().to_string(), handle.clone());
        Ok(handle)
    }

    /// Registers several handles atomically.
    ///
    /// Either every handle is registered or none is: all names (including
    /// duplicates within the batch itself) are verified free under one lock
    /// before the first insertion.
    ///
    /// # Errors
    ///
    /// [`PrismError::DuplicateArtifact`] for the first contested name.
    #[instrument(skip_all, fields(count = handles.len()))]
    pub async fn put_all(&self, handles: Vec<Handle>) -> Result<Vec<Arc<Handle>>> {
        let mut entries = self.inner.write().await;
        for (i, handle) in handles.iter().enumerate() {
            if let Some(existing) = entries.get(handle.name()) {
                return Err(duplicate(existing));
            }
            if handles[..i].iter().any(|h| h.name() == handle.name()) {
                return Err(PrismError::DuplicateArtifact {
                    name: handle.name().to_string(),
                    producer: handle.producer().unwrap_or("unknown").to_string(),
                });
            }
        }
        let mut registered = Vec::with_capacity(handles.len());
        for handle in handles {
            let handle = Arc::new(handle);
            entries.insert(handle.name().to_string(), handle.clone());
            registered.push(handle);
        }
        Ok(registered)
    }

    /// Looks up a handle by artifact name.
    ///
    /// # Errors
    ///
    /// [`PrismError::UnknownArtifact`] if nothing is registered under the
    /// name.
    pub async fn get(&self, name: &str) -> Result<Arc<Handle>> {
        self.inner
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PrismError::UnknownArtifact {
                name: name.to_string(),
            })
    }

    /// Non-throwing existence check, used by optional-input resolution.
    pub async fn has(&self, name: &str) -> bool {
        self.inner.read().await.contains_key(name)
    }

    /// Removes a live registration, permitting a later re-registration.
    ///
    /// # Errors
    ///
    /// [`PrismError::UnknownArtifact`] if nothing is registered under the
    /// name.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, name: &str) -> Result<Arc<Handle>> {
        self.inner
            .write()
            .await
            .remove(name)
            .ok_or_else(|| PrismError::UnknownArtifact {
                name: name.to_string(),
            })
    }

    /// Drops every entry; called at run start.
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Number of registered artifacts.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the store holds no artifacts.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// The registered artifact names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

fn duplicate(existing: &Arc<Handle>) -> PrismError {
    PrismError::DuplicateArtifact {
        name: existing.name().to_string(),
        producer: existing.producer().unwrap_or("unknown").to_string(),
    }
}
