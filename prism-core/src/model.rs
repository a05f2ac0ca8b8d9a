//! Opaque model artifacts produced by fit stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{PrismError, Result};

/// A trained model, opaque to the execution core.
///
/// The payload is whatever the producing fit stage serialized; a consuming
/// transform stage deserializes it into its own types. The envelope carries
/// the producing stage type and a version so a consumer can refuse a model
/// it was not built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Name of the stage type that produced this model.
    pub creator: String,
    /// Model format version, bumped when the payload layout changes.
    pub version: u32,
    /// Free-form provenance entries (input names, parameter snapshots, ...).
    pub provenance: BTreeMap<String, String>,
    /// The opaque model payload.
    pub payload: serde_json::Value,
}

impl Model {
    /// Creates a model envelope around a payload.
    pub fn new(creator: impl Into<String>, version: u32, payload: serde_json::Value) -> Self {
        Self {
            creator: creator.into(),
            version,
            provenance: BTreeMap::new(),
            payload,
        }
    }

    /// Adds a provenance entry.
    pub fn with_provenance(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.provenance.insert(key.into(), value.into());
        self
    }

    /// Checks that this model matches what a consumer expects.
    ///
    /// Passing `None` skips the corresponding check.
    ///
    /// # Errors
    ///
    /// [`PrismError::ModelMismatch`] naming the mismatched field.
    pub fn validate(&self, creator: Option<&str>, version: Option<u32>) -> Result<()> {
        if let Some(expected) = creator {
            if expected != self.creator {
                return Err(PrismError::ModelMismatch {
                    field: "creator".to_string(),
                    expected: expected.to_string(),
                    found: self.creator.clone(),
                });
            }
        }
        if let Some(expected) = version {
            if expected != self.version {
                return Err(PrismError::ModelMismatch {
                    field: "version".to_string(),
                    expected: expected.to_string(),
                    found: self.version.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Deserializes the payload into a concrete model type.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Reads a model from a JSON file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Writes the model to a JSON file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }
}
