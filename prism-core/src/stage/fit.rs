//! The fit (inform/train) execution shape.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::{Config, ParamSchema, ParamValue};
use crate::error::Result;
use crate::store::{ArtifactKind, ArtifactValue, DataStore, Handle};

use super::lifecycle::{Lifecycle, StageState};
use super::transform::register_outputs;
use super::{resolve_inputs, InputSpec, OutputSpec, ResolvedInputs};

/// A stage that consumes training data in a single pass and produces a
/// Model (or other artifacts) for matching transform stages to consume.
///
/// Fit stages do not chunk: training typically needs the whole input at
/// once, and the model-specific hyperparameters in the schema pass through
/// configuration resolution unchanged, opaque to the core.
#[async_trait]
pub trait FitStage: Send + Sync + 'static {
    /// The stage type name, used in model envelopes and diagnostics.
    fn name(&self) -> &str;

    /// The declared parameter schema.
    fn schema(&self) -> Result<ParamSchema>;

    /// The declared input roles.
    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::required("input", ArtifactKind::Table)]
    }

    /// The declared output roles.
    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("model", ArtifactKind::Model)]
    }

    /// Trains on the resolved inputs and returns the produced artifacts,
    /// keyed by output role.
    async fn fit(
        &self,
        inputs: &ResolvedInputs,
        config: &Config,
    ) -> Result<Vec<(String, ArtifactValue)>>;
}

/// Drives a [`FitStage`] through its lifecycle.
#[derive(Debug)]
pub struct FitHarness<S: FitStage> {
    stage: Arc<S>,
    instance: String,
    input_bindings: HashMap<String, String>,
    output_bindings: HashMap<String, String>,
    config: Arc<Config>,
    lifecycle: Lifecycle,
    outputs: HashMap<String, Arc<Handle>>,
}

impl<S: FitStage> FitHarness<S> {
    /// Starts building a harness for one stage invocation.
    pub fn builder(stage: S, instance: impl Into<String>) -> FitBuilder<S> {
        FitBuilder::new(stage, instance)
    }

    /// The instance name of this invocation.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// The current lifecycle state.
    pub fn state(&self) -> StageState {
        self.lifecycle.state()
    }

    /// The resolved, immutable configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The handle registered for an output role, once finalized.
    pub fn output(&self, role: &str) -> Option<Arc<Handle>> {
        self.outputs.get(role).cloned()
    }

    /// Runs the stage: resolve inputs, fit, register outputs.
    #[instrument(skip_all, fields(stage = %self.instance, shape = "fit"))]
    pub async fn execute(&mut self, store: &DataStore) -> Result<HashMap<String, Arc<Handle>>> {
        self.lifecycle.ensure_startable()?;
        match self.run(store).await {
            Ok(handles) => {
                self.lifecycle.finalize()?;
                self.outputs = handles.clone();
                info!(stage = %self.instance, outputs = handles.len(), "stage finalized");
                Ok(handles)
            }
            Err(err) => {
                self.lifecycle.fail();
                Err(err)
            }
        }
    }

    async fn run(&mut self, store: &DataStore) -> Result<HashMap<String, Arc<Handle>>> {
        self.lifecycle.begin()?;
        let inputs = resolve_inputs(
            &self.instance,
            &self.stage.inputs(),
            &self.input_bindings,
            store,
        )
        .await?;
        let artifacts = self.stage.fit(&inputs, &self.config).await?;
        register_outputs(
            store,
            &self.instance,
            &self.stage.outputs(),
            &self.output_bindings,
            artifacts,
        )
        .await
    }
}

/// Builder for [`FitHarness`].
#[derive(Debug)]
pub struct FitBuilder<S: FitStage> {
    stage: S,
    instance: String,
    input_bindings: HashMap<String, String>,
    output_bindings: HashMap<String, String>,
    overrides: Vec<(String, ParamValue)>,
}

impl<S: FitStage> FitBuilder<S> {
    fn new(stage: S, instance: impl Into<String>) -> Self {
        Self {
            stage,
            instance: instance.into(),
            input_bindings: HashMap::new(),
            output_bindings: HashMap::new(),
            overrides: Vec::new(),
        }
    }

    /// Binds an input role to an artifact name.
    pub fn bind_input(mut self, role: &str, artifact: &str) -> Self {
        self.input_bindings
            .insert(role.to_string(), artifact.to_string());
        self
    }

    /// Binds an output role to an artifact name.
    pub fn bind_output(mut self, role: &str, artifact: &str) -> Self {
        self.output_bindings
            .insert(role.to_string(), artifact.to_string());
        self
    }

    /// Supplies a configuration override.
    pub fn set(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.overrides.push((key.to_string(), value.into()));
        self
    }

    /// Resolves the configuration and produces the harness.
    pub fn build(self) -> Result<FitHarness<S>> {
        let schema = self.stage.schema()?;
        let config = Config::resolve(&schema, self.overrides)?;
        let lifecycle = Lifecycle::configured(&self.instance);
        Ok(FitHarness {
            stage: Arc::new(self.stage),
            instance: self.instance,
            input_bindings: self.input_bindings,
            output_bindings: self.output_bindings,
            config: Arc::new(config),
            lifecycle,
            outputs: HashMap::new(),
        })
    }
}
