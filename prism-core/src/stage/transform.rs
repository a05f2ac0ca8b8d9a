//! The chunked-transform execution shape.

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::chunk::{Chunk, ChunkIterator};
use crate::config::{Config, ParamSchema, ParamValue};
use crate::error::Result;
use crate::exec::{Aggregator, ChunkExecutor};
use crate::store::{ArtifactKind, ArtifactValue, DataStore, Handle};

use super::lifecycle::{Lifecycle, StageState};
use super::{
    build_output_handles, chunk_size_from, max_workers_from, resolve_inputs, InputSpec,
    OutputSpec, ResolvedInputs,
};

/// A stage that streams a table through a per-chunk transform.
///
/// Implementations supply only the per-chunk function and the aggregation
/// strategy; chunking, ordering, concurrency and output registration are
/// handled by the [`TransformHarness`]. Estimators, summarizers and
/// degraders are all this shape: an estimator returns ensemble blocks
/// concatenated per object, a summarizer returns fixed-shape summaries
/// accumulated across chunks.
#[async_trait]
pub trait TransformStage: Send + Sync + 'static {
    /// The per-chunk intermediate result.
    type Partial: Send + 'static;
    /// The aggregated output the stage turns into artifacts.
    type Output: Send + 'static;

    /// The stage type name, used in model envelopes and diagnostics.
    fn name(&self) -> &str;

    /// The declared parameter schema.
    fn schema(&self) -> Result<ParamSchema>;

    /// The declared input roles.
    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::required("input", ArtifactKind::Table)]
    }

    /// The declared output roles.
    fn outputs(&self) -> Vec<OutputSpec>;

    /// Which input role is streamed chunk by chunk.
    fn table_role(&self) -> &str {
        "input"
    }

    /// Transforms the rows of one chunk into a partial result.
    async fn process_chunk(
        &self,
        chunk: Chunk,
        rows: RecordBatch,
        inputs: &ResolvedInputs,
        config: &Config,
    ) -> Result<Self::Partial>;

    /// The reduction folding ordered partials into the final output.
    fn aggregator(&self) -> Box<dyn Aggregator<Self::Partial, Self::Output>>;

    /// Maps the aggregated output onto the declared output roles.
    fn into_artifacts(
        &self,
        output: Self::Output,
        config: &Config,
    ) -> Result<Vec<(String, ArtifactValue)>>;
}

/// Drives a [`TransformStage`] through its lifecycle.
#[derive(Debug)]
pub struct TransformHarness<S: TransformStage> {
    stage: Arc<S>,
    instance: String,
    input_bindings: HashMap<String, String>,
    output_bindings: HashMap<String, String>,
    config: Arc<Config>,
    lifecycle: Lifecycle,
    outputs: HashMap<String, Arc<Handle>>,
}

impl<S: TransformStage> TransformHarness<S> {
    /// Starts building a harness for one stage invocation.
    pub fn builder(stage: S, instance: impl Into<String>) -> TransformBuilder<S> {
        TransformBuilder::new(stage, instance)
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

    /// Runs the stage: resolve inputs, stream chunks, aggregate, register.
    ///
    /// Returns the registered output handles keyed by role. On any error
    /// the stage transitions to `Failed` and the store is left untouched.
    #[instrument(skip_all, fields(stage = %self.instance, shape = "transform"))]
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
        let inputs = Arc::new(
            resolve_inputs(
                &self.instance,
                &self.stage.inputs(),
                &self.input_bindings,
                store,
            )
            .await?,
        );
        let source = inputs.table(self.stage.table_role()).await?;
        let chunks = ChunkIterator::new(source.num_rows(), chunk_size_from(&self.config)?)?;
        let executor = ChunkExecutor::new(max_workers_from(&self.config));
        let aggregator = self.stage.aggregator();

        let stage = self.stage.clone();
        let config = self.config.clone();
        let per_chunk = {
            let inputs = inputs.clone();
            move |chunk: Chunk| {
                let stage = stage.clone();
                let config = config.clone();
                let inputs = inputs.clone();
                let source = source.clone();
                async move {
                    let rows = source.read_chunk(chunk).await?;
                    stage.process_chunk(chunk, rows, &inputs, &config).await
                }
            }
        };

        let output = executor
            .run_and_aggregate(chunks, per_chunk, aggregator.as_ref())
            .await?;
        let artifacts = self.stage.into_artifacts(output, &self.config)?;
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

/// Registers the produced artifacts atomically and keys them by role.
pub(crate) async fn register_outputs(
    store: &DataStore,
    instance: &str,
    specs: &[OutputSpec],
    bindings: &HashMap<String, String>,
    artifacts: Vec<(String, ArtifactValue)>,
) -> Result<HashMap<String, Arc<Handle>>> {
    let role_handles = build_output_handles(instance, specs, bindings, artifacts)?;
    let (roles, handles): (Vec<String>, Vec<Handle>) = role_handles.into_iter().unzip();
    let registered = store.put_all(handles).await?;
    Ok(roles.into_iter().zip(registered).collect())
}

/// Builder for [`TransformHarness`].
///
/// Config resolution happens in [`TransformBuilder::build`], so a harness
/// that exists is always validly configured.
#[derive(Debug)]
pub struct TransformBuilder<S: TransformStage> {
    stage: S,
    instance: String,
    input_bindings: HashMap<String, String>,
    output_bindings: HashMap<String, String>,
    overrides: Vec<(String, ParamValue)>,
}

impl<S: TransformStage> TransformBuilder<S> {
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
    ///
    /// # Errors
    ///
    /// [`crate::error::PrismError::Config`] listing every schema violation.
    pub fn build(self) -> Result<TransformHarness<S>> {
        let schema = self.stage.schema()?;
        let config = Config::resolve(&schema, self.overrides)?;
        let lifecycle = Lifecycle::configured(&self.instance);
        Ok(TransformHarness {
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
