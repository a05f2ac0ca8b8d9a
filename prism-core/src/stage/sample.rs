//! The sample (creator) execution shape.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::chunk::{Chunk, ChunkIterator};
use crate::config::{Config, ParamSchema, ParamValue};
use crate::error::{PrismError, Result};
use crate::exec::{Aggregator, ChunkExecutor};
use crate::store::{ArtifactKind, ArtifactValue, DataStore, Handle};

use super::lifecycle::{Lifecycle, StageState};
use super::transform::register_outputs;
use super::{chunk_size_from, max_workers_from, resolve_inputs, InputSpec, OutputSpec,
    ResolvedInputs};

/// Derives the RNG for one generated chunk.
///
/// Each chunk gets its own stream keyed on the configured seed and the
/// chunk's first row, so the generated data is reproducible and independent
/// of how chunks are scheduled across workers.
pub fn chunk_rng(seed: i64, chunk: Chunk) -> StdRng {
    let stream = (seed as u64) ^ (chunk.start as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    StdRng::seed_from_u64(stream)
}

/// A stage that produces new data with no table input at all.
///
/// A sample stage begins directly in `Running` and treats its own
/// generation loop as the chunk source: `n_samples` rows are partitioned by
/// `chunk_size` exactly as a table input would be, and each chunk is
/// generated by [`SampleStage::sample_chunk`]. Declared inputs (typically
/// an optional model) are still resolved from the store before generation.
#[async_trait]
pub trait SampleStage: Send + Sync + 'static {
    /// The per-chunk generated block.
    type Partial: Send + 'static;
    /// The aggregated output the stage turns into artifacts.
    type Output: Send + 'static;

    /// The stage type name, used in diagnostics.
    fn name(&self) -> &str;

    /// The declared parameter schema; must include `n_samples`,
    /// `chunk_size` and `seed` (see the `SAMPLER_PARAMS` preset).
    fn schema(&self) -> Result<ParamSchema>;

    /// The declared input roles; none by default.
    fn inputs(&self) -> Vec<InputSpec> {
        vec![]
    }

    /// The declared output roles.
    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("output", ArtifactKind::Table)]
    }

    /// Generates the rows covered by one chunk.
    async fn sample_chunk(
        &self,
        chunk: Chunk,
        inputs: &ResolvedInputs,
        config: &Config,
    ) -> Result<Self::Partial>;

    /// The reduction folding ordered generated blocks into the output.
    fn aggregator(&self) -> Box<dyn Aggregator<Self::Partial, Self::Output>>;

    /// Maps the aggregated output onto the declared output roles.
    fn into_artifacts(
        &self,
        output: Self::Output,
        config: &Config,
    ) -> Result<Vec<(String, ArtifactValue)>>;
}

/// Drives a [`SampleStage`] through its lifecycle.
#[derive(Debug)]
pub struct SampleHarness<S: SampleStage> {
    stage: Arc<S>,
    instance: String,
    input_bindings: HashMap<String, String>,
    output_bindings: HashMap<String, String>,
    config: Arc<Config>,
    lifecycle: Lifecycle,
    outputs: HashMap<String, Arc<Handle>>,
}

impl<S: SampleStage> SampleHarness<S> {
    /// Starts building a harness for one stage invocation.
    pub fn builder(stage: S, instance: impl Into<String>) -> SampleBuilder<S> {
        SampleBuilder::new(stage, instance)
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

    /// Runs the generation loop and registers the outputs.
    #[instrument(skip_all, fields(stage = %self.instance, shape = "sample"))]
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
        let inputs = Arc::new(
            resolve_inputs(
                &self.instance,
                &self.stage.inputs(),
                &self.input_bindings,
                store,
            )
            .await?,
        );
        let n_samples = self.config.get_i64("n_samples")?;
        let n_samples = usize::try_from(n_samples).map_err(|_| {
            PrismError::internal(format!("n_samples must be non-negative, got {n_samples}"))
        })?;
        let chunks = ChunkIterator::new(n_samples, chunk_size_from(&self.config)?)?;
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
                async move { stage.sample_chunk(chunk, &inputs, &config).await }
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

/// Builder for [`SampleHarness`].
#[derive(Debug)]
pub struct SampleBuilder<S: SampleStage> {
    stage: S,
    instance: String,
    input_bindings: HashMap<String, String>,
    output_bindings: HashMap<String, String>,
    overrides: Vec<(String, ParamValue)>,
}

impl<S: SampleStage> SampleBuilder<S> {
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
    /// The harness starts directly in `Running`.
    pub fn build(self) -> Result<SampleHarness<S>> {
        let schema = self.stage.schema()?;
        let config = Config::resolve(&schema, self.overrides)?;
        let lifecycle = Lifecycle::running(&self.instance);
        Ok(SampleHarness {
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
