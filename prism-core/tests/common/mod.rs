//! Shared fixtures: small concrete stages exercising the three shapes.
#![allow(dead_code)]

use arrow::array::Float64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use prism_core::prelude::*;
use prism_core::test_utils::{f64_batch, table_handle};

/// Builds a catalog-like batch with a bounded `redshift` column.
pub fn catalog_batch(n: usize) -> RecordBatch {
    let redshifts = (0..n).map(|i| (i % 30) as f64 * 0.1).collect();
    f64_batch(&[("redshift", redshifts)])
}

/// Registers a batch in the store as an in-memory table.
pub async fn register_table(store: &DataStore, name: &str, batch: RecordBatch) {
    store.put(table_handle(name, batch)).await.unwrap();
}

fn redshift_column(rows: &RecordBatch) -> Result<&Float64Array> {
    rows.column_by_name("redshift")
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| PrismError::internal("column 'redshift' not found or not Float64"))
}

fn grid_from(config: &Config) -> Result<(f64, f64, usize, Vec<f64>)> {
    let zmin = config.get_f64("zmin")?;
    let zmax = config.get_f64("zmax")?;
    let nzbins = config.get_i64("nzbins")? as usize;
    let step = (zmax - zmin) / (nzbins - 1) as f64;
    let grid = (0..nzbins).map(|i| zmin + step * i as f64).collect();
    Ok((zmin, zmax, nzbins, grid))
}

/// The payload trained by [`GridInformer`] and consumed by [`DeltaEstimator`].
#[derive(Debug, Serialize, Deserialize)]
pub struct Trained {
    pub z0: f64,
}

/// Fit stage: trains on the mean redshift of the training table.
pub struct GridInformer;

#[async_trait]
impl FitStage for GridInformer {
    fn name(&self) -> &str {
        "grid_informer"
    }

    fn schema(&self) -> Result<ParamSchema> {
        ParamSchema::builder().extend(&GRID_PARAMS).build()
    }

    async fn fit(
        &self,
        inputs: &ResolvedInputs,
        _config: &Config,
    ) -> Result<Vec<(String, ArtifactValue)>> {
        let table = inputs.table("input").await?;
        let rows = table.read_all().await?;
        let redshifts = redshift_column(&rows)?;
        let n = redshifts.len().max(1);
        let z0 = redshifts.values().iter().sum::<f64>() / n as f64;
        let model = Model::new(self.name(), 1, json!({ "z0": z0 }))
            .with_provenance("rows_trained_on", rows.num_rows().to_string());
        Ok(vec![(
            "model".to_string(),
            ArtifactValue::Model(Arc::new(model)),
        )])
    }
}

/// Transform stage: a delta-function posterior at the trained redshift for
/// every input object, with a mode point estimate attached.
pub struct DeltaEstimator;

#[async_trait]
impl TransformStage for DeltaEstimator {
    type Partial = DistributionEnsemble;
    type Output = DistributionEnsemble;

    fn name(&self) -> &str {
        "delta_estimator"
    }

    fn schema(&self) -> Result<ParamSchema> {
        ParamSchema::builder()
            .extend(&CHUNKED_PARAMS)
            .extend(&GRID_PARAMS)
            .build()
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::required("model", ArtifactKind::Model),
            InputSpec::required("input", ArtifactKind::Table),
        ]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("output", ArtifactKind::DistributionEnsemble)]
    }

    async fn process_chunk(
        &self,
        _chunk: Chunk,
        rows: RecordBatch,
        inputs: &ResolvedInputs,
        config: &Config,
    ) -> Result<DistributionEnsemble> {
        let model = inputs.model("model").await?;
        model.validate(Some("grid_informer"), Some(1))?;
        let trained: Trained = model.payload_as()?;
        let (zmin, zmax, nzbins, grid) = grid_from(config)?;
        let step = (zmax - zmin) / (nzbins - 1) as f64;
        let peak = (((trained.z0 - zmin) / step).round() as usize).min(nzbins - 1);

        let pdfs = (0..rows.num_rows())
            .map(|_| {
                let mut pdf = vec![0.0; nzbins];
                pdf[peak] = 1.0;
                pdf
            })
            .collect();
        let mut block = DistributionEnsemble::new(grid, pdfs)?;
        block.add_point_estimates(&[PointEstimate::Mode])?;
        Ok(block)
    }

    fn aggregator(&self) -> Box<dyn Aggregator<DistributionEnsemble, DistributionEnsemble>> {
        Box::new(ConcatEnsembles)
    }

    fn into_artifacts(
        &self,
        output: DistributionEnsemble,
        _config: &Config,
    ) -> Result<Vec<(String, ArtifactValue)>> {
        Ok(vec![(
            "output".to_string(),
            ArtifactValue::Ensemble(Arc::new(output)),
        )])
    }
}

/// Transform stage: histogram of the redshift column, accumulated across
/// chunks.
pub struct HistogramSummarizer;

#[async_trait]
impl TransformStage for HistogramSummarizer {
    type Partial = Vec<f64>;
    type Output = Vec<f64>;

    fn name(&self) -> &str {
        "histogram_summarizer"
    }

    fn schema(&self) -> Result<ParamSchema> {
        ParamSchema::builder()
            .extend(&CHUNKED_PARAMS)
            .extend(&GRID_PARAMS)
            .build()
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("output", ArtifactKind::Opaque)]
    }

    async fn process_chunk(
        &self,
        _chunk: Chunk,
        rows: RecordBatch,
        _inputs: &ResolvedInputs,
        config: &Config,
    ) -> Result<Vec<f64>> {
        let (zmin, zmax, nzbins, _) = grid_from(config)?;
        let redshifts = redshift_column(&rows)?;
        let mut counts = vec![0.0; nzbins];
        for value in redshifts.values().iter() {
            let fraction = (value - zmin) / (zmax - zmin);
            let bin = ((fraction * nzbins as f64) as usize).min(nzbins - 1);
            counts[bin] += 1.0;
        }
        Ok(counts)
    }

    fn aggregator(&self) -> Box<dyn Aggregator<Vec<f64>, Vec<f64>>> {
        Box::new(SumVectors)
    }

    fn into_artifacts(
        &self,
        output: Vec<f64>,
        _config: &Config,
    ) -> Result<Vec<(String, ArtifactValue)>> {
        Ok(vec![("output".to_string(), ArtifactValue::opaque(output))])
    }
}

/// Transform stage that fails on the chunk starting at `fail_at`.
pub struct FlakyCounter;

#[async_trait]
impl TransformStage for FlakyCounter {
    type Partial = Vec<f64>;
    type Output = Vec<f64>;

    fn name(&self) -> &str {
        "flaky_counter"
    }

    fn schema(&self) -> Result<ParamSchema> {
        ParamSchema::builder()
            .extend(&CHUNKED_PARAMS)
            .required("fail_at", ParamKind::Int, "chunk start that fails")
            .build()
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("output", ArtifactKind::Opaque)]
    }

    async fn process_chunk(
        &self,
        chunk: Chunk,
        rows: RecordBatch,
        _inputs: &ResolvedInputs,
        config: &Config,
    ) -> Result<Vec<f64>> {
        if chunk.start as i64 == config.get_i64("fail_at")? {
            return Err(PrismError::internal("synthetic chunk failure"));
        }
        Ok(vec![rows.num_rows() as f64])
    }

    fn aggregator(&self) -> Box<dyn Aggregator<Vec<f64>, Vec<f64>>> {
        Box::new(SumVectors)
    }

    fn into_artifacts(
        &self,
        output: Vec<f64>,
        _config: &Config,
    ) -> Result<Vec<(String, ArtifactValue)>> {
        Ok(vec![("output".to_string(), ArtifactValue::opaque(output))])
    }
}

/// Sample stage: draws uniform redshifts with a per-chunk seeded RNG.
pub struct UniformCreator;

#[async_trait]
impl SampleStage for UniformCreator {
    type Partial = RecordBatch;
    type Output = RecordBatch;

    fn name(&self) -> &str {
        "uniform_creator"
    }

    fn schema(&self) -> Result<ParamSchema> {
        ParamSchema::builder()
            .extend(&SAMPLER_PARAMS)
            .extend(&GRID_PARAMS)
            .build()
    }

    async fn sample_chunk(
        &self,
        chunk: Chunk,
        _inputs: &ResolvedInputs,
        config: &Config,
    ) -> Result<RecordBatch> {
        let zmin = config.get_f64("zmin")?;
        let zmax = config.get_f64("zmax")?;
        let mut rng = chunk_rng(config.get_i64("seed")?, chunk);
        let redshifts =
            Float64Array::from_iter_values((0..chunk.len()).map(|_| rng.random_range(zmin..zmax)));
        let schema = Arc::new(Schema::new(vec![Field::new(
            "redshift",
            DataType::Float64,
            false,
        )]));
        Ok(RecordBatch::try_new(schema, vec![Arc::new(redshifts)])?)
    }

    fn aggregator(&self) -> Box<dyn Aggregator<RecordBatch, RecordBatch>> {
        Box::new(ConcatBatches)
    }

    fn into_artifacts(
        &self,
        output: RecordBatch,
        _config: &Config,
    ) -> Result<Vec<(String, ArtifactValue)>> {
        Ok(vec![(
            "output".to_string(),
            ArtifactValue::Table(Arc::new(MemoryTable::new(output))),
        )])
    }
}
