//! End-to-end stage lifecycle scenarios against a shared data store.

mod common;

use common::*;
use prism_core::prelude::*;

#[tokio::test]
async fn model_artifact_appears_only_after_fit_finalizes() {
    let store = DataStore::new();
    register_table(&store, "training_sample", catalog_batch(50)).await;

    let err = store.get("model").await.unwrap_err();
    assert!(matches!(err, PrismError::UnknownArtifact { ref name } if name == "model"));

    let mut inform = FitHarness::builder(GridInformer, "inform_1")
        .bind_input("input", "training_sample")
        .bind_output("model", "model")
        .build()
        .unwrap();
    assert_eq!(inform.state(), StageState::Configured);

    let outputs = inform.execute(&store).await.unwrap();
    assert_eq!(inform.state(), StageState::Finalized);
    assert_eq!(outputs.len(), 1);

    let handle = store.get("model").await.unwrap();
    assert_eq!(handle.kind(), ArtifactKind::Model);
    assert_eq!(handle.producer(), Some("inform_1"));
    let model = handle.model().await.unwrap();
    assert_eq!(model.creator, "grid_informer");
}

#[tokio::test]
async fn fit_then_estimate_end_to_end() {
    let store = DataStore::new();
    register_table(&store, "training_sample", catalog_batch(60)).await;
    register_table(&store, "catalog", catalog_batch(25)).await;

    FitHarness::builder(GridInformer, "inform_1")
        .bind_input("input", "training_sample")
        .bind_output("model", "model")
        .build()
        .unwrap()
        .execute(&store)
        .await
        .unwrap();

    let mut estimate = TransformHarness::builder(DeltaEstimator, "estimate_1")
        .bind_input("input", "catalog")
        .bind_input("model", "model")
        .bind_output("output", "pz_estimates")
        .set("chunk_size", 7i64)
        .build()
        .unwrap();
    estimate.execute(&store).await.unwrap();

    let ensemble = store
        .get("pz_estimates")
        .await
        .unwrap()
        .ensemble()
        .await
        .unwrap();
    assert_eq!(ensemble.len(), 25);
    let modes = ensemble.ancil("mode").unwrap();
    assert_eq!(modes.len(), 25);
    // Every object got the same delta posterior from the same model.
    assert!(modes.iter().all(|&m| m == modes[0]));
}

#[tokio::test]
async fn failing_chunk_leaves_store_untouched() {
    let store = DataStore::new();
    register_table(&store, "input", catalog_batch(10)).await;

    let mut stage = TransformHarness::builder(FlakyCounter, "count_1")
        .bind_output("output", "row_count")
        .set("chunk_size", 3i64)
        .set("fail_at", 6i64)
        .build()
        .unwrap();
    let err = stage.execute(&store).await.unwrap_err();
    match err {
        PrismError::ChunkProcessing { start, stop, .. } => {
            assert_eq!((start, stop), (6, 9));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(stage.state(), StageState::Failed);
    assert!(!store.has("row_count").await);
    // Only the input table remains registered.
    assert_eq!(store.names().await, vec!["input"]);
}

#[tokio::test]
async fn terminal_stage_rejects_reexecution() {
    let store = DataStore::new();
    register_table(&store, "input", catalog_batch(10)).await;

    let mut stage = TransformHarness::builder(HistogramSummarizer, "summarize_1")
        .bind_output("output", "nz")
        .build()
        .unwrap();
    stage.execute(&store).await.unwrap();
    assert_eq!(stage.state(), StageState::Finalized);

    let err = stage.execute(&store).await.unwrap_err();
    assert!(matches!(
        err,
        PrismError::StageAlreadyTerminal {
            state: StageState::Finalized,
            ..
        }
    ));

    // A failed stage is just as terminal.
    let mut failing = TransformHarness::builder(FlakyCounter, "count_1")
        .bind_output("output", "row_count")
        .set("chunk_size", 3i64)
        .set("fail_at", 0i64)
        .build()
        .unwrap();
    failing.execute(&store).await.unwrap_err();
    let err = failing.execute(&store).await.unwrap_err();
    assert!(matches!(
        err,
        PrismError::StageAlreadyTerminal {
            state: StageState::Failed,
            ..
        }
    ));
}

#[tokio::test]
async fn config_violations_surface_at_build_time() {
    let err = match TransformHarness::builder(FlakyCounter, "count_1")
        .set("chunk_sze", 3i64)
        .set("chunk_size", "three")
        .build()
    {
        Ok(_) => panic!("expected a config error"),
        Err(err) => err,
    };
    match err {
        PrismError::Config { violations } => {
            let rendered = violations.to_string();
            assert_eq!(violations.len(), 3);
            assert!(rendered.contains("unknown parameter 'chunk_sze'"));
            assert!(rendered.contains("parameter 'chunk_size' expects int, got str"));
            assert!(rendered.contains("missing required parameter 'fail_at'"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn non_positive_chunk_size_fails_execution() {
    let store = DataStore::new();
    register_table(&store, "input", catalog_batch(10)).await;

    let mut stage = TransformHarness::builder(HistogramSummarizer, "summarize_1")
        .set("chunk_size", -5i64)
        .build()
        .unwrap();
    let err = stage.execute(&store).await.unwrap_err();
    assert!(matches!(err, PrismError::InvalidChunkSize { given: -5 }));
    assert_eq!(stage.state(), StageState::Failed);
}

#[tokio::test]
async fn second_producer_for_same_artifact_fails() {
    let store = DataStore::new();
    register_table(&store, "input", catalog_batch(10)).await;

    TransformHarness::builder(HistogramSummarizer, "summarize_1")
        .bind_output("output", "nz")
        .build()
        .unwrap()
        .execute(&store)
        .await
        .unwrap();

    let mut second = TransformHarness::builder(HistogramSummarizer, "summarize_2")
        .bind_output("output", "nz")
        .build()
        .unwrap();
    let err = second.execute(&store).await.unwrap_err();
    match err {
        PrismError::DuplicateArtifact { name, producer } => {
            assert_eq!(name, "nz");
            assert_eq!(producer, "summarize_1");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(second.state(), StageState::Failed);
}

#[tokio::test]
async fn missing_required_input_fails_the_transition() {
    let store = DataStore::new();

    let mut stage = TransformHarness::builder(HistogramSummarizer, "summarize_1")
        .bind_input("input", "catalog")
        .build()
        .unwrap();
    let err = stage.execute(&store).await.unwrap_err();
    match err {
        PrismError::MissingInput {
            stage,
            role,
            artifact,
        } => {
            assert_eq!(stage, "summarize_1");
            assert_eq!(role, "input");
            assert_eq!(artifact, "catalog");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unbound_outputs_register_under_instance_scoped_names() {
    let store = DataStore::new();
    register_table(&store, "input", catalog_batch(10)).await;

    let mut stage = TransformHarness::builder(HistogramSummarizer, "summarize_1")
        .build()
        .unwrap();
    let outputs = stage.execute(&store).await.unwrap();
    assert_eq!(outputs["output"].name(), "summarize_1.output");
    assert!(store.has("summarize_1.output").await);
}

#[tokio::test]
async fn sample_stage_starts_running_and_registers_a_table() {
    let store = DataStore::new();

    let mut creator = SampleHarness::builder(UniformCreator, "creator_1")
        .bind_output("output", "mock_catalog")
        .set("n_samples", 100i64)
        .set("chunk_size", 30i64)
        .build()
        .unwrap();
    assert_eq!(creator.state(), StageState::Running);

    creator.execute(&store).await.unwrap();
    assert_eq!(creator.state(), StageState::Finalized);

    let table = store
        .get("mock_catalog")
        .await
        .unwrap()
        .table()
        .await
        .unwrap();
    assert_eq!(table.num_rows(), 100);
}

#[tokio::test]
async fn zero_row_input_surfaces_the_empty_aggregation() {
    let store = DataStore::new();
    register_table(&store, "input", catalog_batch(0)).await;

    let mut stage = TransformHarness::builder(HistogramSummarizer, "summarize_1")
        .build()
        .unwrap();
    let err = stage.execute(&store).await.unwrap_err();
    assert!(matches!(err, PrismError::Aggregation { .. }));
    assert_eq!(stage.state(), StageState::Failed);
}
