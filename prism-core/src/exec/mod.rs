//! Chunked execution: drives a per-chunk function over a chunk sequence.
//!
//! The executor guarantees that the aggregator never observes partial
//! results out of chunk order, regardless of how many workers run or in
//! which order they finish. Parallel completions are buffered and re-sorted
//! by chunk `start` before hand-off, and the sorted sequence is verified
//! against the chunk plan. A failure in any chunk aborts the in-flight work
//! and surfaces the failing row range; the aggregator is never invoked.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::chunk::{Chunk, ChunkIterator};
use crate::error::{PrismError, Result};

pub mod aggregate;

pub use aggregate::{Aggregator, ConcatBatches, ConcatEnsembles, FoldAggregator, SumVectors};

/// Applies a per-chunk function to every chunk of a sequence.
#[derive(Debug, Clone)]
pub struct ChunkExecutor {
    max_workers: usize,
}

impl ChunkExecutor {
    /// Creates an executor with the given worker bound.
    ///
    /// `max_workers <= 1` forces strictly sequential execution with
    /// identical observable results; larger values are clamped to the
    /// number of available cores.
    pub fn new(max_workers: usize) -> Self {
        Self { max_workers }
    }

    /// Creates a strictly sequential executor.
    pub fn sequential() -> Self {
        Self::new(1)
    }

    /// The configured worker bound.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    fn effective_workers(&self) -> usize {
        self.max_workers.min(num_cpus::get().max(1)).max(1)
    }

    /// Runs `per_chunk` over every chunk and returns the partial results in
    /// chunk order.
    ///
    /// An empty chunk sequence (zero-row table) yields an empty partial
    /// vector; the caller's aggregator decides how to treat it.
    ///
    /// # Errors
    ///
    /// [`PrismError::ChunkProcessing`] carrying the failing chunk's range
    /// and cause; in-flight chunks are aborted and no partials are
    /// returned. [`PrismError::Aggregation`] if the completed set does not
    /// match the chunk plan exactly (internal invariant).
    #[instrument(skip_all, fields(chunks = chunks.num_chunks(), max_workers = self.max_workers))]
    pub async fn run<P, F, Fut>(&self, chunks: ChunkIterator, per_chunk: F) -> Result<Vec<P>>
    where
        P: Send + 'static,
        F: Fn(Chunk) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<P>> + Send + 'static,
    {
        let plan: Vec<Chunk> = chunks.restart().collect();
        if self.effective_workers() <= 1 {
            return self.run_sequential(plan, per_chunk).await;
        }
        self.run_parallel(plan, per_chunk).await
    }

    async fn run_sequential<P, F, Fut>(&self, plan: Vec<Chunk>, per_chunk: F) -> Result<Vec<P>>
    where
        F: Fn(Chunk) -> Fut,
        Fut: Future<Output = Result<P>>,
    {
        let mut partials = Vec::with_capacity(plan.len());
        for chunk in plan {
            debug!(start = chunk.start, stop = chunk.stop, "processing chunk");
            let partial = per_chunk(chunk)
                .await
                .map_err(|e| PrismError::chunk(chunk.start, chunk.stop, e))?;
            partials.push(partial);
        }
        Ok(partials)
    }

    async fn run_parallel<P, F, Fut>(&self, plan: Vec<Chunk>, per_chunk: F) -> Result<Vec<P>>
    where
        P: Send + 'static,
        F: Fn(Chunk) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<P>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.effective_workers()));
        let mut tasks: JoinSet<Result<(Chunk, P)>> = JoinSet::new();

        for chunk in plan.iter().copied() {
            let semaphore = semaphore.clone();
            let per_chunk = per_chunk.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| PrismError::internal("worker pool closed unexpectedly"))?;
                debug!(start = chunk.start, stop = chunk.stop, "processing chunk");
                let partial = per_chunk(chunk)
                    .await
                    .map_err(|e| PrismError::chunk(chunk.start, chunk.stop, e))?;
                Ok((chunk, partial))
            });
        }

        let mut completed: Vec<(Chunk, P)> = Vec::with_capacity(plan.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(pair)) => completed.push(pair),
                Ok(Err(err)) => {
                    tasks.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    tasks.abort_all();
                    if join_err.is_cancelled() {
                        continue;
                    }
                    return Err(PrismError::internal(format!(
                        "chunk worker panicked: {join_err}"
                    )));
                }
            }
        }

        completed.sort_by_key(|(chunk, _)| chunk.start);
        verify_against_plan(&completed, &plan)?;
        Ok(completed.into_iter().map(|(_, partial)| partial).collect())
    }

    /// Runs the chunk loop and folds the ordered partials in one call.
    ///
    /// The aggregator is invoked only after every chunk succeeded.
    pub async fn run_and_aggregate<P, O, F, Fut>(
        &self,
        chunks: ChunkIterator,
        per_chunk: F,
        aggregator: &dyn Aggregator<P, O>,
    ) -> Result<O>
    where
        P: Send + 'static,
        O: Send,
        F: Fn(Chunk) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<P>> + Send + 'static,
    {
        let partials = self.run(chunks, per_chunk).await?;
        aggregator.combine(partials)
    }
}

fn verify_against_plan<P>(completed: &[(Chunk, P)], plan: &[Chunk]) -> Result<()> {
    if completed.len() != plan.len() {
        return Err(PrismError::aggregation(format!(
            "expected {} partial results, got {}",
            plan.len(),
            completed.len()
        )));
    }
    for ((chunk, _), expected) in completed.iter().zip(plan) {
        if chunk != expected {
            return Err(PrismError::aggregation(format!(
                "partial for chunk [{}, {}) arrived where [{}, {}) was planned",
                chunk.start, chunk.stop, expected.start, expected.stop
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn chunks_of(total: usize, size: usize) -> ChunkIterator {
        ChunkIterator::new(total, size).unwrap()
    }

    #[tokio::test]
    async fn sequential_preserves_chunk_order() {
        let executor = ChunkExecutor::sequential();
        let starts = executor
            .run(chunks_of(10, 3), |chunk| async move { Ok(chunk.start) })
            .await
            .unwrap();
        assert_eq!(starts, vec![0, 3, 6, 9]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_reorders_to_chunk_order() {
        let executor = ChunkExecutor::new(4);
        // Earlier chunks sleep longer, so completion order is reversed.
        let starts = executor
            .run(chunks_of(40, 10), |chunk| async move {
                tokio::time::sleep(Duration::from_millis(40 - chunk.start as u64)).await;
                Ok(chunk.start)
            })
            .await
            .unwrap();
        assert_eq!(starts, vec![0, 10, 20, 30]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_matches_sequential() {
        let per_chunk = |chunk: Chunk| async move { Ok(chunk.len()) };
        let sequential = ChunkExecutor::sequential()
            .run(chunks_of(100, 7), per_chunk)
            .await
            .unwrap();
        let parallel = ChunkExecutor::new(4)
            .run(chunks_of(100, 7), per_chunk)
            .await
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[tokio::test]
    async fn failure_reports_the_chunk_range() {
        let executor = ChunkExecutor::sequential();
        let err = executor
            .run(chunks_of(10, 3), |chunk| async move {
                if chunk.start == 6 {
                    Err(PrismError::internal("bad rows"))
                } else {
                    Ok(chunk.len())
                }
            })
            .await
            .unwrap_err();
        match err {
            PrismError::ChunkProcessing { start, stop, .. } => {
                assert_eq!((start, stop), (6, 9));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_failure_reports_the_chunk_range() {
        let executor = ChunkExecutor::new(4);
        let err = executor
            .run(chunks_of(10, 3), |chunk| async move {
                if chunk.start == 3 {
                    Err(PrismError::internal("bad rows"))
                } else {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(chunk.len())
                }
            })
            .await
            .unwrap_err();
        match err {
            PrismError::ChunkProcessing { start, stop, .. } => {
                assert_eq!((start, stop), (3, 6));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_sequence_yields_no_partials() {
        let executor = ChunkExecutor::new(4);
        let partials = executor
            .run(chunks_of(0, 10), |chunk| async move { Ok(chunk.len()) })
            .await
            .unwrap();
        assert!(partials.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn run_and_aggregate_sums_row_counts() {
        let executor = ChunkExecutor::new(2);
        let total = executor
            .run_and_aggregate(
                chunks_of(10, 3),
                |chunk| async move { Ok(vec![chunk.len() as f64]) },
                &SumVectors,
            )
            .await
            .unwrap();
        assert_eq!(total, vec![10.0]);
    }
}
