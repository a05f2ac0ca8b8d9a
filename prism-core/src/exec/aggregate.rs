//! Reductions that fold ordered per-chunk partials into a final output.
//!
//! Two shapes recur across pipeline stages: per-object transforms produce
//! row blocks that are concatenated back into a table the length of the
//! input, and summarizers produce fixed-shape numeric summaries that are
//! accumulated element-wise. Both are provided here so a stage author only
//! supplies the per-chunk function; ordering and concurrency stay in the
//! executor.

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;

use crate::ensemble::DistributionEnsemble;
use crate::error::{PrismError, Result};

/// A stage-specific reduction over ordered partial results.
///
/// The executor guarantees exactly one partial per chunk, in chunk order,
/// with no duplicates or omissions. Implementations decide what an empty
/// sequence (a zero-row input) means; the strategies in this module treat
/// it as an error the caller must handle explicitly.
pub trait Aggregator<P, O>: Send + Sync {
    /// Combines the ordered partials into the final output.
    fn combine(&self, partials: Vec<P>) -> Result<O>;
}

/// Concatenates per-chunk row blocks into a single batch.
///
/// Used by per-object transforms whose output has the same row count and
/// order as the input table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatBatches;

impl Aggregator<RecordBatch, RecordBatch> for ConcatBatches {
    fn combine(&self, partials: Vec<RecordBatch>) -> Result<RecordBatch> {
        let first = partials.first().ok_or_else(|| {
            PrismError::aggregation(
                "no row blocks to concatenate; empty inputs must be handled by the caller",
            )
        })?;
        let schema = first.schema();
        Ok(concat_batches(&schema, &partials)?)
    }
}

/// Concatenates per-chunk distribution ensembles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatEnsembles;

impl Aggregator<DistributionEnsemble, DistributionEnsemble> for ConcatEnsembles {
    fn combine(&self, partials: Vec<DistributionEnsemble>) -> Result<DistributionEnsemble> {
        DistributionEnsemble::concat(partials)
    }
}

/// Sums fixed-shape numeric summaries element-wise.
///
/// Used by summarizers such as histogram accumulators: every partial must
/// have the same length, and the result is their element-wise sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumVectors;

impl Aggregator<Vec<f64>, Vec<f64>> for SumVectors {
    fn combine(&self, partials: Vec<Vec<f64>>) -> Result<Vec<f64>> {
        let mut iter = partials.into_iter();
        let mut total = iter.next().ok_or_else(|| {
            PrismError::aggregation(
                "no summaries to accumulate; empty inputs must be handled by the caller",
            )
        })?;
        for partial in iter {
            if partial.len() != total.len() {
                return Err(PrismError::aggregation(format!(
                    "summary shape changed between chunks: {} vs {}",
                    total.len(),
                    partial.len()
                )));
            }
            for (acc, value) in total.iter_mut().zip(&partial) {
                *acc += value;
            }
        }
        Ok(total)
    }
}

/// Wraps a closure as an aggregator for bespoke reductions.
pub struct FoldAggregator<P, O, F>
where
    F: Fn(Vec<P>) -> Result<O> + Send + Sync,
{
    fold: F,
    _marker: std::marker::PhantomData<fn(Vec<P>) -> O>,
}

impl<P, O, F> FoldAggregator<P, O, F>
where
    F: Fn(Vec<P>) -> Result<O> + Send + Sync,
{
    /// Wraps `fold` as an aggregator.
    pub fn new(fold: F) -> Self {
        Self {
            fold,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<P, O, F> Aggregator<P, O> for FoldAggregator<P, O, F>
where
    F: Fn(Vec<P>) -> Result<O> + Send + Sync,
{
    fn combine(&self, partials: Vec<P>) -> Result<O> {
        (self.fold)(partials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch_of(values: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap()
    }

    #[test]
    fn concat_batches_restores_row_order() {
        let merged = ConcatBatches
            .combine(vec![batch_of(vec![0, 1]), batch_of(vec![2, 3, 4])])
            .unwrap();
        assert_eq!(merged.num_rows(), 5);
        let ids = merged
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(&ids.values()[..], &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn concat_batches_rejects_empty_input() {
        let err = ConcatBatches.combine(vec![]).unwrap_err();
        assert!(matches!(err, PrismError::Aggregation { .. }));
    }

    #[test]
    fn sum_vectors_accumulates_elementwise() {
        let total = SumVectors
            .combine(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]])
            .unwrap();
        assert_eq!(total, vec![9.0, 12.0]);
    }

    #[test]
    fn sum_vectors_rejects_shape_change() {
        let err = SumVectors
            .combine(vec![vec![1.0, 2.0], vec![3.0]])
            .unwrap_err();
        assert!(matches!(err, PrismError::Aggregation { .. }));
    }

    #[test]
    fn sum_vectors_rejects_empty_input() {
        let err = SumVectors.combine(vec![]).unwrap_err();
        assert!(matches!(err, PrismError::Aggregation { .. }));
    }

    #[test]
    fn fold_aggregator_runs_the_closure() {
        let max = FoldAggregator::new(|partials: Vec<u64>| {
            partials
                .into_iter()
                .max()
                .ok_or_else(|| PrismError::aggregation("no partials"))
        });
        assert_eq!(max.combine(vec![3, 9, 4]).unwrap(), 9);
    }
}
