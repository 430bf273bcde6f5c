//! Direct mode aggregation.
//!
//! Computes every requested kind on its own, with no sharing of base passes
//! or group statistics between kinds. It is the baseline the fused engine is
//! compared against, in tests and in the `fusion` benchmark.
//!
//! # Overview
//!
//! - Each kind runs its own scatter passes and its own count scan
//! - Duplicate kinds are computed again
//! - Results match [`FusedEngine`](super::FusedEngine) up to floating-point
//!   summation order
//!
//! # Example
//!
//! ```
//! use fused_aggr::input::FeatureBatch;
//! use fused_aggr::kind::AggregationKind;
//! use fused_aggr::plan::DirectExecutor;
//!
//! let data = [2.0_f64, 5.0, 3.0];
//! let batch = FeatureBatch::new(&data, 3, 1).unwrap();
//!
//! let executor = DirectExecutor::new();
//! let max = executor
//!     .aggregate(AggregationKind::Max, &batch, &[0, 0, 0], 1)
//!     .unwrap();
//! assert_eq!(max, vec![5.0]);
//! ```

use crate::error::{Error, Result};
use crate::input::{validate_group_index, validate_output_size, FeatureBatch};
use crate::kernels::group_stats::{counts_and_mask, divide_rows, zero_empty_rows};
use crate::kernels::moments::{stddev_in_place, variance_in_place};
use crate::kernels::scatter::reduce_rows;
use crate::kind::{AggregationKind, BaseReduce};
use crate::output::GroupedOutput;
use crate::traits::FeatureElement;

/// Executor computing each aggregation independently.
///
/// Stateless: every call recomputes from its arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectExecutor;

impl DirectExecutor {
    /// Creates a new direct executor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes one aggregation as a G x F row-major matrix.
    ///
    /// # Errors
    ///
    /// Returns a shape error if `group_index` does not have one in-range
    /// entry per element or the result cannot be allocated, or
    /// `Error::NumericConversion` if a group count does not fit in `T`.
    pub fn aggregate<T: FeatureElement>(
        &self,
        kind: AggregationKind,
        features: &FeatureBatch<'_, T>,
        group_index: &[usize],
        group_count: usize,
    ) -> Result<Vec<T>> {
        validate_group_index(group_index, features.num_elements(), group_count)?;
        validate_output_size::<T>(group_count, features.num_features(), 1)?;
        self.compute_single(kind, features, group_index, group_count)
    }

    /// Computes every kind in `kinds` and concatenates the blocks in order.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyAggregationList` for an empty `kinds`, otherwise
    /// as [`aggregate`](Self::aggregate).
    pub fn execute<T: FeatureElement>(
        &self,
        kinds: &[AggregationKind],
        features: &FeatureBatch<'_, T>,
        group_index: &[usize],
        group_count: usize,
    ) -> Result<GroupedOutput<T>> {
        if kinds.is_empty() {
            return Err(Error::EmptyAggregationList);
        }
        validate_group_index(group_index, features.num_elements(), group_count)?;
        validate_output_size::<T>(group_count, features.num_features(), kinds.len())?;

        let mut blocks = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            blocks.push(self.compute_single(kind, features, group_index, group_count)?);
        }
        let views: Vec<&[T]> = blocks.iter().map(Vec::as_slice).collect();

        Ok(GroupedOutput::from_blocks(
            kinds.to_vec(),
            &views,
            group_count,
            features.num_features(),
        ))
    }

    fn compute_single<T: FeatureElement>(
        &self,
        kind: AggregationKind,
        features: &FeatureBatch<'_, T>,
        group_index: &[usize],
        group_count: usize,
    ) -> Result<Vec<T>> {
        let f = features.num_features();
        let pass = |base: BaseReduce| {
            reduce_rows(
                features.as_slice(),
                f,
                group_index,
                group_count,
                base.op(),
                base.transform(),
                base.fill_value(),
            )
        };

        match kind {
            AggregationKind::Sum => Ok(pass(BaseReduce::Sum)),
            AggregationKind::Min | AggregationKind::Max | AggregationKind::Product => {
                let mut out = pass(kind.base_reduce());
                let (_, empty) = counts_and_mask::<T>(group_index, group_count)?;
                zero_empty_rows(&mut out, &empty, f);
                Ok(out)
            }
            AggregationKind::Mean => {
                let (counts, _) = counts_and_mask(group_index, group_count)?;
                let mut mean = pass(BaseReduce::Sum);
                divide_rows(&mut mean, &counts, f);
                Ok(mean)
            }
            AggregationKind::Variance => {
                let (counts, _) = counts_and_mask(group_index, group_count)?;
                let mut mean = pass(BaseReduce::Sum);
                divide_rows(&mut mean, &counts, f);
                let mut var = pass(BaseReduce::PowSum);
                variance_in_place(&mut var, &mean, &counts, f);
                Ok(var)
            }
            AggregationKind::StdDev => {
                let (counts, empty) = counts_and_mask(group_index, group_count)?;
                let mut mean = pass(BaseReduce::Sum);
                divide_rows(&mut mean, &counts, f);
                let mut std = pass(BaseReduce::PowSum);
                variance_in_place(&mut std, &mean, &counts, f);
                stddev_in_place(&mut std, T::stddev_epsilon()?);
                zero_empty_rows(&mut std, &empty, f);
                Ok(std)
            }
        }
    }
}
