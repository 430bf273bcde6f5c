//! Fused execution of an [`AggregationPlan`].
//!
//! [`FusedEngine`] runs every distinct base reduction of its plan once,
//! derives mean, variance and standard deviation from those shared results,
//! and concatenates the per-kind blocks in request order.
//!
//! # Stages
//!
//! 1. **Validation**: shape errors are raised before anything is reduced.
//! 2. **Group statistics**: clamped counts and/or the emptiness mask.
//! 3. **Base reducer**: one scatter pass per plan entry that owns a base
//!    reduction; min, max and product rows of empty groups are zeroed.
//! 4. **Derivation**: mean, then variance, then standard deviation. Each
//!    step may read the slot the previous one just wrote, so the order is
//!    fixed.
//! 5. **Assembly**: G x F blocks concatenated into G x (F * K).
//!
//! # Example
//!
//! ```
//! use fused_aggr::input::FeatureBatch;
//! use fused_aggr::kind::AggregationKind;
//! use fused_aggr::plan::FusedEngine;
//!
//! let engine = FusedEngine::new(&[AggregationKind::Sum, AggregationKind::Mean]).unwrap();
//!
//! // Group 0 = {[1, 2], [3, 4]}, group 1 is empty.
//! let data = [1.0_f64, 2.0, 3.0, 4.0];
//! let batch = FeatureBatch::new(&data, 2, 2).unwrap();
//! let out = engine.forward(&batch, &[0, 0], 2).unwrap();
//!
//! assert_eq!(out.row(0), &[4.0, 6.0, 2.0, 3.0]);
//! assert_eq!(out.row(1), &[0.0, 0.0, 0.0, 0.0]);
//! ```

use std::borrow::Cow;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::input::{validate_group_index, validate_output_size, FeatureBatch};
use crate::kernels::group_stats::{divide_rows, zero_empty_rows, GroupStatistics};
use crate::kernels::moments::{stddev_in_place, variance_in_place};
use crate::kernels::scatter::reduce_rows_with;
use crate::kind::{AggregationKind, BaseReduce};
use crate::output::GroupedOutput;
use crate::plan::builder::{AggregationPlan, PlanEntry, Reuse};
use crate::traits::FeatureElement;

/// Inputs with at least this many values (N * F) use the partitioned
/// scatter and run independent base passes concurrently.
pub const DEFAULT_MIN_PARALLEL_ELEMENTS: usize = 1 << 16;

/// Reusable fused aggregation engine.
///
/// Immutable after construction; a single engine can serve any number of
/// concurrent [`forward`](Self::forward) calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedEngine {
    plan: AggregationPlan,
    feature_width: Option<usize>,
    min_parallel_elements: usize,
}

/// Intermediate G x F results, one optional slot per request position.
type Slots<T> = Vec<Option<Vec<T>>>;

impl FusedEngine {
    /// Builds an engine for `kinds`, in output order.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyAggregationList` if `kinds` is empty.
    pub fn new(kinds: &[AggregationKind]) -> Result<Self> {
        Ok(Self::from_plan(AggregationPlan::build(kinds)?))
    }

    /// Builds an engine from aggregation names, see [`AggregationKind::resolve`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unresolvable, non-fusable or empty lists.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        Ok(Self::from_plan(AggregationPlan::from_names(names)?))
    }

    /// Wraps an already built plan.
    #[must_use]
    pub const fn from_plan(plan: AggregationPlan) -> Self {
        Self {
            plan,
            feature_width: None,
            min_parallel_elements: DEFAULT_MIN_PARALLEL_ELEMENTS,
        }
    }

    /// Pins the number of features every input must have.
    #[must_use]
    pub fn with_feature_width(mut self, width: usize) -> Self {
        self.feature_width = Some(width);
        self
    }

    /// Sets the input size (N * F) from which parallel execution is used.
    ///
    /// Default: [`DEFAULT_MIN_PARALLEL_ELEMENTS`]. Has no effect without the
    /// `parallel` feature.
    #[must_use]
    pub fn with_min_parallel_elements(mut self, threshold: usize) -> Self {
        self.min_parallel_elements = threshold;
        self
    }

    /// The plan this engine executes.
    #[must_use]
    pub const fn plan(&self) -> &AggregationPlan {
        &self.plan
    }

    /// The pinned feature width, if any.
    #[must_use]
    pub const fn feature_width(&self) -> Option<usize> {
        self.feature_width
    }

    /// Number of output columns for an input with `num_features` features,
    /// saturating at `usize::MAX`.
    #[must_use]
    pub fn output_width(&self, num_features: usize) -> usize {
        num_features.saturating_mul(self.plan.len())
    }

    /// Aggregates `features` into `group_count` groups.
    ///
    /// # Errors
    ///
    /// - Shape errors if `group_index` does not have one in-range entry per
    ///   element, the feature width differs from the pinned width, or the
    ///   output cannot be allocated
    /// - `Error::NumericConversion` if a group count does not fit in `T`
    pub fn forward<T: FeatureElement>(
        &self,
        features: &FeatureBatch<'_, T>,
        group_index: &[usize],
        group_count: usize,
    ) -> Result<GroupedOutput<T>> {
        self.validate(features, group_index, group_count)?;

        let ctx = PassContext {
            values: features.as_slice(),
            num_features: features.num_features(),
            group_index,
            group_count,
            parallel: features.as_slice().len() >= self.min_parallel_elements,
        };
        log::trace!(
            "fused forward: {} elements x {} features into {} groups x {} columns (parallel={})",
            features.num_elements(),
            ctx.num_features,
            group_count,
            self.output_width(ctx.num_features),
            ctx.parallel
        );

        let stats = GroupStatistics::compute(
            group_index,
            group_count,
            self.plan.need_degree(),
            self.plan.need_mask(),
        )?;
        if let Some(empty) = stats.empty_group_count() {
            log::trace!("{empty} of {group_count} groups are empty");
        }

        let mut slots = self.reduce_base(&ctx, &stats)?;
        self.derive(&ctx, &stats, &mut slots)?;
        self.assemble(&slots, group_count, ctx.num_features)
    }

    /// Aggregates one feature row per element.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotTwoDimensional` for ragged rows, otherwise as
    /// [`forward`](Self::forward).
    pub fn forward_rows<T: FeatureElement, R: AsRef<[T]>>(
        &self,
        rows: &[R],
        group_index: &[usize],
        group_count: usize,
    ) -> Result<GroupedOutput<T>> {
        let batch = FeatureBatch::from_rows(rows)?;
        self.forward(&batch, group_index, group_count)
    }

    fn validate<T: FeatureElement>(
        &self,
        features: &FeatureBatch<'_, T>,
        group_index: &[usize],
        group_count: usize,
    ) -> Result<()> {
        validate_group_index(group_index, features.num_elements(), group_count)?;
        validate_output_size::<T>(group_count, features.num_features(), self.plan.len())?;
        match self.feature_width {
            Some(expected) if expected != features.num_features() => {
                Err(Error::FeatureWidthMismatch {
                    expected,
                    actual: features.num_features(),
                })
            }
            _ => Ok(()),
        }
    }

    fn entry(&self, position: usize, kind: AggregationKind) -> Result<&PlanEntry> {
        self.plan
            .entry(position)
            .filter(|e| e.kind == kind)
            .ok_or_else(|| unsupported(kind, "plan position does not hold this kind"))
    }

    /// Runs every base pass once and masks empty rows of min, max and product.
    fn reduce_base<T: FeatureElement>(
        &self,
        ctx: &PassContext<'_, T>,
        stats: &GroupStatistics<T>,
    ) -> Result<Slots<T>> {
        let passes: Vec<(usize, BaseReduce)> = self.plan.base_passes().collect();
        let mut slots: Slots<T> = vec![None; self.plan.len()];

        for (position, base, mut out) in run_passes(ctx, &passes) {
            if base.needs_empty_mask() {
                let kind = self.plan.entries()[position].kind;
                let empty = stats
                    .empty_mask()
                    .ok_or_else(|| unsupported(kind, "empty mask was not computed"))?;
                zero_empty_rows(&mut out, empty, ctx.num_features);
            }
            slots[position] = Some(out);
        }
        Ok(slots)
    }

    /// Mean, then variance, then standard deviation.
    fn derive<T: FeatureElement>(
        &self,
        ctx: &PassContext<'_, T>,
        stats: &GroupStatistics<T>,
        slots: &mut Slots<T>,
    ) -> Result<()> {
        let f = ctx.num_features;

        if let Some(i) = self.plan.position_of(AggregationKind::Mean) {
            let kind = AggregationKind::Mean;
            let counts = counts_of(stats, kind)?;
            let mut mean = match self.entry(i, kind)?.reuse {
                None => take_slot(slots, i, kind)?,
                Some(Reuse {
                    kind: AggregationKind::Sum,
                    position,
                }) => read_slot(slots, position, kind)?.to_vec(),
                Some(_) => return Err(unsupported(kind, "mean can only reuse a sum slot")),
            };
            divide_rows(&mut mean, counts, f);
            log::trace!("derived mean at position {i}");
            slots[i] = Some(mean);
        }

        if let Some(i) = self.plan.position_of(AggregationKind::Variance) {
            let kind = AggregationKind::Variance;
            let counts = counts_of(stats, kind)?;
            let reuse = self.entry(i, kind)?.reuse;
            let mut pow_sum = take_slot(slots, i, kind)?;
            {
                let mean = mean_for(ctx, kind, reuse, slots, counts)?;
                variance_in_place(&mut pow_sum, &mean, counts, f);
            }
            log::trace!("derived variance at position {i}");
            slots[i] = Some(pow_sum);
        }

        if let Some(i) = self.plan.position_of(AggregationKind::StdDev) {
            let kind = AggregationKind::StdDev;
            let counts = counts_of(stats, kind)?;
            let mut variance = match self.entry(i, kind)?.reuse {
                Some(Reuse {
                    kind: AggregationKind::Variance,
                    position,
                }) => read_slot(slots, position, kind)?.to_vec(),
                reuse => {
                    let mut pow_sum = take_slot(slots, i, kind)?;
                    {
                        let mean = mean_for(ctx, kind, reuse, slots, counts)?;
                        variance_in_place(&mut pow_sum, &mean, counts, f);
                    }
                    pow_sum
                }
            };
            stddev_in_place(&mut variance, T::stddev_epsilon()?);
            let empty = stats
                .empty_mask()
                .ok_or_else(|| unsupported(kind, "empty mask was not computed"))?;
            zero_empty_rows(&mut variance, empty, f);
            log::trace!("derived stddev at position {i}");
            slots[i] = Some(variance);
        }

        Ok(())
    }

    fn assemble<T: FeatureElement>(
        &self,
        slots: &[Option<Vec<T>>],
        group_count: usize,
        num_features: usize,
    ) -> Result<GroupedOutput<T>> {
        let blocks = self
            .plan
            .entries()
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let source = entry.duplicate_of.unwrap_or(position);
                read_slot(slots, source, entry.kind)
            })
            .collect::<Result<Vec<&[T]>>>()?;
        Ok(GroupedOutput::from_blocks(
            self.plan.kinds().collect(),
            &blocks,
            group_count,
            num_features,
        ))
    }
}

/// Borrowed inputs of one invocation.
struct PassContext<'a, T> {
    values: &'a [T],
    num_features: usize,
    group_index: &'a [usize],
    group_count: usize,
    parallel: bool,
}

impl<T: FeatureElement> PassContext<'_, T> {
    fn reduce(&self, base: BaseReduce) -> Vec<T> {
        log::trace!("base pass {base:?}");
        reduce_rows_with(
            self.values,
            self.num_features,
            self.group_index,
            self.group_count,
            base.op(),
            base.transform(),
            base.fill_value(),
            self.parallel,
        )
    }
}

#[cfg(feature = "parallel")]
fn run_passes<T: FeatureElement>(
    ctx: &PassContext<'_, T>,
    passes: &[(usize, BaseReduce)],
) -> Vec<(usize, BaseReduce, Vec<T>)> {
    if ctx.parallel && passes.len() > 1 {
        passes
            .par_iter()
            .map(|&(position, base)| (position, base, ctx.reduce(base)))
            .collect()
    } else {
        passes
            .iter()
            .map(|&(position, base)| (position, base, ctx.reduce(base)))
            .collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn run_passes<T: FeatureElement>(
    ctx: &PassContext<'_, T>,
    passes: &[(usize, BaseReduce)],
) -> Vec<(usize, BaseReduce, Vec<T>)> {
    passes
        .iter()
        .map(|&(position, base)| (position, base, ctx.reduce(base)))
        .collect()
}

/// The per-group mean a second-moment kind subtracts, from the slot its plan
/// entry names or from a fresh sum pass when it names none.
fn mean_for<'s, T: FeatureElement>(
    ctx: &PassContext<'_, T>,
    kind: AggregationKind,
    reuse: Option<Reuse>,
    slots: &'s [Option<Vec<T>>],
    counts: &[T],
) -> Result<Cow<'s, [T]>> {
    match reuse {
        None => {
            let mut sum = ctx.reduce(BaseReduce::Sum);
            divide_rows(&mut sum, counts, ctx.num_features);
            Ok(Cow::Owned(sum))
        }
        Some(Reuse {
            kind: AggregationKind::Mean,
            position,
        }) => Ok(Cow::Borrowed(read_slot(slots, position, kind)?)),
        Some(Reuse {
            kind: AggregationKind::Sum,
            position,
        }) => {
            let mut mean = read_slot(slots, position, kind)?.to_vec();
            divide_rows(&mut mean, counts, ctx.num_features);
            Ok(Cow::Owned(mean))
        }
        Some(_) => Err(unsupported(kind, "mean source must be a sum or mean slot")),
    }
}

fn counts_of<T: FeatureElement>(stats: &GroupStatistics<T>, kind: AggregationKind) -> Result<&[T]> {
    stats
        .clamped_counts()
        .ok_or_else(|| unsupported(kind, "group counts were not computed"))
}

fn take_slot<T>(slots: &mut [Option<Vec<T>>], position: usize, kind: AggregationKind) -> Result<Vec<T>> {
    slots
        .get_mut(position)
        .and_then(Option::take)
        .ok_or_else(|| unsupported(kind, "expected base result is missing"))
}

fn read_slot<T>(slots: &[Option<Vec<T>>], position: usize, kind: AggregationKind) -> Result<&[T]> {
    slots
        .get(position)
        .and_then(Option::as_deref)
        .ok_or_else(|| unsupported(kind, "reused slot is empty"))
}

const fn unsupported(kind: AggregationKind, reason: &'static str) -> Error {
    Error::UnsupportedPlan {
        kind: kind.name(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AggregationKind::{Max, Mean, Min, Product, StdDev, Sum, Variance};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sum_mean_with_empty_group() {
        let engine = FusedEngine::new(&[Sum, Mean]).unwrap();
        let out = engine
            .forward_rows(&[vec![1.0_f64, 2.0], vec![3.0, 4.0]], &[0, 0], 2)
            .unwrap();
        assert_eq!(out.row(0), &[4.0, 6.0, 2.0, 3.0]);
        assert_eq!(out.row(1), &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_min_max_product() {
        let engine = FusedEngine::new(&[Min, Max, Product]).unwrap();
        let out = engine
            .forward_rows(&[[2.0_f64], [5.0], [3.0]], &[0, 0, 0], 1)
            .unwrap();
        assert_eq!(out.row(0), &[2.0, 5.0, 30.0]);
    }

    #[test]
    fn test_masked_kinds_zero_empty_groups() {
        let engine = FusedEngine::new(&[Min, Max, Product]).unwrap();
        let out = engine.forward_rows(&[[-2.0_f64]], &[1], 3).unwrap();
        assert_eq!(out.row(0), &[0.0, 0.0, 0.0]);
        assert_eq!(out.row(1), &[-2.0, -2.0, -2.0]);
        assert_eq!(out.row(2), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_variance_stddev() {
        let engine = FusedEngine::new(&[Variance, StdDev]).unwrap();
        let out = engine
            .forward_rows(&[[1.0_f64], [2.0], [3.0]], &[0, 0, 0], 1)
            .unwrap();
        assert!(approx(out.row(0)[0], 2.0 / 3.0));
        assert!(approx(out.row(0)[1], (2.0_f64 / 3.0 + 1e-5).sqrt()));
    }

    #[test]
    fn test_stddev_empty_group_is_zero() {
        let engine = FusedEngine::new(&[StdDev]).unwrap();
        let out = engine.forward_rows(&[[1.0_f64], [3.0]], &[0, 0], 2).unwrap();
        assert!(approx(out.row(0)[0], (1.0_f64 + 1e-5).sqrt()));
        assert_eq!(out.row(1), &[0.0]);
    }

    #[test]
    fn test_every_reuse_path_agrees() {
        let rows = [[1.0_f64, -2.0], [4.0, 0.5], [2.5, 3.0], [-1.0, 7.0]];
        let index = [0, 1, 0, 0];
        let reference = FusedEngine::new(&[StdDev, Variance])
            .unwrap()
            .forward_rows(&rows, &index, 3)
            .unwrap();
        let expected_std = reference.block(0).unwrap();
        let expected_var = reference.block(1).unwrap();

        for kinds in [
            vec![StdDev],
            vec![Sum, StdDev],
            vec![Mean, StdDev],
            vec![Sum, Mean, StdDev],
            vec![Variance, StdDev, Mean],
        ] {
            let out = FusedEngine::new(&kinds)
                .unwrap()
                .forward_rows(&rows, &index, 3)
                .unwrap();
            let std = out.block_of(StdDev).unwrap();
            for (a, b) in std.iter().zip(&expected_std) {
                assert!(approx(*a, *b), "{kinds:?}: {a} vs {b}");
            }
        }

        for kinds in [vec![Variance], vec![Sum, Variance], vec![Variance, Mean]] {
            let out = FusedEngine::new(&kinds)
                .unwrap()
                .forward_rows(&rows, &index, 3)
                .unwrap();
            let var = out.block_of(Variance).unwrap();
            for (a, b) in var.iter().zip(&expected_var) {
                assert!(approx(*a, *b), "{kinds:?}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_duplicate_kinds_repeat_block() {
        let engine = FusedEngine::new(&[Mean, Max, Mean]).unwrap();
        let out = engine
            .forward_rows(&[[2.0_f64], [4.0]], &[0, 0], 1)
            .unwrap();
        assert_eq!(out.row(0), &[3.0, 4.0, 3.0]);
    }

    #[test]
    fn test_shape_errors_before_reduction() {
        let engine = FusedEngine::new(&[Sum]).unwrap().with_feature_width(2);
        let data = [1.0_f64, 2.0, 3.0];

        let batch = FeatureBatch::new(&data, 3, 1).unwrap();
        assert!(matches!(
            engine.forward(&batch, &[0, 0, 0], 1),
            Err(Error::FeatureWidthMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            engine.forward(&batch, &[0, 0], 1),
            Err(Error::IndexLengthMismatch { .. })
        ));
        assert!(matches!(
            engine.forward(&batch, &[0, 1, 0], 1),
            Err(Error::GroupIndexOutOfRange { position: 1, .. })
        ));
    }

    #[test]
    fn test_min_max_propagate_nan() {
        // Group 0 holds only NaN, group 1 mixes 1.0 with NaN.
        let rows = [[f64::NAN], [f64::NAN], [1.0], [f64::NAN]];
        let index = [0, 0, 1, 1];
        for threshold in [usize::MAX, 0] {
            let out = FusedEngine::new(&[Min, Max, Sum])
                .unwrap()
                .with_min_parallel_elements(threshold)
                .forward_rows(&rows, &index, 2)
                .unwrap();
            for g in 0..2 {
                assert!(out.row(g).iter().all(|v| v.is_nan()), "group {g}: {:?}", out.row(g));
            }
        }
    }

    #[test]
    fn test_huge_group_count_is_a_shape_error() {
        let engine = FusedEngine::new(&[Sum, Mean, StdDev]).unwrap();
        let data: [f64; 0] = [];
        let batch = FeatureBatch::new(&data, 0, 4).unwrap();

        let err = engine.forward(&batch, &[], usize::MAX / 8).unwrap_err();
        assert_eq!(
            err,
            Error::OutputTooLarge {
                group_count: usize::MAX / 8,
                num_features: 4,
                num_blocks: 3
            }
        );
        assert!(engine.forward(&batch, &[], usize::MAX).unwrap_err().is_shape());
    }

    #[test]
    fn test_output_width() {
        let engine = FusedEngine::new(&[Sum, Mean, Sum]).unwrap();
        assert_eq!(engine.output_width(4), 12);
        assert_eq!(engine.output_width(usize::MAX), usize::MAX);
        let out = engine.forward_rows(&[[1.0_f64, 2.0]], &[0], 1).unwrap();
        assert_eq!(out.width(), engine.output_width(2));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let engine = FusedEngine::new(&[Sum]).unwrap();
        let err = engine
            .forward_rows(&[vec![1.0_f64, 2.0], vec![3.0]], &[0, 0], 1)
            .unwrap_err();
        assert!(matches!(err, Error::NotTwoDimensional { .. }));
    }

    #[test]
    fn test_corrupted_reuse_chain_is_unsupported() {
        let mut plan = AggregationPlan::build(&[Sum, Mean]).unwrap();
        plan.entries_mut()[1].reuse = Some(Reuse {
            kind: Max,
            position: 0,
        });
        let engine = FusedEngine::from_plan(plan);
        let err = engine.forward_rows(&[[1.0_f64]], &[0], 1).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPlan { kind: "mean", .. }));
    }

    #[test]
    fn test_zero_groups_and_elements() {
        let engine = FusedEngine::new(&[Sum, Min, StdDev]).unwrap();
        let data: [f64; 0] = [];
        let batch = FeatureBatch::new(&data, 0, 4).unwrap();
        let out = engine.forward(&batch, &[], 0).unwrap();
        assert_eq!(out.num_groups(), 0);
        assert_eq!(out.width(), 12);
    }

    #[test]
    fn test_forced_parallel_matches_sequential() {
        let rows: Vec<[f64; 2]> = (0..500_u32)
            .map(|i| [f64::from(i % 13) - 6.0, f64::from(i % 7)])
            .collect();
        let index: Vec<usize> = (0..500).map(|i| (i * 3) % 17).collect();
        let kinds = [Sum, Mean, Min, Max, Variance, StdDev];

        let seq = FusedEngine::new(&kinds)
            .unwrap()
            .with_min_parallel_elements(usize::MAX)
            .forward_rows(&rows, &index, 20)
            .unwrap();
        let par = FusedEngine::new(&kinds)
            .unwrap()
            .with_min_parallel_elements(0)
            .forward_rows(&rows, &index, 20)
            .unwrap();

        for (a, b) in seq.as_slice().iter().zip(par.as_slice()) {
            assert!(approx(*a, *b), "{a} vs {b}");
        }
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FusedEngine>();
    }
}
