//! Grouped-reduce (scatter) primitive.
//!
//! Reduces an N x F row-major feature matrix into a G x F matrix, combining
//! every element row into the output row selected by its group index:
//!
//! ```text
//! out[g][j] = op( transform(x[i][j]) for every i with index[i] == g )
//! out[g][j] = fill                    if no i has index[i] == g
//! ```
//!
//! All four operators are associative and commutative, so the rows can be
//! partitioned into chunks, reduced independently into partial outputs that
//! start from the operator's identity, and merged. With the `parallel`
//! feature enabled [`scatter_reduce_par`] does exactly that on the rayon
//! thread pool.
//!
//! # Example
//!
//! ```
//! use fused_aggr::input::FeatureBatch;
//! use fused_aggr::kernels::scatter::{scatter_reduce, ElementTransform, ReduceOp};
//!
//! // Three elements with two features, grouped as {0, 2} and {1}.
//! let data = [1.0_f64, 2.0, 10.0, 20.0, 3.0, 4.0];
//! let batch = FeatureBatch::new(&data, 3, 2).unwrap();
//!
//! let out = scatter_reduce(&batch, &[0, 1, 0], 3, ReduceOp::Add, ElementTransform::Identity, 0.0)
//!     .unwrap();
//! assert_eq!(out, vec![4.0, 6.0, 10.0, 20.0, 0.0, 0.0]);
//! ```

use num_traits::Float;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::Result;
use crate::input::{validate_group_index, validate_output_size, FeatureBatch};
use crate::traits::FeatureElement;

/// Binary reduction operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Addition, identity `0`.
    Add,
    /// Elementwise minimum, identity `+inf`.
    Min,
    /// Elementwise maximum, identity `-inf`.
    Max,
    /// Multiplication, identity `1`.
    Mul,
}

impl ReduceOp {
    /// The identity element of the operator.
    #[inline]
    #[must_use]
    pub fn identity<T: FeatureElement>(self) -> T {
        match self {
            Self::Add => T::zero(),
            Self::Min => T::infinity(),
            Self::Max => T::neg_infinity(),
            Self::Mul => T::one(),
        }
    }

    /// Combines an accumulator with a new value.
    ///
    /// Every operator propagates NaN: once either operand is NaN the
    /// result is NaN, for `Min` and `Max` as for `Add` and `Mul`.
    #[inline]
    #[must_use]
    pub fn combine<T: FeatureElement>(self, acc: T, value: T) -> T {
        match self {
            Self::Add => acc + value,
            Self::Min | Self::Max if acc.is_nan() || value.is_nan() => T::nan(),
            Self::Min => acc.min(value),
            Self::Max => acc.max(value),
            Self::Mul => acc * value,
        }
    }
}

/// Per-element transform applied before reducing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementTransform {
    /// Use the element as is.
    Identity,
    /// Square the element.
    Square,
}

impl ElementTransform {
    /// Applies the transform.
    #[inline]
    #[must_use]
    pub fn apply<T: Float>(self, value: T) -> T {
        match self {
            Self::Identity => value,
            Self::Square => value * value,
        }
    }
}

/// Reduces `batch` into `group_count` rows.
///
/// # Errors
///
/// Returns a shape error if `group_index` does not have one in-range entry
/// per element, or the G x F result cannot be allocated.
pub fn scatter_reduce<T: FeatureElement>(
    batch: &FeatureBatch<'_, T>,
    group_index: &[usize],
    group_count: usize,
    op: ReduceOp,
    transform: ElementTransform,
    fill: T,
) -> Result<Vec<T>> {
    validate_group_index(group_index, batch.num_elements(), group_count)?;
    validate_output_size::<T>(group_count, batch.num_features(), 1)?;
    Ok(reduce_rows(
        batch.as_slice(),
        batch.num_features(),
        group_index,
        group_count,
        op,
        transform,
        fill,
    ))
}

/// Partitioned variant of [`scatter_reduce`] running on the rayon pool.
///
/// # Errors
///
/// Same as [`scatter_reduce`].
#[cfg(feature = "parallel")]
pub fn scatter_reduce_par<T: FeatureElement>(
    batch: &FeatureBatch<'_, T>,
    group_index: &[usize],
    group_count: usize,
    op: ReduceOp,
    transform: ElementTransform,
    fill: T,
) -> Result<Vec<T>> {
    validate_group_index(group_index, batch.num_elements(), group_count)?;
    validate_output_size::<T>(group_count, batch.num_features(), 1)?;
    Ok(reduce_rows_par(
        batch.as_slice(),
        batch.num_features(),
        group_index,
        group_count,
        op,
        transform,
        fill,
    ))
}

/// Sequential reduction over pre-validated inputs.
pub(crate) fn reduce_rows<T: FeatureElement>(
    values: &[T],
    num_features: usize,
    group_index: &[usize],
    group_count: usize,
    op: ReduceOp,
    transform: ElementTransform,
    fill: T,
) -> Vec<T> {
    let (mut out, seen) = accumulate(values, num_features, group_index, group_count, op, transform);
    apply_fill(&mut out, &seen, num_features, op, fill);
    out
}

/// Chooses the partitioned reduction when `parallel` is set.
#[cfg(feature = "parallel")]
#[allow(clippy::too_many_arguments)]
pub(crate) fn reduce_rows_with<T: FeatureElement>(
    values: &[T],
    num_features: usize,
    group_index: &[usize],
    group_count: usize,
    op: ReduceOp,
    transform: ElementTransform,
    fill: T,
    parallel: bool,
) -> Vec<T> {
    if parallel {
        reduce_rows_par(values, num_features, group_index, group_count, op, transform, fill)
    } else {
        reduce_rows(values, num_features, group_index, group_count, op, transform, fill)
    }
}

/// Sequential version when the parallel feature is disabled.
#[cfg(not(feature = "parallel"))]
#[allow(clippy::too_many_arguments)]
pub(crate) fn reduce_rows_with<T: FeatureElement>(
    values: &[T],
    num_features: usize,
    group_index: &[usize],
    group_count: usize,
    op: ReduceOp,
    transform: ElementTransform,
    fill: T,
    _parallel: bool,
) -> Vec<T> {
    reduce_rows(values, num_features, group_index, group_count, op, transform, fill)
}

#[cfg(feature = "parallel")]
fn reduce_rows_par<T: FeatureElement>(
    values: &[T],
    num_features: usize,
    group_index: &[usize],
    group_count: usize,
    op: ReduceOp,
    transform: ElementTransform,
    fill: T,
) -> Vec<T> {
    let num_elements = group_index.len();
    let chunk_rows = num_elements.div_ceil(rayon::current_num_threads()).max(1);
    let num_chunks = num_elements.div_ceil(chunk_rows);

    log::trace!(
        "partitioned scatter {op:?}: {num_elements} rows in {num_chunks} chunks of {chunk_rows}"
    );

    let (mut out, seen) = (0..num_chunks)
        .into_par_iter()
        .map(|chunk| {
            let start = chunk * chunk_rows;
            let end = (start + chunk_rows).min(num_elements);
            accumulate(
                &values[start * num_features..end * num_features],
                num_features,
                &group_index[start..end],
                group_count,
                op,
                transform,
            )
        })
        .reduce(
            || (vec![op.identity(); group_count * num_features], vec![false; group_count]),
            |(mut acc, mut acc_seen), (part, part_seen)| {
                for (a, p) in acc.iter_mut().zip(part) {
                    *a = op.combine(*a, p);
                }
                for (a, p) in acc_seen.iter_mut().zip(part_seen) {
                    *a |= p;
                }
                (acc, acc_seen)
            },
        );

    apply_fill(&mut out, &seen, num_features, op, fill);
    out
}

/// Folds rows into identity-initialised group rows, recording which groups
/// were referenced.
fn accumulate<T: FeatureElement>(
    values: &[T],
    num_features: usize,
    group_index: &[usize],
    group_count: usize,
    op: ReduceOp,
    transform: ElementTransform,
) -> (Vec<T>, Vec<bool>) {
    let mut out = vec![op.identity(); group_count * num_features];
    let mut seen = vec![false; group_count];

    for (row, &group) in group_index.iter().enumerate() {
        seen[group] = true;
        let src_start = row * num_features;
        let src = &values[src_start..src_start + num_features];
        let dst = &mut out[group * num_features..(group + 1) * num_features];
        for (acc, &x) in dst.iter_mut().zip(src) {
            *acc = op.combine(*acc, transform.apply(x));
        }
    }

    (out, seen)
}

fn apply_fill<T: FeatureElement>(out: &mut [T], seen: &[bool], num_features: usize, op: ReduceOp, fill: T) {
    if fill == op.identity::<T>() {
        return;
    }
    for (group, &referenced) in seen.iter().enumerate() {
        if !referenced {
            out[group * num_features..(group + 1) * num_features].fill(fill);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn batch(data: &[f64], features: usize) -> FeatureBatch<'_, f64> {
        FeatureBatch::new(data, data.len() / features, features).unwrap()
    }

    #[test]
    fn test_identity_values() {
        assert_eq!(ReduceOp::Add.identity::<f64>(), 0.0);
        assert_eq!(ReduceOp::Min.identity::<f64>(), f64::INFINITY);
        assert_eq!(ReduceOp::Max.identity::<f64>(), f64::NEG_INFINITY);
        assert_eq!(ReduceOp::Mul.identity::<f32>(), 1.0);
    }

    #[test]
    fn test_combine_propagates_nan() {
        for op in [ReduceOp::Add, ReduceOp::Min, ReduceOp::Max, ReduceOp::Mul] {
            assert!(op.combine(f64::NAN, 3.0).is_nan(), "{op:?}");
            assert!(op.combine(2.0, f64::NAN).is_nan(), "{op:?}");
            assert!(op.combine(op.identity(), f64::NAN).is_nan(), "{op:?}");
        }
        assert_eq!(ReduceOp::Min.combine(2.0, 3.0), 2.0);
        assert_eq!(ReduceOp::Max.combine(2.0, 3.0), 3.0);
    }

    #[test]
    fn test_scatter_min_max_nan_groups() {
        // Group 0 holds only NaN, group 1 mixes 1.0 with NaN, group 2 is clean.
        let data = [f64::NAN, f64::NAN, 1.0, f64::NAN, 4.0, -2.0];
        let index = [0, 0, 1, 1, 2, 2];
        for op in [ReduceOp::Min, ReduceOp::Max] {
            let out = scatter_reduce(
                &batch(&data, 1),
                &index,
                3,
                op,
                ElementTransform::Identity,
                op.identity(),
            )
            .unwrap();
            assert!(out[0].is_nan(), "{op:?}: {out:?}");
            assert!(out[1].is_nan(), "{op:?}: {out:?}");
            let expected = if op == ReduceOp::Min { -2.0 } else { 4.0 };
            assert_eq!(out[2], expected, "{op:?}");
        }
    }

    #[test]
    fn test_square_transform() {
        assert_eq!(ElementTransform::Square.apply(-3.0_f64), 9.0);
        assert_eq!(ElementTransform::Identity.apply(-3.0_f64), -3.0);
    }

    #[test]
    fn test_scatter_sum_with_empty_group() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let out = scatter_reduce(
            &batch(&data, 2),
            &[0, 0],
            2,
            ReduceOp::Add,
            ElementTransform::Identity,
            0.0,
        )
        .unwrap();
        assert_eq!(out, vec![4.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn test_scatter_min_keeps_identity_fill() {
        let data = [2.0, 5.0, 3.0];
        let out = scatter_reduce(
            &batch(&data, 1),
            &[1, 1, 1],
            2,
            ReduceOp::Min,
            ElementTransform::Identity,
            f64::INFINITY,
        )
        .unwrap();
        assert_eq!(out, vec![f64::INFINITY, 2.0]);
    }

    #[test]
    fn test_scatter_custom_fill_only_touches_unreferenced_groups() {
        let data = [2.0, 5.0, 3.0];
        let out = scatter_reduce(
            &batch(&data, 1),
            &[0, 2, 0],
            3,
            ReduceOp::Mul,
            ElementTransform::Identity,
            -7.0,
        )
        .unwrap();
        assert_eq!(out, vec![6.0, -7.0, 5.0]);
    }

    #[test]
    fn test_scatter_pow_sum() {
        let data = [1.0, 2.0, 3.0];
        let out = scatter_reduce(
            &batch(&data, 1),
            &[0, 0, 0],
            1,
            ReduceOp::Add,
            ElementTransform::Square,
            0.0,
        )
        .unwrap();
        assert_eq!(out, vec![14.0]);
    }

    #[test]
    fn test_scatter_zero_features() {
        let data: [f64; 0] = [];
        let features = FeatureBatch::new(&data, 3, 0).unwrap();
        let out = scatter_reduce(
            &features,
            &[0, 1, 1],
            2,
            ReduceOp::Max,
            ElementTransform::Identity,
            f64::NEG_INFINITY,
        )
        .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_scatter_rejects_unallocatable_output() {
        let data: [f64; 0] = [];
        let features = FeatureBatch::new(&data, 0, 3).unwrap();
        let err = scatter_reduce(
            &features,
            &[],
            usize::MAX / 2,
            ReduceOp::Add,
            ElementTransform::Identity,
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, Error::OutputTooLarge { num_blocks: 1, .. }));
    }

    #[test]
    fn test_scatter_rejects_out_of_range_index() {
        let data = [1.0, 2.0];
        let result = scatter_reduce(
            &batch(&data, 1),
            &[0, 2],
            2,
            ReduceOp::Add,
            ElementTransform::Identity,
            0.0,
        );
        assert!(result.unwrap_err().is_shape());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_partitioned_matches_sequential() {
        let rows = 1_000;
        let features = 3;
        let data: Vec<f64> = (0..rows * features).map(|i| ((i % 17) as f64) - 8.0).collect();
        let index: Vec<usize> = (0..rows).map(|i| (i * 7) % 11).collect();
        let features_batch = FeatureBatch::new(&data, rows, features).unwrap();

        for op in [ReduceOp::Add, ReduceOp::Min, ReduceOp::Max] {
            let seq = scatter_reduce(
                &features_batch,
                &index,
                13,
                op,
                ElementTransform::Identity,
                op.identity(),
            )
            .unwrap();
            let par = scatter_reduce_par(
                &features_batch,
                &index,
                13,
                op,
                ElementTransform::Identity,
                op.identity(),
            )
            .unwrap();
            // Integer-valued sums are exact in any order.
            assert_eq!(seq, par, "{op:?}");
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_partitioned_min_max_nan_groups() {
        // NaN sits in different chunks than the numbers it shares a group with.
        let rows = 1_000;
        let mut data: Vec<f64> = (0..rows).map(|i| (i % 23) as f64).collect();
        let index: Vec<usize> = (0..rows).map(|i| i % 3).collect();
        for (i, value) in data.iter_mut().enumerate() {
            if i % 3 == 0 || i == 997 {
                *value = f64::NAN;
            }
        }
        let features = FeatureBatch::new(&data, rows, 1).unwrap();

        for op in [ReduceOp::Min, ReduceOp::Max] {
            let par = scatter_reduce_par(
                &features,
                &index,
                3,
                op,
                ElementTransform::Identity,
                op.identity(),
            )
            .unwrap();
            // Group 0 is all NaN, group 1 has a single NaN at row 997.
            assert!(par[0].is_nan(), "{op:?}: {par:?}");
            assert!(par[1].is_nan(), "{op:?}: {par:?}");
            assert!(!par[2].is_nan(), "{op:?}: {par:?}");
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_partitioned_empty_input() {
        let data: [f64; 0] = [];
        let features = FeatureBatch::new(&data, 0, 2).unwrap();
        let out = scatter_reduce_par(
            &features,
            &[],
            2,
            ReduceOp::Min,
            ElementTransform::Identity,
            0.0,
        )
        .unwrap();
        assert_eq!(out, vec![0.0; 4]);
    }
}
