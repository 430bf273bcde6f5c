//! Tolerance-based comparison of aggregation results.
//!
//! Fused and direct execution sum in different orders, and partitioned
//! reductions reassociate `Add` and `Mul`, so outputs agree only up to
//! rounding. These helpers are what tests and callers use to compare them.
//!
//! # Example
//!
//! ```
//! use fused_aggr::utils::{approx_eq, slices_close, EPSILON, LOOSE_EPSILON};
//!
//! assert!(approx_eq(0.1_f64 + 0.2, 0.3, EPSILON));
//! assert!(slices_close(&[1.0_f64, 2.0], &[1.0, 2.0 + 1e-9], LOOSE_EPSILON));
//! ```

use crate::traits::FeatureElement;

/// Absolute tolerance for results with little accumulated rounding.
pub const EPSILON: f64 = 1e-10;

/// Relative tolerance for results of long reductions.
pub const LOOSE_EPSILON: f64 = 1e-6;

/// `true` if `a` and `b` differ by less than `tolerance`, or are both NaN.
///
/// ```
/// use fused_aggr::utils::{approx_eq, EPSILON};
///
/// assert!(approx_eq(1.0, 1.0 + 1e-11, EPSILON));
/// assert!(approx_eq(f64::NAN, f64::NAN, EPSILON));
/// assert!(!approx_eq(f64::NAN, 1.0, EPSILON));
/// ```
#[inline]
#[must_use]
pub fn approx_eq<T: FeatureElement>(a: T, b: T, tolerance: T) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    if a == b {
        return true;
    }
    (a - b).abs() < tolerance
}

/// `true` if the difference of `a` and `b` relative to the larger magnitude
/// is below `rel_tolerance`, or both are NaN. Equal infinities compare equal.
///
/// ```
/// use fused_aggr::utils::approx_eq_relative;
///
/// assert!(approx_eq_relative(1e10_f64, 1e10 + 1.0, 1e-9));
/// assert!(!approx_eq_relative(0.0_f64, 1e-12, 1e-6));
/// ```
#[inline]
#[must_use]
pub fn approx_eq_relative<T: FeatureElement>(a: T, b: T, rel_tolerance: T) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    if a == b {
        return true;
    }
    let diff = (a - b).abs();
    let scale = a.abs().max(b.abs());
    diff / scale < rel_tolerance
}

/// Elementwise comparison of two result matrices.
///
/// Each pair must satisfy [`approx_eq_relative`] with `rel_tolerance`, or
/// differ by less than `rel_tolerance` in absolute terms; the absolute branch
/// covers values that cancel to (almost) zero, such as a variance computed
/// as `E[x^2] - E[x]^2`. Slices of different length are never close.
#[must_use]
pub fn slices_close<T: FeatureElement>(a: &[T], b: &[T], rel_tolerance: T) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(&x, &y)| {
            approx_eq_relative(x, y, rel_tolerance) || approx_eq(x, y, rel_tolerance)
        })
}
