//! Second-moment finishers for variance and standard deviation.
//!
//! Both operate in place on G x F matrices produced by the scatter kernel:
//!
//! ```text
//! variance = pow_sum / count - mean^2
//! stddev   = sqrt(max(variance, 0) + eps)
//! ```
//!
//! The clamp at zero absorbs rounding that pushes the one-pass variance
//! estimate slightly negative; `eps` keeps the square root away from zero.

use crate::traits::FeatureElement;

/// Turns a per-group sum of squares into the population variance.
pub(crate) fn variance_in_place<T: FeatureElement>(
    pow_sum: &mut [T],
    mean: &[T],
    counts: &[T],
    num_features: usize,
) {
    for (g, &count) in counts.iter().enumerate() {
        let range = g * num_features..(g + 1) * num_features;
        for (v, &m) in pow_sum[range.clone()].iter_mut().zip(&mean[range]) {
            *v = *v / count - m * m;
        }
    }
}

/// Turns a variance into `sqrt(max(var, 0) + eps)`. NaN stays NaN.
pub(crate) fn stddev_in_place<T: FeatureElement>(variance: &mut [T], eps: T) {
    for v in variance {
        let clamped = if *v < T::zero() { T::zero() } else { *v };
        *v = (clamped + eps).sqrt();
    }
}
