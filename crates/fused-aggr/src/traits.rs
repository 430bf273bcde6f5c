//! Numeric element trait for feature matrices.
//!
//! [`FeatureElement`] abstracts over `f32` and `f64` so the whole engine is
//! generic over IEEE precision. Conversions that can fail return
//! [`Error::NumericConversion`] instead of panicking.
//!
//! # Example
//!
//! ```
//! use fused_aggr::traits::FeatureElement;
//!
//! fn mean<T: FeatureElement>(values: &[T]) -> fused_aggr::Result<T> {
//!     let n = T::from_usize(values.len().max(1))?;
//!     Ok(values.iter().fold(T::zero(), |acc, &x| acc + x) / n)
//! }
//!
//! let m = mean(&[1.0_f64, 2.0, 3.0]).unwrap();
//! assert!((m - 2.0).abs() < 1e-12);
//! ```

use num_traits::{Float, NumCast};

use crate::error::{Error, Result};

/// Additive epsilon applied under the square root of the standard deviation.
pub const STDDEV_EPSILON: f64 = 1e-5;

/// A trait for types that can be stored in a feature matrix.
///
/// Blanket-implemented for every `Float + NumCast` type that is also
/// `Copy + Default + Send + Sync`, which in practice means `f32` and `f64`.
pub trait FeatureElement: Float + NumCast + Copy + Default + Send + Sync + 'static {
    /// Creates an element from a `usize` value.
    ///
    /// # Errors
    ///
    /// Returns `Error::NumericConversion` if the value cannot be represented in this type.
    #[inline]
    fn from_usize(value: usize) -> Result<Self> {
        <Self as NumCast>::from(value).ok_or(Error::NumericConversion {
            context: "usize to feature element",
        })
    }

    /// Creates an element from an `f64` value.
    ///
    /// # Errors
    ///
    /// Returns `Error::NumericConversion` if the value cannot be represented in this type.
    #[inline]
    fn from_f64(value: f64) -> Result<Self> {
        <Self as NumCast>::from(value).ok_or(Error::NumericConversion {
            context: "f64 to feature element",
        })
    }

    /// Returns [`STDDEV_EPSILON`] in this type.
    ///
    /// # Errors
    ///
    /// Returns `Error::NumericConversion` if the epsilon cannot be represented.
    #[inline]
    fn stddev_epsilon() -> Result<Self> {
        Self::from_f64(STDDEV_EPSILON)
    }
}

impl<T: Float + NumCast + Copy + Default + Send + Sync + 'static> FeatureElement for T {}
