//! Input views and shape validation.
//!
//! A [`FeatureBatch`] is a dense, row-major (elements x features) matrix.
//! It either borrows a flat slice supplied by the caller or owns a copy built
//! from per-element rows. Group indices are plain `usize` slices, one entry
//! per element, each in `[0, group_count)`.

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::traits::FeatureElement;

/// Dense N x F feature matrix, row-major by element.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBatch<'a, T: Clone> {
    data: Cow<'a, [T]>,
    num_elements: usize,
    num_features: usize,
}

impl<'a, T: FeatureElement> FeatureBatch<'a, T> {
    /// Wraps a flat row-major slice of `num_elements * num_features` values.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotTwoDimensional` if the slice length is not
    /// `num_elements * num_features`.
    ///
    /// # Example
    ///
    /// ```
    /// use fused_aggr::input::FeatureBatch;
    ///
    /// let data = [1.0_f64, 2.0, 3.0, 4.0];
    /// let batch = FeatureBatch::new(&data, 2, 2).unwrap();
    /// assert_eq!(batch.row(1), &[3.0, 4.0]);
    ///
    /// assert!(FeatureBatch::new(&data, 3, 2).is_err());
    /// ```
    pub fn new(data: &'a [T], num_elements: usize, num_features: usize) -> Result<Self> {
        let expected = num_elements.checked_mul(num_features).ok_or_else(|| {
            Error::NotTwoDimensional {
                reason: format!("{num_elements} x {num_features} overflows usize"),
            }
        })?;
        if data.len() != expected {
            return Err(Error::NotTwoDimensional {
                reason: format!(
                    "{} values cannot form {num_elements} x {num_features}",
                    data.len()
                ),
            });
        }
        Ok(Self {
            data: Cow::Borrowed(data),
            num_elements,
            num_features,
        })
    }

    /// Builds an owned batch from one row per element.
    ///
    /// An empty slice yields a 0 x 0 batch.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotTwoDimensional` if the rows differ in length.
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> Result<FeatureBatch<'static, T>> {
        let num_features = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * num_features);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != num_features {
                return Err(Error::NotTwoDimensional {
                    reason: format!(
                        "row {i} has {} features, row 0 has {num_features}",
                        row.len()
                    ),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(FeatureBatch {
            data: Cow::Owned(data),
            num_elements: rows.len(),
            num_features,
        })
    }

    /// Number of element rows (N).
    #[must_use]
    pub const fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// Number of features per element (F).
    #[must_use]
    pub const fn num_features(&self) -> usize {
        self.num_features
    }

    /// The flat row-major values.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Features of element `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= num_elements()`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[T] {
        assert!(i < self.num_elements, "row {i} out of bounds");
        &self.data[i * self.num_features..(i + 1) * self.num_features]
    }
}

/// Checks that `group_index` has one entry per element and every entry is
/// below `group_count`.
///
/// # Errors
///
/// - `Error::IndexLengthMismatch` if the lengths differ
/// - `Error::GroupIndexOutOfRange` for the first entry `>= group_count`
pub fn validate_group_index(
    group_index: &[usize],
    num_elements: usize,
    group_count: usize,
) -> Result<()> {
    if group_index.len() != num_elements {
        return Err(Error::IndexLengthMismatch {
            elements: num_elements,
            index_len: group_index.len(),
        });
    }
    if let Some((position, &value)) = group_index
        .iter()
        .enumerate()
        .find(|&(_, &g)| g >= group_count)
    {
        return Err(Error::GroupIndexOutOfRange {
            position,
            value,
            group_count,
        });
    }
    Ok(())
}

/// Checks that a `group_count` x (`num_features` * `num_blocks`) output of
/// `T`, and every per-group buffer, can be allocated.
///
/// # Errors
///
/// Returns `Error::OutputTooLarge` if the row width, the element count or its
/// size in bytes overflows, or the byte size exceeds `isize::MAX`.
pub fn validate_output_size<T>(group_count: usize, num_features: usize, num_blocks: usize) -> Result<()> {
    let too_large = || Error::OutputTooLarge {
        group_count,
        num_features,
        num_blocks,
    };
    let row_width = num_features.checked_mul(num_blocks).ok_or_else(too_large)?;
    group_count
        .checked_mul(row_width.max(1))
        .and_then(|n| n.checked_mul(std::mem::size_of::<T>()))
        .filter(|&bytes| bytes <= isize::MAX.unsigned_abs())
        .map(|_| ())
        .ok_or_else(too_large)
}
