//! Per-group element counts and emptiness.
//!
//! Degree-based aggregations divide by the number of elements in each group.
//! The count is clamped to at least one so empty groups divide `0 / 1`
//! instead of `0 / 0`; emptiness itself is kept in a separate mask, which is
//! what the masking aggregations (min, max, product) and the standard
//! deviation consult to force empty rows to zero.

use crate::error::Result;
use crate::traits::FeatureElement;

/// Per-group statistics for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStatistics<T> {
    clamped_counts: Option<Vec<T>>,
    empty: Option<Vec<bool>>,
}

impl<T: FeatureElement> GroupStatistics<T> {
    /// Computes whatever the plan asks for.
    ///
    /// - `need_degree`: clamped counts, and the empty mask for free since the
    ///   raw counts are already at hand.
    /// - `need_mask`: the empty mask, from a cheap presence scan when counts
    ///   are not needed.
    ///
    /// `group_index` must already be validated against `group_count`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NumericConversion` if a count does not fit in `T`.
    pub fn compute(
        group_index: &[usize],
        group_count: usize,
        need_degree: bool,
        need_mask: bool,
    ) -> Result<Self> {
        if need_degree {
            let (clamped_counts, empty) = counts_and_mask(group_index, group_count)?;
            return Ok(Self {
                clamped_counts: Some(clamped_counts),
                empty: Some(empty),
            });
        }

        if need_mask {
            let mut empty = vec![true; group_count];
            for &g in group_index {
                empty[g] = false;
            }
            return Ok(Self {
                clamped_counts: None,
                empty: Some(empty),
            });
        }

        Ok(Self {
            clamped_counts: None,
            empty: None,
        })
    }

    /// Element count per group, floored at one.
    #[must_use]
    pub fn clamped_counts(&self) -> Option<&[T]> {
        self.clamped_counts.as_deref()
    }

    /// `true` for groups with no elements.
    #[must_use]
    pub fn empty_mask(&self) -> Option<&[bool]> {
        self.empty.as_deref()
    }

    /// Number of groups with no elements, if emptiness was computed.
    #[must_use]
    pub fn empty_group_count(&self) -> Option<usize> {
        self.empty
            .as_ref()
            .map(|mask| mask.iter().filter(|&&e| e).count())
    }
}

/// Clamped per-group counts together with the emptiness mask.
pub(crate) fn counts_and_mask<T: FeatureElement>(
    group_index: &[usize],
    group_count: usize,
) -> Result<(Vec<T>, Vec<bool>)> {
    let mut raw = vec![0_usize; group_count];
    for &g in group_index {
        raw[g] += 1;
    }
    let empty = raw.iter().map(|&c| c == 0).collect();
    let clamped = raw
        .into_iter()
        .map(|c| T::from_usize(c.max(1)))
        .collect::<Result<Vec<T>>>()?;
    Ok((clamped, empty))
}

/// Divides every row of a G x F matrix by its group's count.
pub(crate) fn divide_rows<T: FeatureElement>(values: &mut [T], counts: &[T], num_features: usize) {
    for (g, &count) in counts.iter().enumerate() {
        for v in &mut values[g * num_features..(g + 1) * num_features] {
            *v = *v / count;
        }
    }
}

/// Overwrites the rows of empty groups with zero.
pub(crate) fn zero_empty_rows<T: FeatureElement>(values: &mut [T], empty: &[bool], num_features: usize) {
    for (g, &is_empty) in empty.iter().enumerate() {
        if is_empty {
            values[g * num_features..(g + 1) * num_features].fill(T::zero());
        }
    }
}
