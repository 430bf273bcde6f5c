//! Assembled aggregation output.

use crate::kind::AggregationKind;

/// G x (F * K) row-major result: one row per group, one F-wide column block
/// per requested kind, blocks in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedOutput<T> {
    data: Vec<T>,
    kinds: Vec<AggregationKind>,
    num_groups: usize,
    num_features: usize,
}

impl<T: Copy> GroupedOutput<T> {
    /// Concatenates per-kind G x F blocks along the feature axis.
    ///
    /// # Panics
    ///
    /// Panics if `blocks` and `kinds` differ in length or a block is not
    /// `num_groups * num_features` long.
    #[must_use]
    pub(crate) fn from_blocks(
        kinds: Vec<AggregationKind>,
        blocks: &[&[T]],
        num_groups: usize,
        num_features: usize,
    ) -> Self {
        assert_eq!(kinds.len(), blocks.len(), "one block per kind");
        let width = num_features * kinds.len();
        let mut data = Vec::with_capacity(num_groups * width);
        for g in 0..num_groups {
            for block in blocks {
                assert_eq!(block.len(), num_groups * num_features, "block shape");
                data.extend_from_slice(&block[g * num_features..(g + 1) * num_features]);
            }
        }
        Self {
            data,
            kinds,
            num_groups,
            num_features,
        }
    }

    /// Kinds in column-block order.
    #[must_use]
    pub fn kinds(&self) -> &[AggregationKind] {
        &self.kinds
    }

    /// Number of groups (G).
    #[must_use]
    pub const fn num_groups(&self) -> usize {
        self.num_groups
    }

    /// Features per block (F).
    #[must_use]
    pub const fn num_features(&self) -> usize {
        self.num_features
    }

    /// Row width, F * K.
    #[must_use]
    pub fn width(&self) -> usize {
        self.num_features * self.kinds.len()
    }

    /// Output row of group `g`.
    ///
    /// # Panics
    ///
    /// Panics if `g >= num_groups()`.
    #[must_use]
    pub fn row(&self, g: usize) -> &[T] {
        let width = self.width();
        &self.data[g * width..(g + 1) * width]
    }

    /// Value at group `g`, column `col`.
    #[must_use]
    pub fn get(&self, g: usize, col: usize) -> Option<T> {
        if g >= self.num_groups || col >= self.width() {
            return None;
        }
        Some(self.data[g * self.width() + col])
    }

    /// Copy of the G x F block at request position `position`.
    #[must_use]
    pub fn block(&self, position: usize) -> Option<Vec<T>> {
        if position >= self.kinds.len() {
            return None;
        }
        let width = self.width();
        let start = position * self.num_features;
        let mut out = Vec::with_capacity(self.num_groups * self.num_features);
        for g in 0..self.num_groups {
            let row = g * width + start;
            out.extend_from_slice(&self.data[row..row + self.num_features]);
        }
        Some(out)
    }

    /// Block of the first occurrence of `kind`.
    #[must_use]
    pub fn block_of(&self, kind: AggregationKind) -> Option<Vec<T>> {
        self.kinds
            .iter()
            .position(|&k| k == kind)
            .and_then(|p| self.block(p))
    }

    /// Flat row-major values.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Consumes the output, returning the flat values.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}
