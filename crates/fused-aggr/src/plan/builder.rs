//! Aggregation plan: which base reductions run and which slots are reused.
//!
//! The plan is built once from the requested kinds and is read-only
//! afterwards. For every requested kind (in request order) it records:
//!
//! - the base reduction to execute for that slot, or `None` when the slot is
//!   filled from another slot's output;
//! - which earlier kind's slot it reads during derivation, if any.
//!
//! # Reuse rules
//!
//! | kind     | base pass          | reads                                  |
//! |----------|--------------------|----------------------------------------|
//! | Mean     | none if Sum present, else Sum | Sum slot                    |
//! | Variance | PowSum             | Mean slot, else Sum slot, else fresh   |
//! | StdDev   | none if Variance present, else PowSum | Variance, else Mean, else Sum, else fresh |
//! | others   | own                | nothing                                |
//!
//! A kind requested more than once is computed once; later occurrences copy
//! the first occurrence's block during assembly.
//!
//! # Example
//!
//! ```
//! use fused_aggr::kind::{AggregationKind, BaseReduce};
//! use fused_aggr::plan::AggregationPlan;
//!
//! let plan = AggregationPlan::build(&[
//!     AggregationKind::Sum,
//!     AggregationKind::Mean,
//!     AggregationKind::StdDev,
//! ])
//! .unwrap();
//!
//! // Mean divides Sum's output, so only Sum and PowSum run.
//! let passes: Vec<BaseReduce> = plan.base_passes().map(|(_, base)| base).collect();
//! assert_eq!(passes, vec![BaseReduce::Sum, BaseReduce::PowSum]);
//! ```

use crate::error::{Error, Result};
use crate::kind::{AggregationKind, BaseReduce};

/// A read of another slot during derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reuse {
    /// Kind whose output is read.
    pub kind: AggregationKind,
    /// Position of that kind in the request list.
    pub position: usize,
}

/// Plan for one requested position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanEntry {
    /// Requested kind.
    pub kind: AggregationKind,
    /// Base reduction filling this slot, `None` when nothing runs for it.
    pub base: Option<BaseReduce>,
    /// Slot read during derivation.
    pub reuse: Option<Reuse>,
    /// Earlier position holding the same kind.
    pub duplicate_of: Option<usize>,
}

impl PlanEntry {
    const fn duplicate(kind: AggregationKind, first: usize) -> Self {
        Self {
            kind,
            base: None,
            reuse: None,
            duplicate_of: Some(first),
        }
    }

    const fn own(kind: AggregationKind, reuse: Option<Reuse>) -> Self {
        Self {
            kind,
            base: Some(kind.base_reduce()),
            reuse,
            duplicate_of: None,
        }
    }

    const fn borrowed(kind: AggregationKind, reuse: Reuse) -> Self {
        Self {
            kind,
            base: None,
            reuse: Some(reuse),
            duplicate_of: None,
        }
    }
}

/// Immutable execution plan for a list of aggregation kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationPlan {
    entries: Vec<PlanEntry>,
    positions: [Option<usize>; AggregationKind::COUNT],
    need_degree: bool,
    need_mask: bool,
}

impl AggregationPlan {
    /// Builds the plan.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyAggregationList` if `kinds` is empty.
    pub fn build(kinds: &[AggregationKind]) -> Result<Self> {
        if kinds.is_empty() {
            return Err(Error::EmptyAggregationList);
        }

        let mut positions: [Option<usize>; AggregationKind::COUNT] = [None; AggregationKind::COUNT];
        for (pos, kind) in kinds.iter().enumerate() {
            let slot = &mut positions[kind.index()];
            if slot.is_none() {
                *slot = Some(pos);
            }
        }
        let lookup = |kind: AggregationKind| {
            positions[kind.index()].map(|position| Reuse { kind, position })
        };

        let need_degree = kinds.iter().any(|k| k.is_degree_based());
        let need_mask = kinds.iter().any(|k| k.requires_mask());

        let entries: Vec<PlanEntry> = kinds
            .iter()
            .enumerate()
            .map(|(pos, &kind)| {
                if let Some(first) = positions[kind.index()].filter(|&first| first != pos) {
                    return PlanEntry::duplicate(kind, first);
                }
                match kind {
                    AggregationKind::Mean => match lookup(AggregationKind::Sum) {
                        Some(sum) => PlanEntry::borrowed(kind, sum),
                        None => PlanEntry::own(kind, None),
                    },
                    AggregationKind::Variance => PlanEntry::own(
                        kind,
                        lookup(AggregationKind::Mean).or_else(|| lookup(AggregationKind::Sum)),
                    ),
                    AggregationKind::StdDev => match lookup(AggregationKind::Variance) {
                        Some(var) => PlanEntry::borrowed(kind, var),
                        None => PlanEntry::own(
                            kind,
                            lookup(AggregationKind::Mean).or_else(|| lookup(AggregationKind::Sum)),
                        ),
                    },
                    AggregationKind::Sum
                    | AggregationKind::Min
                    | AggregationKind::Max
                    | AggregationKind::Product => PlanEntry::own(kind, None),
                }
            })
            .collect();

        let plan = Self {
            entries,
            positions,
            need_degree,
            need_mask,
        };
        log::debug!(
            "built aggregation plan {:?}: {} base passes, need_degree={}, need_mask={}",
            kinds,
            plan.base_passes().count(),
            need_degree,
            need_mask
        );
        Ok(plan)
    }

    /// Builds a plan from configuration names.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a name does not resolve to a fusable
    /// kind or the list is empty.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        Self::build(&AggregationKind::resolve_all(names)?)
    }

    /// Per-position entries in request order.
    #[must_use]
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    #[cfg(test)]
    pub(crate) fn entries_mut(&mut self) -> &mut [PlanEntry] {
        &mut self.entries
    }

    /// Entry at `position`.
    #[must_use]
    pub fn entry(&self, position: usize) -> Option<&PlanEntry> {
        self.entries.get(position)
    }

    /// Requested kinds in request order.
    pub fn kinds(&self) -> impl ExactSizeIterator<Item = AggregationKind> + '_ {
        self.entries.iter().map(|e| e.kind)
    }

    /// Number of requested kinds (K).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; an empty plan cannot be built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First position of `kind` in the request list.
    #[must_use]
    pub const fn position_of(&self, kind: AggregationKind) -> Option<usize> {
        self.positions[kind.index()]
    }

    /// Whether per-group counts are needed.
    #[must_use]
    pub const fn need_degree(&self) -> bool {
        self.need_degree
    }

    /// Whether the emptiness mask is needed for min, max or product.
    #[must_use]
    pub const fn need_mask(&self) -> bool {
        self.need_mask
    }

    /// Base reductions executed per invocation, as `(position, base)`.
    pub fn base_passes(&self) -> impl Iterator<Item = (usize, BaseReduce)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(pos, e)| e.base.map(|base| (pos, base)))
    }
}
