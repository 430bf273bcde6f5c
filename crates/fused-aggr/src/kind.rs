//! Aggregation kinds and their fixed behavior table.
//!
//! The set of fusable aggregations is closed, so every per-kind property
//! (degree dependence, masking, base reduction) is a `match` on
//! [`AggregationKind`] and per-kind lookups use `[_; AggregationKind::COUNT]`
//! arrays indexed by [`AggregationKind::index`].
//!
//! # Name resolution
//!
//! Configuration usually arrives as strings. [`AggregationKind::resolve`]
//! maps a name to a kind, distinguishing names that are known but cannot be
//! fused ([`Error::NotFusable`]) from names that mean nothing
//! ([`Error::UnknownAggregation`]).
//!
//! ```
//! use fused_aggr::kind::AggregationKind;
//!
//! assert_eq!(AggregationKind::resolve("mean").unwrap(), AggregationKind::Mean);
//! assert_eq!(AggregationKind::resolve("StdAggregation").unwrap(), AggregationKind::StdDev);
//! assert!(AggregationKind::resolve("median").unwrap_err().is_configuration());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kernels::scatter::{ElementTransform, ReduceOp};
use crate::traits::FeatureElement;

/// A fusable aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    /// Per-group sum.
    #[serde(alias = "add")]
    Sum,
    /// Per-group arithmetic mean.
    #[serde(alias = "avg", alias = "average")]
    Mean,
    /// Per-group elementwise minimum.
    Min,
    /// Per-group elementwise maximum.
    Max,
    /// Per-group product.
    #[serde(alias = "mul", alias = "prod")]
    Product,
    /// Per-group population variance.
    #[serde(alias = "var")]
    Variance,
    /// Per-group population standard deviation, `sqrt(max(var, 0) + 1e-5)`.
    #[serde(alias = "std")]
    StdDev,
}

/// Names of aggregations that exist but are not scatter reductions.
const NON_FUSABLE: &[&str] = &[
    "median",
    "quantile",
    "softmax",
    "powermean",
    "lstm",
    "gru",
    "set2set",
    "sort",
    "attentional",
    "equilibrium",
    "mlp",
    "deepsets",
    "settransformer",
    "lcm",
    "degreescaler",
    "graphmultiset",
    "multi",
    "variancepreserving",
    "patchtransformer",
];

impl AggregationKind {
    /// Number of kinds.
    pub const COUNT: usize = 7;

    /// All kinds in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Sum,
        Self::Mean,
        Self::Min,
        Self::Max,
        Self::Product,
        Self::Variance,
        Self::StdDev,
    ];

    /// Position of this kind in [`Self::ALL`], used to index fixed-size tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Sum => 0,
            Self::Mean => 1,
            Self::Min => 2,
            Self::Max => 3,
            Self::Product => 4,
            Self::Variance => 5,
            Self::StdDev => 6,
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Product => "product",
            Self::Variance => "variance",
            Self::StdDev => "stddev",
        }
    }

    /// Whether this kind divides by the per-group element count.
    #[must_use]
    pub const fn is_degree_based(self) -> bool {
        matches!(self, Self::Mean | Self::Variance | Self::StdDev)
    }

    /// Whether the base reduction fills unreferenced groups with a non-zero
    /// identity that has to be masked back to zero.
    #[must_use]
    pub const fn requires_mask(self) -> bool {
        matches!(self, Self::Min | Self::Max | Self::Product)
    }

    /// The base reduction this kind runs when it cannot reuse another slot.
    #[must_use]
    pub const fn base_reduce(self) -> BaseReduce {
        match self {
            Self::Sum | Self::Mean => BaseReduce::Sum,
            Self::Min => BaseReduce::Min,
            Self::Max => BaseReduce::Max,
            Self::Product => BaseReduce::Product,
            Self::Variance | Self::StdDev => BaseReduce::PowSum,
        }
    }

    /// Resolves a configuration name to a kind.
    ///
    /// Matching is case-insensitive, ignores `_`, `-` and whitespace, and
    /// accepts an `Aggregation` suffix, so `"sum"`, `"Sum"`, `"SumAggregation"`
    /// and `"sum_aggregation"` are all [`AggregationKind::Sum`].
    ///
    /// # Errors
    ///
    /// - `Error::NotFusable` for known aggregations that are not scatter reductions
    /// - `Error::UnknownAggregation` for anything else
    pub fn resolve(name: &str) -> Result<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        let key = normalized
            .strip_suffix("aggregation")
            .filter(|k| !k.is_empty())
            .unwrap_or(normalized.as_str());

        let kind = match key {
            "sum" | "add" => Self::Sum,
            "mean" | "avg" | "average" => Self::Mean,
            "min" | "amin" => Self::Min,
            "max" | "amax" => Self::Max,
            "mul" | "prod" | "product" => Self::Product,
            "var" | "variance" => Self::Variance,
            "std" | "stddev" => Self::StdDev,
            other if NON_FUSABLE.contains(&other) => {
                return Err(Error::NotFusable {
                    name: name.to_string(),
                })
            }
            _ => {
                return Err(Error::UnknownAggregation {
                    name: name.to_string(),
                })
            }
        };
        Ok(kind)
    }

    /// Resolves every name in order.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error.
    pub fn resolve_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<Self>> {
        names.iter().map(|n| Self::resolve(n.as_ref())).collect()
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}

/// A grouped-reduce pass computed directly from raw elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseReduce {
    /// Sum of elements.
    Sum,
    /// Elementwise minimum.
    Min,
    /// Elementwise maximum.
    Max,
    /// Product of elements.
    Product,
    /// Sum of squared elements.
    PowSum,
}

impl BaseReduce {
    /// Transform applied to each element before reducing.
    #[must_use]
    pub const fn transform(self) -> ElementTransform {
        match self {
            Self::PowSum => ElementTransform::Square,
            Self::Sum | Self::Min | Self::Max | Self::Product => ElementTransform::Identity,
        }
    }

    /// Reduction operator.
    #[must_use]
    pub const fn op(self) -> ReduceOp {
        match self {
            Self::Sum | Self::PowSum => ReduceOp::Add,
            Self::Min => ReduceOp::Min,
            Self::Max => ReduceOp::Max,
            Self::Product => ReduceOp::Mul,
        }
    }

    /// Value taken by groups no element refers to.
    #[must_use]
    pub fn fill_value<T: FeatureElement>(self) -> T {
        self.op().identity()
    }

    /// Whether the fill value is something other than zero, so empty groups
    /// must be overwritten after the reduce.
    #[must_use]
    pub const fn needs_empty_mask(self) -> bool {
        !matches!(self.op(), ReduceOp::Add)
    }
}
