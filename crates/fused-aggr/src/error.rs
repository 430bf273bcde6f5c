//! Error types for fused-aggr.
//!
//! Every failure is synchronous and deterministic: the same invalid
//! configuration or input always fails the same way, and nothing is retried.
//! Variants fall into four categories, see [`ErrorCategory`].

use thiserror::Error;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The requested aggregation list cannot be planned.
    ///
    /// Raised eagerly when an engine is built, before any input is seen.
    Configuration,
    /// The input arrays are inconsistent with each other or with the engine.
    ///
    /// Raised at invocation time before any reduction executes.
    Shape,
    /// The plan and the derivation stage disagree about a reuse target.
    ///
    /// This is a programming fault and never occurs for a plan built by
    /// [`AggregationPlan::build`](crate::plan::AggregationPlan::build).
    UnsupportedPlan,
    /// A count could not be represented in the feature element type.
    Numeric,
}

/// The main error type for fused-aggr operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No aggregation kinds were requested.
    #[error("aggregation list must not be empty")]
    EmptyAggregationList,

    /// The named aggregation exists but cannot be expressed as a scatter reduction.
    #[error("aggregation '{name}' is not fusable")]
    NotFusable {
        /// The name as it was supplied.
        name: String,
    },

    /// The name does not refer to any known aggregation.
    #[error("unknown aggregation '{name}'")]
    UnknownAggregation {
        /// The name as it was supplied.
        name: String,
    },

    /// The feature array is not a dense (elements x features) matrix.
    #[error("features are not two-dimensional: {reason}")]
    NotTwoDimensional {
        /// Description of the mismatch.
        reason: String,
    },

    /// The group index does not have one entry per element.
    #[error("group index has {index_len} entries but features have {elements} elements")]
    IndexLengthMismatch {
        /// Number of feature rows.
        elements: usize,
        /// Number of group-index entries.
        index_len: usize,
    },

    /// A group-index value is not in `[0, group_count)`.
    #[error("group index {value} at position {position} is out of range for {group_count} groups")]
    GroupIndexOutOfRange {
        /// Position of the offending entry.
        position: usize,
        /// The offending value.
        value: usize,
        /// Number of groups requested by the caller.
        group_count: usize,
    },

    /// The engine was pinned to a feature width and the input differs.
    #[error("expected {expected} features per element, got {actual}")]
    FeatureWidthMismatch {
        /// Width the engine was configured for.
        expected: usize,
        /// Width of the supplied batch.
        actual: usize,
    },

    /// The G x F x K output, or a per-group buffer, exceeds the address space.
    #[error("output of {group_count} groups x {num_features} features x {num_blocks} blocks is too large")]
    OutputTooLarge {
        /// Number of groups requested by the caller.
        group_count: usize,
        /// Width of the supplied batch.
        num_features: usize,
        /// Number of G x F blocks in the output.
        num_blocks: usize,
    },

    /// The reuse chain recorded in the plan is inconsistent.
    #[error("unsupported plan for {kind}: {reason}")]
    UnsupportedPlan {
        /// Name of the kind whose derivation failed.
        kind: &'static str,
        /// What was inconsistent.
        reason: &'static str,
    },

    /// Failed to convert a numeric value to the feature element type.
    #[error("numeric conversion failed: {context}")]
    NumericConversion {
        /// Description of the conversion that failed.
        context: &'static str,
    },
}

impl Error {
    /// Returns the category this error belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyAggregationList | Self::NotFusable { .. } | Self::UnknownAggregation { .. } => {
                ErrorCategory::Configuration
            }
            Self::NotTwoDimensional { .. }
            | Self::IndexLengthMismatch { .. }
            | Self::GroupIndexOutOfRange { .. }
            | Self::FeatureWidthMismatch { .. }
            | Self::OutputTooLarge { .. } => ErrorCategory::Shape,
            Self::UnsupportedPlan { .. } => ErrorCategory::UnsupportedPlan,
            Self::NumericConversion { .. } => ErrorCategory::Numeric,
        }
    }

    /// Returns true for configuration errors.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.category(), ErrorCategory::Configuration)
    }

    /// Returns true for shape errors.
    #[must_use]
    pub const fn is_shape(&self) -> bool {
        matches!(self.category(), ErrorCategory::Shape)
    }
}

/// Convenience type alias for Results using the fused-aggr Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_aggregation_list_error() {
        let err = Error::EmptyAggregationList;
        assert_eq!(err.to_string(), "aggregation list must not be empty");
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_not_fusable_error() {
        let err = Error::NotFusable {
            name: "median".to_string(),
        };
        assert_eq!(err.to_string(), "aggregation 'median' is not fusable");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_index_length_mismatch_error() {
        let err = Error::IndexLengthMismatch {
            elements: 4,
            index_len: 3,
        };
        assert_eq!(
            err.to_string(),
            "group index has 3 entries but features have 4 elements"
        );
        assert!(err.is_shape());
    }

    #[test]
    fn test_group_index_out_of_range_error() {
        let err = Error::GroupIndexOutOfRange {
            position: 2,
            value: 7,
            group_count: 3,
        };
        assert_eq!(
            err.to_string(),
            "group index 7 at position 2 is out of range for 3 groups"
        );
        assert_eq!(err.category(), ErrorCategory::Shape);
    }

    #[test]
    fn test_output_too_large_error() {
        let err = Error::OutputTooLarge {
            group_count: usize::MAX,
            num_features: 2,
            num_blocks: 3,
        };
        assert!(err.to_string().contains("2 features x 3 blocks"));
        assert!(err.is_shape());
    }

    #[test]
    fn test_unsupported_plan_error() {
        let err = Error::UnsupportedPlan {
            kind: "std",
            reason: "reuse target is not a sum, mean or variance slot",
        };
        assert_eq!(err.category(), ErrorCategory::UnsupportedPlan);
        assert!(!err.is_configuration());
        assert!(!err.is_shape());
    }

    #[test]
    fn test_numeric_conversion_error() {
        let err = Error::NumericConversion {
            context: "usize to feature element",
        };
        assert_eq!(
            err.to_string(),
            "numeric conversion failed: usize to feature element"
        );
        assert_eq!(err.category(), ErrorCategory::Numeric);
    }

    #[test]
    fn test_error_equality() {
        let a = Error::FeatureWidthMismatch {
            expected: 2,
            actual: 3,
        };
        let b = a.clone();
        let c = Error::FeatureWidthMismatch {
            expected: 2,
            actual: 4,
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_error_is_std_error() {
        fn accepts_std_error<E: std::error::Error>(_: E) {}
        accepts_std_error(Error::EmptyAggregationList);
    }
}
