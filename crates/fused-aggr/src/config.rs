//! Engine configuration with a fluent builder API.
//!
//! [`EngineConfig`] is the serializable description of a [`FusedEngine`]:
//! aggregation names, an optional pinned feature width and the parallel
//! threshold. Names are resolved only in [`EngineConfig::build`], so a
//! configuration can be loaded from JSON and validated in one step.
//!
//! # Example
//!
//! ```
//! use fused_aggr::config::EngineConfig;
//!
//! let engine = EngineConfig::new()
//!     .aggregation("sum")
//!     .aggregation("std")
//!     .feature_width(3)
//!     .build()
//!     .unwrap();
//! assert_eq!(engine.plan().len(), 2);
//! assert_eq!(engine.feature_width(), Some(3));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::plan::{FusedEngine, DEFAULT_MIN_PARALLEL_ELEMENTS};

/// Serializable [`FusedEngine`] configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Aggregation names in output order, see
    /// [`AggregationKind::resolve`](crate::kind::AggregationKind::resolve).
    pub aggregations: Vec<String>,
    /// Number of features every input must have, if pinned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_width: Option<usize>,
    /// Input size (N * F) from which parallel execution is used.
    pub min_parallel_elements: usize,
}

impl Default for EngineConfig {
    /// An empty aggregation list with the default parallel threshold.
    fn default() -> Self {
        Self {
            aggregations: Vec::new(),
            feature_width: None,
            min_parallel_elements: DEFAULT_MIN_PARALLEL_ELEMENTS,
        }
    }
}

impl EngineConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for `names`.
    #[must_use]
    pub fn with_aggregations<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            aggregations: names.iter().map(|n| n.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    /// Appends one aggregation name.
    #[must_use]
    pub fn aggregation(mut self, name: impl Into<String>) -> Self {
        self.aggregations.push(name.into());
        self
    }

    /// Pins the feature width.
    #[must_use]
    pub const fn feature_width(mut self, width: usize) -> Self {
        self.feature_width = Some(width);
        self
    }

    /// Sets the parallel threshold.
    ///
    /// Default: [`DEFAULT_MIN_PARALLEL_ELEMENTS`]
    #[must_use]
    pub const fn min_parallel_elements(mut self, threshold: usize) -> Self {
        self.min_parallel_elements = threshold;
        self
    }

    /// Resolves the names and builds the engine.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the list is empty or a name does not
    /// resolve to a fusable aggregation.
    pub fn build(&self) -> Result<FusedEngine> {
        let mut engine = FusedEngine::from_names(self.aggregations.as_slice())?
            .with_min_parallel_elements(self.min_parallel_elements);
        if let Some(width) = self.feature_width {
            engine = engine.with_feature_width(width);
        }
        Ok(engine)
    }
}
