//! Running one engine over many grouped inputs.
//!
//! A training step often aggregates several independent mini-batches with
//! the same kind list. [`BatchProcessor`] applies a single [`FusedEngine`]
//! to each [`GroupedInput`] and returns the outputs in input order, using
//! Rayon when the `parallel` feature is enabled and there are enough inputs.
//!
//! # Example
//!
//! ```
//! use fused_aggr::batch::{BatchProcessor, GroupedInput};
//! use fused_aggr::input::FeatureBatch;
//! use fused_aggr::plan::FusedEngine;
//!
//! let engine = FusedEngine::from_names(&["sum", "max"]).unwrap();
//! let a = [1.0_f64, 2.0, 3.0];
//! let b = [4.0_f64, 5.0];
//! let inputs = vec![
//!     GroupedInput::new(FeatureBatch::new(&a, 3, 1).unwrap(), &[0, 0, 1], 2),
//!     GroupedInput::new(FeatureBatch::new(&b, 2, 1).unwrap(), &[0, 0], 1),
//! ];
//!
//! let outputs = BatchProcessor::new().process(&engine, &inputs).unwrap();
//! assert_eq!(outputs[0].row(0), &[3.0, 2.0]);
//! assert_eq!(outputs[1].row(0), &[9.0, 5.0]);
//! ```

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::Result;
use crate::input::FeatureBatch;
use crate::output::GroupedOutput;
use crate::plan::FusedEngine;
use crate::traits::FeatureElement;

/// One invocation's inputs: features, group index and group count.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedInput<'a, T: FeatureElement> {
    /// N x F features.
    pub features: FeatureBatch<'a, T>,
    /// Group of each element, length N.
    pub group_index: &'a [usize],
    /// Number of groups (G).
    pub group_count: usize,
}

impl<'a, T: FeatureElement> GroupedInput<'a, T> {
    /// Bundles one invocation's inputs.
    #[must_use]
    pub const fn new(features: FeatureBatch<'a, T>, group_index: &'a [usize], group_count: usize) -> Self {
        Self {
            features,
            group_index,
            group_count,
        }
    }

    fn run(&self, engine: &FusedEngine) -> Result<GroupedOutput<T>> {
        engine.forward(&self.features, self.group_index, self.group_count)
    }
}

/// Applies one engine to many inputs.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    /// Minimum number of inputs for parallel processing.
    min_parallel_threshold: usize,
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchProcessor {
    /// Creates a processor that parallelizes from four inputs on.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_parallel_threshold: 4,
        }
    }

    /// Sets the minimum number of inputs required for parallel processing.
    #[must_use]
    pub const fn min_parallel_threshold(mut self, threshold: usize) -> Self {
        self.min_parallel_threshold = threshold;
        self
    }

    /// Runs `engine` on every input, returning outputs in input order.
    ///
    /// # Errors
    ///
    /// Returns the first error any input produces.
    #[cfg(feature = "parallel")]
    pub fn process<T: FeatureElement>(
        &self,
        engine: &FusedEngine,
        inputs: &[GroupedInput<'_, T>],
    ) -> Result<Vec<GroupedOutput<T>>> {
        if inputs.len() < self.min_parallel_threshold {
            log::debug!("batch of {} inputs: sequential", inputs.len());
            inputs.iter().map(|input| input.run(engine)).collect()
        } else {
            log::debug!("batch of {} inputs: parallel", inputs.len());
            inputs
                .par_iter()
                .map(|input| input.run(engine))
                .collect::<Result<Vec<_>>>()
        }
    }

    /// Sequential version when the parallel feature is disabled.
    ///
    /// # Errors
    ///
    /// Returns the first error any input produces.
    #[cfg(not(feature = "parallel"))]
    pub fn process<T: FeatureElement>(
        &self,
        engine: &FusedEngine,
        inputs: &[GroupedInput<'_, T>],
    ) -> Result<Vec<GroupedOutput<T>>> {
        log::debug!("batch of {} inputs: sequential", inputs.len());
        inputs.iter().map(|input| input.run(engine)).collect()
    }
}

/// Shorthand for [`BatchProcessor::new`]`.process(engine, inputs)`.
///
/// # Errors
///
/// Returns the first error any input produces.
pub fn process_batch<T: FeatureElement>(
    engine: &FusedEngine,
    inputs: &[GroupedInput<'_, T>],
) -> Result<Vec<GroupedOutput<T>>> {
    BatchProcessor::new().process(engine, inputs)
}
