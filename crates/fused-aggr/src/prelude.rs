//! Commonly used types and traits for convenient importing.
//!
//! ```
//! use fused_aggr::prelude::*;
//!
//! let engine = FusedEngine::new(&[AggregationKind::Sum, AggregationKind::Max]).unwrap();
//! let out = engine.forward_rows(&[[1.0_f64], [4.0]], &[0, 0], 1).unwrap();
//! assert_eq!(out.row(0), &[5.0, 4.0]);
//! ```

// Error types
pub use crate::error::{Error, ErrorCategory, Result};

// Traits
pub use crate::traits::FeatureElement;

// Inputs and outputs
pub use crate::input::FeatureBatch;
pub use crate::output::GroupedOutput;

// Kinds, planning and execution
pub use crate::kind::AggregationKind;
pub use crate::plan::{AggregationPlan, DirectExecutor, FusedEngine};

// Configuration and batching
pub use crate::batch::{BatchProcessor, GroupedInput};
pub use crate::config::EngineConfig;
