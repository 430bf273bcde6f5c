//! fused-aggr: fused grouped statistical aggregation
//!
//! Given an N x F feature matrix, a group index assigning every element to
//! one of G groups, and a list of aggregation kinds, this crate computes one
//! G x F block per kind and concatenates them into a G x (F * K) output.
//! Kinds that share work (mean and sum, variance and mean, standard deviation
//! and variance) share it: each distinct base reduction runs at most once per
//! call.
//!
//! # Features
//!
//! - **Aggregations**: sum, mean, min, max, product, variance, std
//! - **Fusion**: shared base passes and group counts across kinds
//! - **Generics**: works with both `f32` and `f64`
//! - **Parallelism**: partitioned reductions on Rayon behind the default
//!   `parallel` feature
//!
//! # Quick Start
//!
//! ```
//! use fused_aggr::prelude::*;
//!
//! let engine = FusedEngine::new(&[AggregationKind::Sum, AggregationKind::Mean]).unwrap();
//!
//! // Two elements, both in group 0; group 1 is empty.
//! let out = engine
//!     .forward_rows(&[[1.0_f64, 2.0], [3.0, 4.0]], &[0, 0], 2)
//!     .unwrap();
//!
//! assert_eq!(out.row(0), &[4.0, 6.0, 2.0, 3.0]);
//! assert_eq!(out.row(1), &[0.0, 0.0, 0.0, 0.0]);
//! ```
//!
//! # Empty Groups
//!
//! Every aggregation yields zero for a group no element refers to; min, max
//! and product are masked, standard deviation is forced to zero.
//!
//! # Error Handling
//!
//! Every fallible operation returns [`Result<T, Error>`]; shape errors are
//! reported before any reduction runs:
//!
//! ```
//! use fused_aggr::prelude::*;
//!
//! assert!(FusedEngine::from_names(&["median"]).unwrap_err().is_configuration());
//!
//! let engine = FusedEngine::new(&[AggregationKind::Min]).unwrap();
//! let err = engine.forward_rows(&[[1.0_f64]], &[3], 2).unwrap_err();
//! assert!(err.is_shape());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::perf)]
#![warn(clippy::nursery)]
#![warn(clippy::needless_collect)]
#![warn(clippy::or_fun_call)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod config;
pub mod error;
pub mod input;
pub mod kernels;
pub mod kind;
pub mod output;
pub mod plan;
pub mod prelude;
pub mod traits;
pub mod utils;

// Re-export commonly used types at crate root
pub use config::EngineConfig;
pub use error::{Error, ErrorCategory, Result};
pub use input::FeatureBatch;
pub use kind::AggregationKind;
pub use output::GroupedOutput;
pub use plan::{DirectExecutor, FusedEngine};
pub use traits::FeatureElement;
pub use utils::{approx_eq, approx_eq_relative, slices_close, EPSILON, LOOSE_EPSILON};
