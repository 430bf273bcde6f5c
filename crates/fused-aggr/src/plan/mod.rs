//! Planning and execution of grouped aggregations.
//!
//! # Architecture
//!
//! 1. **AggregationPlan** ([`builder`]): decides, once per kind list, which
//!    base reductions run and which results are reused
//! 2. **FusedEngine** ([`fused_mode`]): executes a plan, sharing base passes
//!    and group statistics across kinds
//! 3. **DirectExecutor** ([`direct_mode`]): computes each kind on its own
//!
//! # Execution Modes
//!
//! ## Fused Mode
//!
//! ```
//! use fused_aggr::kind::AggregationKind;
//! use fused_aggr::plan::FusedEngine;
//!
//! let engine = FusedEngine::from_names(&["min", "max", "mul"]).unwrap();
//! let out = engine.forward_rows(&[[2.0_f64], [5.0], [3.0]], &[0, 0, 0], 1).unwrap();
//! assert_eq!(out.row(0), &[2.0, 5.0, 30.0]);
//! assert_eq!(out.kinds()[2], AggregationKind::Product);
//! ```
//!
//! ## Direct Mode
//!
//! ```
//! use fused_aggr::input::FeatureBatch;
//! use fused_aggr::kind::AggregationKind;
//! use fused_aggr::plan::DirectExecutor;
//!
//! let data = [2.0_f64, 5.0, 3.0];
//! let batch = FeatureBatch::new(&data, 3, 1).unwrap();
//! let out = DirectExecutor::new()
//!     .execute(&[AggregationKind::Min, AggregationKind::Max], &batch, &[0, 0, 0], 1)
//!     .unwrap();
//! assert_eq!(out.row(0), &[2.0, 5.0]);
//! ```
//!
//! For a single kind the two modes do the same work; the fused engine pays
//! off as soon as two kinds share a base pass or the group counts.

pub mod builder;
pub mod direct_mode;
pub mod fused_mode;

pub use builder::{AggregationPlan, PlanEntry, Reuse};
pub use direct_mode::DirectExecutor;
pub use fused_mode::{FusedEngine, DEFAULT_MIN_PARALLEL_ELEMENTS};
