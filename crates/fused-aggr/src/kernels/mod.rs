//! Reduction kernels shared by the fused and direct execution modes.
//!
//! # Kernels
//!
//! - [`scatter`]: the grouped-reduce primitive (add, min, max, multiply)
//!   with an optional per-element square, sequential or partitioned on rayon
//! - [`group_stats`]: per-group clamped counts and emptiness mask
//! - [`moments`]: variance and standard deviation finishers

pub mod group_stats;
pub mod moments;
pub mod scatter;

pub use group_stats::GroupStatistics;
#[cfg(feature = "parallel")]
pub use scatter::scatter_reduce_par;
pub use scatter::{scatter_reduce, ElementTransform, ReduceOp};
