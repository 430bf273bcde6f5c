//! Shared test utilities for fused-aggr tests.

use fused_aggr::AggregationKind;

/// Relative tolerance between fused and unfused results.
#[allow(dead_code)]
pub const FUSION_TOLERANCE: f64 = 1e-5;

/// Every non-empty subset of the seven kinds, in `AggregationKind::ALL` order.
#[allow(dead_code)]
pub fn all_kind_subsets() -> Vec<Vec<AggregationKind>> {
    (1_u32..(1 << AggregationKind::COUNT))
        .map(|mask| {
            AggregationKind::ALL
                .iter()
                .enumerate()
                .filter(|&(i, _)| mask & (1 << i) != 0)
                .map(|(_, &k)| k)
                .collect()
        })
        .collect()
}

/// Row-major N x F features with a deterministic pattern.
#[allow(dead_code)]
pub fn pattern_features(num_elements: usize, num_features: usize) -> Vec<f64> {
    (0..num_elements * num_features)
        .map(|i| {
            let i = u32::try_from(i % 1000).unwrap_or(0);
            f64::from(i % 37) * 0.25 - 4.0 + f64::from(i % 3) * 0.1
        })
        .collect()
}

/// Group index that leaves every group `g` with `g % skip == skip - 1` empty.
#[allow(dead_code)]
pub fn sparse_index(num_elements: usize, group_count: usize, skip: usize) -> Vec<usize> {
    let used: Vec<usize> = (0..group_count).filter(|g| g % skip != skip - 1).collect();
    (0..num_elements).map(|i| used[i % used.len()]).collect()
}

/// Install a test logger once; later calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
