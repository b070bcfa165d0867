//! Anomaly scoring between two regions.
//!
//! The two count series are outer-joined into a combined frame, the
//! per-group difference vector is standardized, and groups whose absolute
//! z-score exceeds [`SIGNIFICANCE_THRESHOLD`] are reported.

use crate::models::{CombinedRow, GroupCounts, GroupKey, ScoredGroup};
use std::collections::BTreeSet;
use tracing::debug;

/// Absolute z-score above which a group difference is significant.
pub const SIGNIFICANCE_THRESHOLD: f64 = 2.0;

/// Outer-join two count series, filling absent counts with zero.
///
/// Rows come out in group key order.
pub fn combine(a: &GroupCounts, b: &GroupCounts) -> Vec<CombinedRow> {
    let keys: BTreeSet<&GroupKey> = a.keys().chain(b.keys()).collect();

    keys.into_iter()
        .map(|key| CombinedRow {
            key: key.clone(),
            count_a: a.get(key).copied().unwrap_or(0),
            count_b: b.get(key).copied().unwrap_or(0),
        })
        .collect()
}

/// Standardize values using the population standard deviation.
///
/// Returns `None` when the input is empty or has zero variance, since the
/// z-score is undefined there.
pub fn z_scores(values: &[f64]) -> Option<Vec<f64>> {
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return None;
    }

    Some(values.iter().map(|v| (v - mean) / std_dev).collect())
}

/// Compare two regions and return the significantly different groups.
pub fn score(a: &GroupCounts, b: &GroupCounts) -> Vec<ScoredGroup> {
    let combined = combine(a, b);
    let differences: Vec<f64> = combined.iter().map(CombinedRow::difference).collect();

    let Some(z) = z_scores(&differences) else {
        debug!(
            "Difference vector over {} groups has zero variance; nothing is significant",
            combined.len()
        );
        return Vec::new();
    };

    combined
        .into_iter()
        .zip(z)
        .filter(|(_, z)| z.abs() > SIGNIFICANCE_THRESHOLD)
        .map(|(row, z_score)| ScoredGroup {
            key: row.key,
            z_score,
        })
        .collect()
}
