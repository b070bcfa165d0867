//! Household aggregation.
//!
//! This module groups the records of a dataset by their
//! (age, gender, ethnicity) key and counts the members of each group.

use crate::models::{DatasetTable, GroupCounts};
use tracing::debug;

/// Count records per group key.
///
/// Records with a missing grouping cell are skipped, the same way a
/// dataframe `groupby` drops null keys.
pub fn aggregate(table: &DatasetTable) -> GroupCounts {
    let mut counts = GroupCounts::new();
    let mut skipped = 0usize;

    for record in &table.records {
        match record.group_key() {
            Some(key) => *counts.entry(key).or_insert(0) += 1,
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("Skipped {} records with missing group cells", skipped);
    }

    counts
}
