//! Demographic analysis modules.
//!
//! Aggregation turns a dataset into group counts; scoring compares two
//! regions' counts and flags significant differences.

pub mod aggregator;
pub mod scorer;

pub use aggregator::aggregate;
pub use scorer::score;
