//! Data models for the region comparison pipeline.
//!
//! This module contains the core data structures shared by the fetcher,
//! aggregator, and scorer: categorical cells, household records, group
//! keys, and the per-region count series.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A single categorical cell value from a dataset.
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Integer cell (e.g. an age bucket stored as a number).
    Int(i64),
    /// Non-integral floating point cell. Never NaN; NaN cells are treated
    /// as missing and integral values are stored as `Int`.
    Float(f64),
    /// Text cell.
    Text(String),
}

impl CellValue {
    /// Build a cell from a float, mapping NaN to a missing value.
    ///
    /// Integral values become `Int`, so `20.0` (a float-typed column with a
    /// gap in it) and `20` land in the same group. `-0.0` becomes `0`.
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.is_nan() {
            None
        } else if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
            Some(CellValue::Int(value as i64))
        } else {
            Some(CellValue::Float(value))
        }
    }

    /// Infer a cell from raw text (CSV). Empty text is a missing value.
    pub fn infer(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Some(CellValue::Int(i));
        }
        if let Ok(f) = raw.parse::<f64>() {
            return CellValue::from_f64(f);
        }
        Some(CellValue::Text(raw.to_string()))
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, CellValue::Text(_))
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellValue::Int(a), CellValue::Int(b)) => a.cmp(b),
            (CellValue::Float(a), CellValue::Float(b)) => a.total_cmp(b),
            (CellValue::Int(a), CellValue::Float(b)) => (*a as f64).total_cmp(b),
            (CellValue::Float(a), CellValue::Int(b)) => a.total_cmp(&(*b as f64)),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            // Numbers sort before text.
            _ => other.is_numeric().cmp(&self.is_numeric()),
        }
    }
}

/// Renders Python literal syntax so keys read like `(30, 'F', 'X')`.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(x) => write!(f, "{:?}", x),
            CellValue::Text(s) => {
                if s.contains('\'') && !s.contains('"') {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
                }
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        CellValue::Int(i64::from(i))
    }
}

/// One household row, reduced to the grouping attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HouseholdRecord {
    pub age: Option<CellValue>,
    pub gender: Option<CellValue>,
    pub ethnicity: Option<CellValue>,
}

impl HouseholdRecord {
    /// The record's group key, or `None` if any grouping cell is missing.
    pub fn group_key(&self) -> Option<GroupKey> {
        Some(GroupKey {
            age: self.age.clone()?,
            gender: self.gender.clone()?,
            ethnicity: self.ethnicity.clone()?,
        })
    }
}

/// All household records fetched for one region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetTable {
    pub records: Vec<HouseholdRecord>,
}

impl DatasetTable {
    pub fn new(records: Vec<HouseholdRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The (age, gender, ethnicity) tuple identifying one demographic cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupKey {
    pub age: CellValue,
    pub gender: CellValue,
    pub ethnicity: CellValue,
}

#[cfg(test)]
impl GroupKey {
    pub fn new(
        age: impl Into<CellValue>,
        gender: impl Into<CellValue>,
        ethnicity: impl Into<CellValue>,
    ) -> Self {
        Self {
            age: age.into(),
            gender: gender.into(),
            ethnicity: ethnicity.into(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.age, self.gender, self.ethnicity)
    }
}

/// Occurrence count per group key for one region.
pub type GroupCounts = BTreeMap<GroupKey, u64>;

/// One row of the outer-joined, zero-filled combined frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedRow {
    pub key: GroupKey,
    pub count_a: u64,
    pub count_b: u64,
}

impl CombinedRow {
    /// `count_a - count_b` as a float.
    pub fn difference(&self) -> f64 {
        self.count_a as f64 - self.count_b as f64
    }
}

/// A group whose standardized difference exceeded the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredGroup {
    pub key: GroupKey,
    pub z_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_key_display_matches_python_tuple() {
        let key = GroupKey::new(30, "F", "X");
        assert_eq!(key.to_string(), "(30, 'F', 'X')");

        let key = GroupKey {
            age: CellValue::Float(30.5),
            gender: CellValue::from("M"),
            ethnicity: CellValue::from("O'Neil"),
        };
        assert_eq!(key.to_string(), "(30.5, 'M', \"O'Neil\")");
    }

    #[test]
    fn test_cell_infer() {
        assert_eq!(CellValue::infer("42"), Some(CellValue::Int(42)));
        assert_eq!(CellValue::infer("4.5"), Some(CellValue::Float(4.5)));
        assert_eq!(CellValue::infer(" F "), Some(CellValue::from("F")));
        assert_eq!(CellValue::infer(""), None);
        assert_eq!(CellValue::infer("NaN"), None);
    }

    #[test]
    fn test_cell_ordering_is_total() {
        let mut cells = vec![
            CellValue::from("b"),
            CellValue::Float(7.5),
            CellValue::Int(7),
            CellValue::from("a"),
            CellValue::Float(-0.5),
            CellValue::Int(3),
        ];
        cells.sort();
        assert_eq!(
            cells,
            vec![
                CellValue::Float(-0.5),
                CellValue::Int(3),
                CellValue::Int(7),
                CellValue::Float(7.5),
                CellValue::from("a"),
                CellValue::from("b"),
            ]
        );
    }

    #[test]
    fn test_integral_floats_share_a_group_with_ints() {
        assert_eq!(CellValue::infer("20.0"), Some(CellValue::Int(20)));
        assert_eq!(CellValue::from_f64(20.0), Some(CellValue::Int(20)));
        assert_eq!(CellValue::infer("-0.0"), CellValue::infer("0"));
        assert_eq!(CellValue::from_f64(2.5), Some(CellValue::Float(2.5)));

        let from_int = HouseholdRecord {
            age: CellValue::infer("20"),
            gender: CellValue::infer("F"),
            ethnicity: CellValue::infer("X"),
        };
        let from_float = HouseholdRecord {
            age: CellValue::infer("20.0"),
            ..from_int.clone()
        };
        assert_eq!(from_int.group_key(), from_float.group_key());
        assert_eq!(from_int.group_key().unwrap().to_string(), "(20, 'F', 'X')");
    }

    #[test]
    fn test_group_key_requires_all_cells() {
        let record = HouseholdRecord {
            age: Some(CellValue::Int(30)),
            gender: None,
            ethnicity: Some(CellValue::from("X")),
        };
        assert!(record.group_key().is_none());

        let record = HouseholdRecord {
            gender: Some(CellValue::from("F")),
            ..record
        };
        assert_eq!(record.group_key(), Some(GroupKey::new(30, "F", "X")));
    }

    #[test]
    fn test_combined_row_difference() {
        let row = CombinedRow {
            key: GroupKey::new(1, "F", "X"),
            count_a: 3,
            count_b: 10,
        };
        assert_eq!(row.difference(), -7.0);
    }
}
