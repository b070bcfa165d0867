//! Dataset decoding.
//!
//! Household tables arrive either as a list of row records or as a mapping
//! of column name to values. Pickle, JSON and CSV encodings are supported;
//! only the `age`, `gender` and `ethnicity` columns are kept.

use super::DecodeError;
use crate::models::{CellValue, DatasetTable, HouseholdRecord};
use serde_pickle::{DeOptions, HashableValue, Value as PickleValue};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::io::Read;

/// Encoding of a dataset file, selected by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Pickle,
    Json,
    Csv,
}

impl DatasetFormat {
    /// Resolve a format from a file extension (with or without the dot).
    pub fn from_extension(ext: &str) -> Result<Self, DecodeError> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pkl" | "pickle" => Ok(DatasetFormat::Pickle),
            "json" => Ok(DatasetFormat::Json),
            "csv" => Ok(DatasetFormat::Csv),
            other => Err(DecodeError::UnknownFormat(other.to_string())),
        }
    }

    /// Canonical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            DatasetFormat::Pickle => "pkl",
            DatasetFormat::Json => "json",
            DatasetFormat::Csv => "csv",
        }
    }

    /// Decode a household table from a reader.
    pub fn decode<R: Read>(&self, reader: R) -> Result<DatasetTable, DecodeError> {
        match self {
            DatasetFormat::Pickle => decode_pickle(reader),
            DatasetFormat::Json => decode_json(reader),
            DatasetFormat::Csv => decode_csv(reader),
        }
    }
}

/// Build one record from a per-column lookup.
fn record_from<F>(mut lookup: F) -> Result<HouseholdRecord, DecodeError>
where
    F: FnMut(&'static str) -> Option<Option<CellValue>>,
{
    let mut cell = |column: &'static str| lookup(column).ok_or(DecodeError::MissingColumn(column));
    Ok(HouseholdRecord {
        age: cell("age")?,
        gender: cell("gender")?,
        ethnicity: cell("ethnicity")?,
    })
}

/// Zip the three grouping columns into records.
fn table_from_columns(
    mut columns: HashMap<String, Vec<Option<CellValue>>>,
) -> Result<DatasetTable, DecodeError> {
    let mut take = |column: &'static str| {
        columns
            .remove(column)
            .ok_or(DecodeError::MissingColumn(column))
    };
    let ages = take("age")?;
    let genders = take("gender")?;
    let ethnicities = take("ethnicity")?;

    if ages.len() != genders.len() || ages.len() != ethnicities.len() {
        return Err(DecodeError::RaggedColumns);
    }

    let records = ages
        .into_iter()
        .zip(genders)
        .zip(ethnicities)
        .map(|((age, gender), ethnicity)| HouseholdRecord {
            age,
            gender,
            ethnicity,
        })
        .collect();

    Ok(DatasetTable::new(records))
}

/// Module prefix of every class a pandas pickle references.
const PANDAS_GLOBAL: &[u8] = b"pandas.core.";

fn decode_pickle<R: Read>(mut reader: R) -> Result<DatasetTable, DecodeError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    // Both GLOBAL and STACK_GLOBAL spell the module name out in the stream.
    if bytes
        .windows(PANDAS_GLOBAL.len())
        .any(|window| window == PANDAS_GLOBAL)
    {
        return Err(DecodeError::PandasPickle);
    }

    let value = serde_pickle::value_from_slice(&bytes, DeOptions::new())?;

    match value {
        PickleValue::List(rows) | PickleValue::Tuple(rows) => {
            let records = rows
                .iter()
                .map(|row| match row {
                    PickleValue::Dict(map) => record_from(|column| {
                        map.get(&HashableValue::String(column.to_string()))
                            .map(pickle_cell)
                    }),
                    _ => Err(DecodeError::UnsupportedLayout(
                        "pickle rows must be dicts".to_string(),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DatasetTable::new(records))
        }
        PickleValue::Dict(map) => {
            let columns = map
                .into_iter()
                .filter_map(|(name, values)| match (name, values) {
                    (HashableValue::String(name), PickleValue::List(values))
                    | (HashableValue::String(name), PickleValue::Tuple(values)) => {
                        Some((name, values.iter().map(pickle_cell).collect()))
                    }
                    _ => None,
                })
                .collect();
            table_from_columns(columns)
        }
        _ => Err(DecodeError::UnsupportedLayout(
            "pickle must hold a list of records or a dict of columns".to_string(),
        )),
    }
}

fn pickle_cell(value: &PickleValue) -> Option<CellValue> {
    match value {
        PickleValue::None => None,
        PickleValue::I64(i) => Some(CellValue::Int(*i)),
        PickleValue::Int(big) => Some(CellValue::Text(big.to_string())),
        PickleValue::F64(f) => CellValue::from_f64(*f),
        PickleValue::Bool(b) => Some(CellValue::Text(if *b { "True" } else { "False" }.to_string())),
        PickleValue::String(s) => Some(CellValue::Text(s.clone())),
        PickleValue::Bytes(b) => Some(CellValue::Text(String::from_utf8_lossy(b).into_owned())),
        other => Some(CellValue::Text(format!("{:?}", other))),
    }
}

fn decode_json<R: Read>(reader: R) -> Result<DatasetTable, DecodeError> {
    let value: JsonValue = serde_json::from_reader(reader)?;

    match value {
        JsonValue::Array(rows) => {
            let records = rows
                .iter()
                .map(|row| match row {
                    JsonValue::Object(map) => record_from(|column| map.get(column).map(json_cell)),
                    _ => Err(DecodeError::UnsupportedLayout(
                        "JSON rows must be objects".to_string(),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DatasetTable::new(records))
        }
        JsonValue::Object(map) => {
            let columns = map
                .into_iter()
                .filter_map(|(name, values)| match values {
                    JsonValue::Array(values) => {
                        Some((name, values.iter().map(json_cell).collect()))
                    }
                    _ => None,
                })
                .collect();
            table_from_columns(columns)
        }
        _ => Err(DecodeError::UnsupportedLayout(
            "JSON must hold an array of records or an object of columns".to_string(),
        )),
    }
}

fn json_cell(value: &JsonValue) -> Option<CellValue> {
    match value {
        JsonValue::Null => None,
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Some(CellValue::Int(i)),
            None => n.as_f64().and_then(CellValue::from_f64),
        },
        JsonValue::String(s) => Some(CellValue::Text(s.clone())),
        other => Some(CellValue::Text(other.to_string())),
    }
}

fn decode_csv<R: Read>(reader: R) -> Result<DatasetTable, DecodeError> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let index_of = |column: &'static str| {
        headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or(DecodeError::MissingColumn(column))
    };
    let (age, gender, ethnicity) = (index_of("age")?, index_of("gender")?, index_of("ethnicity")?);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let cell = |idx: usize| row.get(idx).and_then(CellValue::infer);
        records.push(HouseholdRecord {
            age: cell(age),
            gender: cell(gender),
            ethnicity: cell(ethnicity),
        });
    }

    Ok(DatasetTable::new(records))
}
