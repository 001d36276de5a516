/// NCEI GHCN-Daily CSV parsing.
///
/// The daily-summaries CSV carries `STATION` and `DATE` columns followed by
/// one column per element and, for most elements, an `<ELEM>_ATTRIBUTES`
/// column holding the quoted `"measurement,quality,source"` flag string:
///
/// ```text
/// "STATION","DATE","PRCP","PRCP_ATTRIBUTES","TMAX","TMAX_ATTRIBUTES"
/// "USW00014842","2024-07-04","0.00",",,W","91",",,W"
/// ```
///
/// Rows that cannot become an `Observation` are reported as validation
/// notes; only a structurally broken file is an error.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};

use super::{IngestError, StationSnapshot};
use crate::elements;
use crate::model::{DataValidationError, Observation, ValidationNote};

const STATION_COLUMN: &str = "STATION";
const DATE_COLUMN: &str = "DATE";
const ATTRIBUTES_SUFFIX: &str = "_ATTRIBUTES";

/// Accepted date layouts, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m-%d-%Y"];

#[derive(Debug, Clone, Default)]
pub struct ParsedStation {
    pub observations: Vec<Observation>,
    pub notes: Vec<ValidationNote>,
}

impl ParsedStation {
    /// Packages the parsed rows as a snapshot for `station_id`. Rows from
    /// other stations are left for validation to reject.
    pub fn into_snapshot(self, station_id: &str) -> StationSnapshot {
        StationSnapshot::new(station_id, self.observations)
    }
}

/// One element's value column and optional flag column.
struct ElementColumns {
    code: String,
    value: usize,
    attributes: Option<usize>,
}

fn element_columns(headers: &StringRecord) -> Vec<ElementColumns> {
    let names: Vec<&str> = headers.iter().collect();
    names
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.ends_with(ATTRIBUTES_SUFFIX))
        .filter_map(|(value, name)| {
            let attr_name = format!("{}{}", name, ATTRIBUTES_SUFFIX);
            let attributes = names.iter().position(|n| *n == attr_name);
            // Metadata columns (NAME, LATITUDE, ...) have no flags and are not
            // registered elements.
            (attributes.is_some() || elements::is_recognized(name)).then(|| ElementColumns {
                code: name.to_string(),
                value,
                attributes,
            })
        })
        .collect()
}

fn parse_date(raw: &str) -> Result<NaiveDate, DataValidationError> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| DataValidationError::InvalidDate(raw.to_string()))
}

/// Parses one data row. Values that parse to a non-finite number (`inf`,
/// `NaN`) are left out of the observation and pushed onto `ignored`.
fn parse_row(
    record: &StringRecord,
    station_idx: usize,
    date_idx: usize,
    columns: &[ElementColumns],
    ignored: &mut Vec<DataValidationError>,
) -> Result<Observation, DataValidationError> {
    let station_id = record.get(station_idx).unwrap_or("");
    if station_id.is_empty() {
        return Err(DataValidationError::MissingStationId);
    }
    let raw_date = record.get(date_idx).unwrap_or("");
    if raw_date.is_empty() {
        return Err(DataValidationError::MissingDate);
    }
    let date = parse_date(raw_date)?;

    let mut values = BTreeMap::new();
    let mut flags = BTreeMap::new();
    for col in columns {
        let Some(value) = record
            .get(col.value)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<f64>().ok())
        else {
            continue;
        };
        if !value.is_finite() {
            ignored.push(DataValidationError::NonFiniteValue {
                date,
                element: col.code.clone(),
            });
            continue;
        }
        values.insert(col.code.clone(), value);
        if let Some(raw) = col.attributes.and_then(|i| record.get(i)) {
            flags.insert(col.code.clone(), raw.to_string());
        }
    }

    if values.is_empty() {
        return Err(DataValidationError::NoElementValues { date });
    }

    Ok(Observation {
        station_id: station_id.to_string(),
        date,
        values,
        flags,
    })
}

/// Parses a daily-summaries CSV.
pub fn parse_station_csv(text: &str) -> Result<ParsedStation, IngestError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let station_idx = headers
        .iter()
        .position(|h| h == STATION_COLUMN)
        .ok_or(IngestError::MissingColumn(STATION_COLUMN))?;
    let date_idx = headers
        .iter()
        .position(|h| h == DATE_COLUMN)
        .ok_or(IngestError::MissingColumn(DATE_COLUMN))?;
    let columns = element_columns(&headers);

    let mut parsed = ParsedStation::default();
    let mut ignored = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let result = parse_row(&record, station_idx, date_idx, &columns, &mut ignored);
        parsed
            .notes
            .extend(ignored.drain(..).map(|err| ValidationNote::new(row, &err)));
        match result {
            Ok(obs) => parsed.observations.push(obs),
            Err(err) => parsed.notes.push(ValidationNote::new(row, &err)),
        }
    }

    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
