//! Core data types for the ANA hydrological ingest pipeline.
//!
//! This module defines the shared domain model imported by all other modules:
//! the date-indexed `TimeSeriesTable`, the inclusive `DateRange` used to trim
//! it, the two `Dataset`s the pipeline knows about, and the fetch error type.
//! It contains no I/O.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

/// The two series families downloaded from HidroWeb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Flow,
    Rainfall,
}

impl Dataset {
    /// Directory name under the local root, also the second segment of the blob key.
    pub fn entity_name(self) -> &'static str {
        match self {
            Dataset::Flow => "flow",
            Dataset::Rainfall => "rainfall",
        }
    }

    /// HidroWeb `tipoDados` code: 3 = discharge, 2 = precipitation.
    pub fn ana_data_type(self) -> &'static str {
        match self {
            Dataset::Flow => "3",
            Dataset::Rainfall => "2",
        }
    }

    /// Prefix of the per-day value elements (`Vazao01`..`Vazao31`, `Chuva01`..`Chuva31`).
    pub fn value_prefix(self) -> &'static str {
        match self {
            Dataset::Flow => "Vazao",
            Dataset::Rainfall => "Chuva",
        }
    }

    pub fn default_filename(self) -> &'static str {
        match self {
            Dataset::Flow => "thesis_flow_data.csv",
            Dataset::Rainfall => "thesis_rainfall_data.csv",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dataset::Flow => write!(f, "FLOW"),
            Dataset::Rainfall => write!(f, "RAINFALL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Date window
// ---------------------------------------------------------------------------

/// Inclusive calendar-date window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} and {}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Time series table
// ---------------------------------------------------------------------------

/// One observation date and a value per station column.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// A date-indexed table with one value column per station.
///
/// Rows are kept sorted ascending by date with no duplicate dates, and every
/// row carries exactly one value per column. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeriesTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Raised when rows do not line up with the column header.
#[derive(Debug, Error, PartialEq)]
#[error("row for {date} has {found} values but the table has {expected} columns")]
pub struct ShapeError {
    pub date: NaiveDate,
    pub expected: usize,
    pub found: usize,
}

impl TimeSeriesTable {
    /// Build a table from rows in any order. Rows are sorted by date; when a
    /// date repeats, the later row wins.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, ShapeError> {
        let mut by_date = BTreeMap::new();
        for row in rows {
            if row.values.len() != columns.len() {
                return Err(ShapeError {
                    date: row.date,
                    expected: columns.len(),
                    found: row.values.len(),
                });
            }
            by_date.insert(row.date, row.values);
        }
        let rows = by_date
            .into_iter()
            .map(|(date, values)| Row { date, values })
            .collect();
        Ok(Self { columns, rows })
    }

    /// Outer-join per-station daily series on date. Columns keep the order
    /// of `series`; a station missing a date gets `None` there.
    pub fn from_station_series(series: Vec<(String, BTreeMap<NaiveDate, Option<f64>>)>) -> Self {
        let mut joined: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        let width = series.len();
        let mut columns = Vec::with_capacity(width);

        for (idx, (station, values)) in series.into_iter().enumerate() {
            columns.push(station);
            for (date, value) in values {
                joined.entry(date).or_insert_with(|| vec![None; width])[idx] = value;
            }
        }

        let rows = joined
            .into_iter()
            .map(|(date, values)| Row { date, values })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose date falls inside `range`, original order preserved.
    pub fn filter_by_date(&self, range: DateRange) -> TimeSeriesTable {
        TimeSeriesTable {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| range.contains(row.date))
                .cloned()
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching or decoding HidroWeb data.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-2xx response from the service.
    #[error("HTTP error: {status} for station {station}")]
    Status { station: String, status: u16 },
    /// The XML body could not be read.
    #[error("Parse error: {0}")]
    Xml(String),
    /// A record carried a field that could not be interpreted.
    #[error("Invalid field {field} in record for station {station}: {value:?}")]
    InvalidField {
        station: String,
        field: &'static str,
        value: String,
    },
}
