//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use chrono::NaiveDate;
use hidropipeline::config::PipelineConfig;
use hidropipeline::ingest::TimeSeriesSource;
use hidropipeline::load::azure::{BlobError, BlobStore};
use hidropipeline::model::{Dataset, FetchError, Row, TimeSeriesTable};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `n` consecutive daily rows for one station starting at `start`.
pub fn daily_table(station: &str, start: NaiveDate, n: u32) -> TimeSeriesTable {
    let rows = (0..n)
        .map(|i| Row {
            date: start + chrono::Duration::days(i64::from(i)),
            values: vec![Some(100.0 + f64::from(i))],
        })
        .collect();
    TimeSeriesTable::new(vec![station.to_string()], rows).unwrap()
}

/// Config rooted at `dir` with no retry delay and cloud not required.
pub fn test_config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        raw_path: dir.to_path_buf(),
        retry_delay_seconds: 0,
        require_cloud: false,
        ..PipelineConfig::default()
    }
}

/// Answers each dataset with a canned table; datasets not listed get `None`.
#[derive(Default)]
pub struct FixedSource {
    pub tables: HashMap<Dataset, TimeSeriesTable>,
    pub failing: Vec<Dataset>,
    pub calls: RefCell<Vec<(Dataset, Vec<String>)>>,
}

impl FixedSource {
    pub fn with(mut self, dataset: Dataset, table: TimeSeriesTable) -> Self {
        self.tables.insert(dataset, table);
        self
    }

    pub fn failing_on(mut self, dataset: Dataset) -> Self {
        self.failing.push(dataset);
        self
    }

    pub fn call_count(&self, dataset: Dataset) -> usize {
        self.calls.borrow().iter().filter(|(d, _)| *d == dataset).count()
    }
}

impl TimeSeriesSource for FixedSource {
    fn fetch(&self, dataset: Dataset, stations: &[String]) -> Result<Option<TimeSeriesTable>, FetchError> {
        self.calls.borrow_mut().push((dataset, stations.to_vec()));
        if self.failing.contains(&dataset) {
            return Err(FetchError::Status {
                station: stations.join(","),
                status: 500,
            });
        }
        Ok(self.tables.get(&dataset).cloned())
    }
}

/// One uploaded object.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub container: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

/// In-memory blob store; clones share the same upload log.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    pub uploads: Rc<RefCell<Vec<Upload>>>,
}

impl BlobStore for MemoryBlobStore {
    fn put_blob(&self, container: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), BlobError> {
        self.uploads.borrow_mut().push(Upload {
            container: container.to_string(),
            key: key.to_string(),
            body,
            content_type: content_type.to_string(),
        });
        Ok(())
    }
}
