//! Persistence side of the pipeline: local disk plus Azure Blob Storage.
//!
//! `DataLoader::save_data` trims a table to the configured date window,
//! writes it to `<raw_path>/<dataset>/<filename>`, and, when a cloud sink is
//! configured, uploads the same bytes to
//! `ana/<dataset>/load_date=<YYYY-MM-DD>/<filename>`.
//!
//! The two writes are independent. A failed upload is reported and leaves
//! the local file in place; nothing is rolled back or retried.
//!
//! Submodules:
//! - `encoding`: CSV serialization used by both sinks.
//! - `azure`: the `BlobStore` seam and its Azure implementation.

pub mod azure;
pub mod encoding;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use thiserror::Error;

use crate::config::{ConfigError, PipelineConfig};
use crate::logging::{DataSource, Reporter};
use crate::model::{DateRange, TimeSeriesTable};
use azure::{AzureBlobClient, BlobStore};

/// Top-level prefix of every blob key.
pub const BLOB_ROOT: &str = "ana";

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// The local write failed. Cloud failures are outcomes, not errors.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize CSV: {0}")]
    Csv(#[from] ::csv::Error),
}

/// What one `save_data` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No rows; nothing written anywhere.
    Skipped,
    /// Local file written, no cloud sink configured.
    LocalOnly { path: PathBuf, rows: usize },
    /// Local file written and uploaded.
    Replicated { path: PathBuf, blob_key: String, rows: usize },
    /// Local file written, upload failed.
    CloudFailed {
        path: PathBuf,
        blob_key: String,
        rows: usize,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Cloud sink selection
// ---------------------------------------------------------------------------

/// Whether uploads happen at all, decided once at startup.
pub enum CloudSink {
    /// Local-only mode.
    Disabled,
    Blob {
        store: Box<dyn BlobStore>,
        container: String,
    },
}

impl CloudSink {
    pub fn blob(store: impl BlobStore + 'static, container: &str) -> Self {
        CloudSink::Blob {
            store: Box::new(store),
            container: container.to_string(),
        }
    }

    /// Build the Azure client from the configured connection string.
    ///
    /// No connection string means local-only mode. A connection string that
    /// cannot be turned into a client is reported and also yields local-only
    /// mode.
    pub fn from_config(config: &PipelineConfig, reporter: &dyn Reporter) -> Self {
        let Some(conn) = config.azure_conn_string.as_deref() else {
            return CloudSink::Disabled;
        };

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let container = &config.azure_container_name;
        match AzureBlobClient::from_connection_string(conn, container, timeout) {
            Ok(client) => {
                reporter.info(
                    DataSource::Azure,
                    Some(container),
                    "Azure Blob Storage client initialized.",
                );
                CloudSink::blob(client, container)
            }
            Err(e) => {
                reporter.error(
                    DataSource::Azure,
                    None,
                    &format!("Failed to connect to Azure: {}", e),
                );
                CloudSink::Disabled
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, CloudSink::Blob { .. })
    }
}

// ---------------------------------------------------------------------------
// Filtering and keys
// ---------------------------------------------------------------------------

/// Trim `table` to `range`. Absent and empty tables come back unchanged.
pub fn filter_by_date(table: Option<TimeSeriesTable>, range: DateRange) -> Option<TimeSeriesTable> {
    match table {
        Some(t) if !t.is_empty() => Some(t.filter_by_date(range)),
        other => other,
    }
}

/// `ana/<entity>/load_date=<YYYY-MM-DD>/<filename>`
pub fn blob_path(entity_name: &str, load_date: NaiveDate, filename: &str) -> String {
    format!(
        "{}/{}/load_date={}/{}",
        BLOB_ROOT,
        entity_name,
        load_date.format("%Y-%m-%d"),
        filename
    )
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

pub struct DataLoader<'a> {
    raw_path: PathBuf,
    range: DateRange,
    cloud: CloudSink,
    reporter: &'a dyn Reporter,
}

impl<'a> DataLoader<'a> {
    pub fn new(config: &PipelineConfig, cloud: CloudSink, reporter: &'a dyn Reporter) -> Result<Self, ConfigError> {
        Ok(Self {
            raw_path: config.raw_path.clone(),
            range: config.date_range()?,
            cloud,
            reporter,
        })
    }

    /// Save under today's (local wall-clock) load date.
    pub fn save_data(
        &self,
        table: Option<&TimeSeriesTable>,
        entity_name: &str,
        filename: &str,
    ) -> Result<SaveOutcome, SinkError> {
        self.save_data_on(table, entity_name, filename, Local::now().date_naive())
    }

    pub fn save_data_on(
        &self,
        table: Option<&TimeSeriesTable>,
        entity_name: &str,
        filename: &str,
        load_date: NaiveDate,
    ) -> Result<SaveOutcome, SinkError> {
        let table = match table {
            Some(t) if !t.is_empty() => t,
            _ => {
                self.reporter.warn(
                    DataSource::Local,
                    Some(filename),
                    &format!("No data to save for {}.", filename),
                );
                return Ok(SaveOutcome::Skipped);
            }
        };

        self.reporter.info(
            DataSource::System,
            Some(entity_name),
            &format!("Filtering data between {}...", self.range),
        );
        let filtered = table.filter_by_date(self.range);
        let rows = filtered.len();
        let body = encoding::to_csv_bytes(&filtered)?;

        let path = self.write_local(entity_name, filename, &body)?;

        let (store, container) = match &self.cloud {
            CloudSink::Disabled => return Ok(SaveOutcome::LocalOnly { path, rows }),
            CloudSink::Blob { store, container } => (store, container),
        };

        let blob_key = blob_path(entity_name, load_date, filename);
        self.reporter.info(
            DataSource::Azure,
            Some(&blob_key),
            &format!("[AZURE] Uploading to: {}", blob_key),
        );

        match store.put_blob(container, &blob_key, body, encoding::CONTENT_TYPE) {
            Ok(()) => {
                self.reporter.info(DataSource::Azure, Some(&blob_key), "[AZURE] Success.");
                Ok(SaveOutcome::Replicated { path, blob_key, rows })
            }
            Err(e) => {
                self.reporter.error(
                    DataSource::Azure,
                    Some(&blob_key),
                    &format!("[AZURE] Upload failed: {}", e),
                );
                Ok(SaveOutcome::CloudFailed {
                    path,
                    blob_key,
                    rows,
                    error: e.to_string(),
                })
            }
        }
    }

    fn write_local(&self, entity_name: &str, filename: &str, body: &[u8]) -> Result<PathBuf, SinkError> {
        let dir = self.raw_path.join(entity_name);
        fs::create_dir_all(&dir).map_err(|source| SinkError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = dir.join(filename);
        fs::write(&path, body).map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;

        self.reporter.info(
            DataSource::Local,
            Some(&path.display().to_string()),
            &format!("[LOCAL] File saved: {}", path.display()),
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, RecordingReporter};
    use crate::model::Row;
    use azure::BlobError;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Uploads = Rc<RefCell<Vec<(String, String, Vec<u8>)>>>;

    #[derive(Clone, Default)]
    struct MemoryStore {
        uploads: Uploads,
        fail: bool,
    }

    impl BlobStore for MemoryStore {
        fn put_blob(&self, container: &str, key: &str, body: Vec<u8>, _content_type: &str) -> Result<(), BlobError> {
            if self.fail {
                return Err(BlobError::Storage(opendal::Error::new(
                    opendal::ErrorKind::PermissionDenied,
                    "AuthenticationFailed",
                )));
            }
            self.uploads
                .borrow_mut()
                .push((container.to_string(), key.to_string(), body));
            Ok(())
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// One row per month from 1994-02-01 to 2024-01-01.
    fn monthly_table() -> TimeSeriesTable {
        let mut rows = Vec::new();
        let mut date = day(1994, 2, 1);
        while date <= day(2024, 1, 31) {
            rows.push(Row { date, values: vec![Some(date.to_string().len() as f64)] });
            date = date.checked_add_months(chrono::Months::new(1)).unwrap();
        }
        TimeSeriesTable::new(vec!["66945000".to_string()], rows).unwrap()
    }

    fn config_for(dir: &std::path::Path, start: NaiveDate, end: NaiveDate) -> PipelineConfig {
        PipelineConfig {
            raw_path: dir.to_path_buf(),
            start_date: start,
            end_date: end,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_filter_by_date_keeps_inclusive_window_in_order() {
        let range = DateRange::new(day(2000, 1, 1), day(2010, 12, 31)).unwrap();
        let filtered = filter_by_date(Some(monthly_table()), range).unwrap();

        assert_eq!(filtered.len(), 11 * 12);
        assert_eq!(filtered.rows().first().map(|r| r.date), Some(day(2000, 1, 1)));
        assert_eq!(filtered.rows().last().map(|r| r.date), Some(day(2010, 12, 1)));
        assert!(filtered.rows().windows(2).all(|w| w[0].date < w[1].date));
        assert!(filtered.rows().iter().all(|r| range.contains(r.date)));
    }

    #[test]
    fn test_filter_by_date_passes_absent_and_empty_through() {
        let range = DateRange::new(day(2000, 1, 1), day(2000, 1, 2)).unwrap();
        assert_eq!(filter_by_date(None, range), None);

        let empty = TimeSeriesTable::new(vec!["x".to_string()], Vec::new()).unwrap();
        assert_eq!(filter_by_date(Some(empty.clone()), range), Some(empty));
    }

    #[test]
    fn test_blob_path_layout() {
        assert_eq!(
            blob_path("flow", day(2026, 10, 16), "thesis_flow_data.csv"),
            "ana/flow/load_date=2026-10-16/thesis_flow_data.csv"
        );
    }

    #[test]
    fn test_empty_table_writes_nothing_anywhere() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), day(1994, 2, 1), day(2024, 1, 31));
        let reporter = RecordingReporter::new();
        let store = MemoryStore::default();
        let loader = DataLoader::new(&config, CloudSink::blob(store.clone(), "c"), &reporter).unwrap();

        let empty = TimeSeriesTable::new(vec!["x".to_string()], Vec::new()).unwrap();
        assert_eq!(loader.save_data(Some(&empty), "flow", "f.csv").unwrap(), SaveOutcome::Skipped);
        assert_eq!(loader.save_data(None, "flow", "f.csv").unwrap(), SaveOutcome::Skipped);

        assert!(!dir.path().join("flow").exists());
        assert!(store.uploads.borrow().is_empty());
        assert_eq!(reporter.messages_at(LogLevel::Warning)[0], "No data to save for f.csv.");
    }

    #[test]
    fn test_local_only_mode_writes_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), day(2000, 1, 1), day(2000, 12, 31));
        let reporter = RecordingReporter::new();
        let loader = DataLoader::new(&config, CloudSink::Disabled, &reporter).unwrap();

        let outcome = loader.save_data(Some(&monthly_table()), "flow", "f.csv").unwrap();

        let path = dir.path().join("flow/f.csv");
        assert_eq!(outcome, SaveOutcome::LocalOnly { path: path.clone(), rows: 12 });
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 13);
        assert!(text.starts_with("date,66945000\n2000-01-01,"));
        assert!(reporter.events().iter().all(|e| e.source != DataSource::Azure));
    }

    #[test]
    fn test_cloud_sink_receives_identical_bytes_under_partition_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), day(2000, 1, 1), day(2000, 6, 30));
        let reporter = RecordingReporter::new();
        let store = MemoryStore::default();
        let loader =
            DataLoader::new(&config, CloudSink::blob(store.clone(), "hidropipeline-raw"), &reporter).unwrap();

        let outcome = loader
            .save_data_on(Some(&monthly_table()), "rainfall", "r.csv", day(2026, 10, 16))
            .unwrap();

        let key = "ana/rainfall/load_date=2026-10-16/r.csv".to_string();
        let path = dir.path().join("rainfall/r.csv");
        assert_eq!(
            outcome,
            SaveOutcome::Replicated { path: path.clone(), blob_key: key.clone(), rows: 6 }
        );

        let uploads = store.uploads.borrow();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "hidropipeline-raw");
        assert_eq!(uploads[0].1, key);
        assert_eq!(uploads[0].2, fs::read(&path).unwrap());
    }

    #[test]
    fn test_upload_failure_keeps_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), day(1994, 2, 1), day(2024, 1, 31));
        let reporter = RecordingReporter::new();
        let store = MemoryStore { fail: true, ..MemoryStore::default() };
        let loader = DataLoader::new(&config, CloudSink::blob(store, "c"), &reporter).unwrap();

        let outcome = loader
            .save_data_on(Some(&monthly_table()), "flow", "f.csv", day(2026, 10, 16))
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::CloudFailed { rows: 360, .. }));
        assert!(dir.path().join("flow/f.csv").is_file());
        let errors = reporter.messages_at(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("[AZURE] Upload failed: blob storage request failed"));
        assert!(errors[0].contains("AuthenticationFailed"));
    }

    #[test]
    fn test_rerun_overwrites_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), day(1994, 2, 1), day(2024, 1, 31));
        let reporter = RecordingReporter::new();
        let loader = DataLoader::new(&config, CloudSink::Disabled, &reporter).unwrap();
        let path = dir.path().join("flow/f.csv");

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale").unwrap();
        loader.save_data(Some(&monthly_table()), "flow", "f.csv").unwrap();

        assert!(fs::read_to_string(&path).unwrap().starts_with("date,"));
    }

    #[test]
    fn test_bad_connection_string_falls_back_to_local_only() {
        let reporter = RecordingReporter::new();
        let config = PipelineConfig {
            azure_conn_string: Some("garbage".to_string()),
            ..PipelineConfig::default()
        };

        let sink = CloudSink::from_config(&config, &reporter);

        assert!(!sink.is_enabled());
        assert!(reporter.messages_at(LogLevel::Error)[0].starts_with("Failed to connect to Azure:"));
    }

    #[test]
    fn test_no_connection_string_is_silent_local_only() {
        let reporter = RecordingReporter::new();
        let sink = CloudSink::from_config(&PipelineConfig::default(), &reporter);
        assert!(!sink.is_enabled());
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_valid_connection_string_enables_cloud() {
        let reporter = RecordingReporter::new();
        let config = PipelineConfig {
            azure_conn_string: Some("UseDevelopmentStorage=true".to_string()),
            ..PipelineConfig::default()
        };
        assert!(CloudSink::from_config(&config, &reporter).is_enabled());
    }
}
