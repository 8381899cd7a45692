//! End-to-end run: flow, then rainfall.
//!
//! Exhausted retries end the run. A local save failure is reported and the
//! next dataset still runs. Upload failures never surface as errors here;
//! they are part of the `SaveOutcome`.

use thiserror::Error;

use crate::config::{ConfigError, PipelineConfig};
use crate::ingest::{Extractor, TimeSeriesSource};
use crate::load::{CloudSink, DataLoader, SaveOutcome, SinkError};
use crate::logging::{self, DataSource, Reporter};
use crate::model::{Dataset, FetchError};

/// Order in which datasets are processed.
pub const DATASETS: [Dataset; 2] = [Dataset::Flow, Dataset::Rainfall];

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to prepare local storage: {0}")]
    Storage(#[source] std::io::Error),
    #[error("failed to build HidroWeb client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("{dataset} extraction failed: {source}")]
    Extraction {
        dataset: Dataset,
        #[source]
        source: FetchError,
    },
}

/// Result of saving one dataset.
#[derive(Debug)]
pub struct DatasetReport {
    pub dataset: Dataset,
    pub outcome: Result<SaveOutcome, SinkError>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<DatasetReport>,
}

impl RunSummary {
    pub fn saved(&self) -> usize {
        self.count(|o| {
            matches!(o, Ok(SaveOutcome::LocalOnly { .. }) | Ok(SaveOutcome::Replicated { .. }))
        })
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Ok(SaveOutcome::Skipped)))
    }

    /// Local write errors and failed uploads.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Err(_) | Ok(SaveOutcome::CloudFailed { .. })))
    }

    pub fn report(&self, dataset: Dataset) -> Option<&DatasetReport> {
        self.reports.iter().find(|r| r.dataset == dataset)
    }

    fn count(&self, pred: impl Fn(&Result<SaveOutcome, SinkError>) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Extract and save every dataset in `DATASETS` order.
pub fn run(
    config: &PipelineConfig,
    source: &dyn TimeSeriesSource,
    cloud: CloudSink,
    reporter: &dyn Reporter,
) -> Result<RunSummary, PipelineError> {
    let extractor = Extractor::new(config, source, reporter).map_err(PipelineError::Storage)?;
    let loader = DataLoader::new(config, cloud, reporter)?;
    let mut summary = RunSummary::default();

    for dataset in DATASETS {
        let table = extractor
            .run_extraction(dataset)
            .map_err(|source| PipelineError::Extraction { dataset, source })?;

        let outcome = loader.save_data(table.as_ref(), dataset.entity_name(), dataset.default_filename());
        if let Err(e) = &outcome {
            reporter.error(
                DataSource::Local,
                Some(dataset.entity_name()),
                &format!("Saving {} failed: {}", dataset, e),
            );
        }
        summary.reports.push(DatasetReport { dataset, outcome });
    }

    logging::log_run_summary(reporter, summary.saved(), summary.skipped(), summary.failed());
    Ok(summary)
}
