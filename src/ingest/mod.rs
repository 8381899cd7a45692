//! Extraction side of the pipeline.
//!
//! `TimeSeriesSource` is the only thing the pipeline asks of an upstream:
//! give me the series for these stations, or tell me there is none.
//! `Extractor` wraps every fetch in the configured `RetryPolicy`.
//!
//! Submodules:
//! - `ana`: HidroWeb client, the production source.

pub mod ana;

use std::fs;
use std::io;

use crate::config::PipelineConfig;
use crate::logging::{DataSource, Reporter};
use crate::model::{Dataset, FetchError, TimeSeriesTable};
use crate::retry::RetryPolicy;

/// An upstream that returns a date-indexed table for a group of stations.
///
/// `Ok(None)` and `Ok(Some(empty))` both mean "no data", which is not an
/// error. Implementations are called again on retry, so they must be
/// read-only.
pub trait TimeSeriesSource {
    fn fetch(&self, dataset: Dataset, stations: &[String]) -> Result<Option<TimeSeriesTable>, FetchError>;
}

pub struct Extractor<'a> {
    config: &'a PipelineConfig,
    source: &'a dyn TimeSeriesSource,
    reporter: &'a dyn Reporter,
    retry: RetryPolicy,
}

impl<'a> Extractor<'a> {
    /// Creates `<raw_path>/flow` and `<raw_path>/rainfall` up front.
    pub fn new(
        config: &'a PipelineConfig,
        source: &'a dyn TimeSeriesSource,
        reporter: &'a dyn Reporter,
    ) -> io::Result<Self> {
        for dataset in [Dataset::Flow, Dataset::Rainfall] {
            fs::create_dir_all(config.raw_path.join(dataset.entity_name()))?;
        }
        Ok(Self {
            config,
            source,
            reporter,
            retry: config.retry_policy(),
        })
    }

    pub fn run_flow_extraction(&self) -> Result<Option<TimeSeriesTable>, FetchError> {
        self.run_extraction(Dataset::Flow)
    }

    pub fn run_rain_extraction(&self) -> Result<Option<TimeSeriesTable>, FetchError> {
        self.run_extraction(Dataset::Rainfall)
    }

    /// Fetch one dataset for its configured stations, retrying on any error.
    pub fn run_extraction(&self, dataset: Dataset) -> Result<Option<TimeSeriesTable>, FetchError> {
        let stations = self.config.stations(dataset);
        let operation = format!("fetch_{}", dataset.entity_name());
        self.reporter.debug(
            DataSource::Ana,
            Some(dataset.entity_name()),
            &format!("Stations: {}", stations.join(", ")),
        );

        let table = self.retry.run(&operation, self.reporter, || {
            self.reporter.info(
                DataSource::Ana,
                None,
                &format!("Starting download for {} {} stations...", stations.len(), dataset),
            );
            self.source.fetch(dataset, stations)
        })?;

        match &table {
            Some(t) if !t.is_empty() => self.reporter.info(
                DataSource::Ana,
                None,
                &format!("Success: Retrieved {} records for {}.", t.len(), dataset),
            ),
            _ => self.reporter.warn(
                DataSource::Ana,
                None,
                &format!("API returned empty data for {}.", dataset),
            ),
        }

        Ok(table)
    }
}
