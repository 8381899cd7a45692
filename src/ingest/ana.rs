/// ANA HidroWeb Data API Client
///
/// Retrieves historical daily series from the National Water Agency's
/// `ServiceANA.asmx/HidroSerieHistorica` endpoint. The service answers in
/// XML with one `SerieHistorica` record per station, month and consistency
/// level; each record carries up to 31 per-day values named `Vazao01`..`Vazao31`
/// (discharge) or `Chuva01`..`Chuva31` (precipitation).
///
/// API Documentation: http://telemetriaws1.ana.gov.br/ServiceANA.asmx

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::ingest::TimeSeriesSource;
use crate::model::{Dataset, FetchError, TimeSeriesTable};

const RECORD_ELEMENT: &str = "SerieHistorica";
const FIELD_CONSISTENCY: &str = "NivelConsistencia";
const FIELD_DATE: &str = "DataHora";

/// Daily values for one station, keyed by date.
pub type StationSeries = BTreeMap<NaiveDate, Option<f64>>;

// ============================================================================
// API Client
// ============================================================================

pub struct AnaClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl AnaClient {
    /// `timeout` bounds each HTTP call; a hung request fails the attempt
    /// instead of stalling the run.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full history for one station. Empty when the service has no records.
    pub fn fetch_station(&self, dataset: Dataset, station: &str) -> Result<StationSeries, FetchError> {
        let url = format!("{}/HidroSerieHistorica", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("codEstacao", station),
                ("dataInicio", ""),
                ("dataFim", ""),
                ("tipoDados", dataset.ana_data_type()),
                ("nivelConsistencia", ""),
            ])
            .send()?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                station: station.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text()?;
        parse_serie_historica(&body, dataset, station)
    }
}

impl TimeSeriesSource for AnaClient {
    /// Stations are fetched one after another and outer-joined on date.
    /// Returns `None` when no station has any record.
    fn fetch(&self, dataset: Dataset, stations: &[String]) -> Result<Option<TimeSeriesTable>, FetchError> {
        let mut series = Vec::with_capacity(stations.len());
        let mut any_data = false;

        for station in stations {
            let values = self.fetch_station(dataset, station)?;
            any_data |= !values.is_empty();
            series.push((station.clone(), values));
        }

        Ok(any_data.then(|| TimeSeriesTable::from_station_series(series)))
    }
}

// ============================================================================
// XML parsing
// ============================================================================

/// Expand a `HidroSerieHistorica` response into daily values.
///
/// Every record becomes one entry per calendar day of its month. Missing,
/// blank or non-numeric values become `None`. When the same day appears at
/// several consistency levels the highest level wins (2 = consisted beats
/// 1 = raw); ties go to the later record.
pub fn parse_serie_historica(
    xml: &str,
    dataset: Dataset,
    station: &str,
) -> Result<StationSeries, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut best: BTreeMap<NaiveDate, (u8, Option<f64>)> = BTreeMap::new();
    let mut record: Option<HashMap<String, String>> = None;
    let mut field: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = e.local_name();
                let name = String::from_utf8_lossy(local.as_ref());
                if name == RECORD_ELEMENT {
                    record = Some(HashMap::new());
                } else if record.is_some() {
                    field = Some(name.into_owned());
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(fields), Some(name)) = (record.as_mut(), field.as_ref()) {
                    let text = t.unescape().map_err(|e| FetchError::Xml(e.to_string()))?;
                    fields.insert(name.clone(), text.into_owned());
                }
            }
            Ok(Event::End(e)) => {
                let local = e.local_name();
                if local.as_ref() == RECORD_ELEMENT.as_bytes() {
                    if let Some(fields) = record.take() {
                        merge_record(&mut best, &fields, dataset, station)?;
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(FetchError::Xml(e.to_string())),
        }
    }

    Ok(best.into_iter().map(|(date, (_, value))| (date, value)).collect())
}

fn merge_record(
    best: &mut BTreeMap<NaiveDate, (u8, Option<f64>)>,
    fields: &HashMap<String, String>,
    dataset: Dataset,
    station: &str,
) -> Result<(), FetchError> {
    let invalid = |field: &'static str, value: &str| FetchError::InvalidField {
        station: station.to_string(),
        field,
        value: value.to_string(),
    };

    let raw_level = fields.get(FIELD_CONSISTENCY).map(String::as_str).unwrap_or("");
    let level: u8 = raw_level
        .trim()
        .parse()
        .map_err(|_| invalid(FIELD_CONSISTENCY, raw_level))?;

    let raw_date = fields.get(FIELD_DATE).map(String::as_str).unwrap_or("");
    let month_start = parse_month_start(raw_date).ok_or_else(|| invalid(FIELD_DATE, raw_date))?;

    for day in 1..=days_in_month(month_start) {
        let Some(date) = month_start.with_day(day) else {
            continue;
        };
        let key = format!("{}{:02}", dataset.value_prefix(), day);
        let value = fields.get(&key).and_then(|v| parse_value(v));

        match best.get(&date) {
            Some((existing, _)) if *existing > level => {}
            _ => {
                best.insert(date, (level, value));
            }
        }
    }
    Ok(())
}

/// `DataHora` looks like `1994-02-01 00:00:00`; only the year and month matter.
fn parse_month_start(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().get(..10)?;
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    date.with_day(1)
}

fn days_in_month(month_start: NaiveDate) -> u32 {
    let (year, month) = if month_start.month() == 12 {
        (month_start.year() + 1, 1)
    } else {
        (month_start.year(), month_start.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', ".").parse().ok()
}
