//! Station registry for the ANA ingest pipeline.
//!
//! Defines the default HidroWeb stations downloaded when the configuration
//! does not name its own, plus the station-code format check used by config
//! validation. Fluviometric (flow) stations carry 8-digit codes; pluviometric
//! (rainfall) stations carry 7- or 8-digit codes.

use crate::model::Dataset;

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// A single HidroWeb monitoring point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Station {
    /// ANA station code.
    pub code: &'static str,
    /// Which series this station is downloaded for.
    pub dataset: Dataset,
}

/// Default stations, flow first then rainfall.
pub static STATION_REGISTRY: &[Station] = &[
    Station { code: "66945000", dataset: Dataset::Flow },
    Station { code: "66941000", dataset: Dataset::Flow },
    Station { code: "66926000", dataset: Dataset::Flow },
    Station { code: "1954002", dataset: Dataset::Rainfall },
    Station { code: "2054005", dataset: Dataset::Rainfall },
    Station { code: "2054019", dataset: Dataset::Rainfall },
];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Default station codes for one dataset, in registry order.
pub fn default_codes(dataset: Dataset) -> Vec<String> {
    STATION_REGISTRY
        .iter()
        .filter(|s| s.dataset == dataset)
        .map(|s| s.code.to_string())
        .collect()
}

/// `true` if `code` looks like an ANA station code: 7 or 8 ASCII digits.
pub fn is_valid_station_code(code: &str) -> bool {
    (7..=8).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_digit())
}
