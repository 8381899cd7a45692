//! ANA hydrological ingest pipeline.
//!
//! Downloads daily river-flow and rainfall series from the HidroWeb service,
//! trims them to a configured date window, and stores them as CSV on local
//! disk and, optionally, in Azure Blob Storage under a `load_date=` partition.

pub mod config;
pub mod ingest;
pub mod load;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod retry;
pub mod stations;
