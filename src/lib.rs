//! # DRIC Check
//!
//! Decides, for each publication of an academic period, whether its full text
//! explicitly acknowledges funding or support from the Directorate of
//! Research, Innovation and Consultancy (DRIC) of the University of Cape
//! Coast. Every record ends with one of three labels: YES, NO or NF (full
//! text not obtainable).
//!
//! ## Architecture
//!
//! - [`resolve`]: search-engine result page to best full-text URL
//! - [`fetch`]: paced, retrying content fetch behind a black-box service
//! - [`classify`]: strict YES/NO classification behind a black-box service
//! - [`pipeline`]: per-record state machine and run driver
//! - [`store`]: CSV input and the crash-safe, resumable result file
//! - [`discovery`]: pure helpers around the upstream discovery stage
//! - [`models`]: records, labels and intermediate results
//! - [`config`]: layered configuration
//! - [`utils`]: HTTP client, retry and pacing
//! - [`ui`]: progress bar and summary tables for the CLI

pub mod classify;
pub mod config;
pub mod discovery;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod resolve;
pub mod store;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use models::{Label, OutputRow, PublicationRecord};
pub use pipeline::{Pipeline, RunContext, RunSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
