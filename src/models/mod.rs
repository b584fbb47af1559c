//! Core data models for publication records and per-record outcomes.

mod outcome;
mod record;

pub use outcome::{FetchResult, FetchStatus, LinkOrigin, ResolvedLink};
pub use record::{Label, OutputRow, PublicationRecord, Verdict};
