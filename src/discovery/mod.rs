//! Helpers around the upstream discovery stage.
//!
//! Discovery itself (searching a scholarly index for an awardee's papers) is
//! not performed here; these are the pure pieces around it: author-name
//! query expansion, academic-period parsing, the conventional data layout and
//! removal of duplicate candidate rows.

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::models::PublicationRecord;

/// Errors from period handling
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Cannot determine year(s) from period '{0}', expected YYYY or YYYY-YYYY")]
    NoYearInPeriod(String),
}

/// Search strings covering common variants of an author's name.
///
/// For "Festus Kwame Anyan" this yields, in order: the full name,
/// "F Anyan", "K Anyan", "FK Anyan" and "Festus KA". Duplicates are dropped.
pub fn build_queries(full_name: &str) -> Vec<String> {
    let full_name = full_name.trim();
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    let (Some(first), Some(last)) = (parts.first(), parts.last()) else {
        return vec![full_name.to_string()];
    };
    let middles = if parts.len() > 2 {
        &parts[1..parts.len() - 1]
    } else {
        &[][..]
    };

    let middle_initials: String = middles.iter().filter_map(|m| initial(m)).collect();

    let mut queries = vec![full_name.to_string()];
    if let Some(f) = initial(first) {
        queries.push(format!("{} {}", f, last));
    }
    for middle in middles {
        if let Some(m) = initial(middle) {
            queries.push(format!("{} {}", m, last));
        }
    }
    if let Some(f) = initial(first) {
        queries.push(format!("{}{} {}", f, middle_initials, last));
    }
    if !middles.is_empty() {
        if let Some(l) = initial(last) {
            queries.push(format!("{} {}{}", first, middle_initials, l));
        }
    }

    let mut seen = HashSet::new();
    queries.retain(|query| seen.insert(query.clone()));
    queries
}

fn initial(word: &str) -> Option<char> {
    word.chars().next()
}

/// Inclusive year bounds of an academic period such as "2016-2017",
/// "2015/2016" or "2020"
pub fn parse_period(period: &str) -> Result<(i32, i32), DiscoveryError> {
    let no_year = || DiscoveryError::NoYearInPeriod(period.to_string());
    let pattern = Regex::new(r"\d{4}").map_err(|_| no_year())?;
    let years: Vec<i32> = pattern
        .find_iter(period)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    match (years.iter().min(), years.iter().max()) {
        (Some(min), Some(max)) => Ok((*min, *max)),
        _ => Err(no_year()),
    }
}

/// Input and output files of one period under a data root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodPaths {
    /// `Data/<period>/raw_publications.csv`
    pub input: PathBuf,
    /// `Data/<period>/preprocessed_files/rsg_<period>_preprocessed.csv`
    pub output: PathBuf,
}

pub fn period_paths(data_dir: &Path, period: &str) -> PeriodPaths {
    let period_dir = data_dir.join(period);
    PeriodPaths {
        input: period_dir.join("raw_publications.csv"),
        output: period_dir
            .join("preprocessed_files")
            .join(format!("rsg_{}_preprocessed.csv", period)),
    }
}

/// Drop rows identical in every column, keeping the first occurrence
pub fn dedup_records(records: Vec<PublicationRecord>) -> Vec<PublicationRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.clone()))
        .collect()
}
