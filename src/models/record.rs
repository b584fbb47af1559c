//! Input and output rows of a classification run.

use serde::{Deserialize, Serialize};

/// A publication candidate produced by the upstream discovery stage.
///
/// One record per row of the input table. Row order is significant: it is the
/// key used by the resumable output store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicationRecord {
    /// Author string as captured upstream (not normalised)
    pub authors: String,

    /// Publication title
    pub title: String,

    /// Publication year
    pub year: i32,

    /// Link to the search-engine result page for this publication
    #[serde(alias = "scholar_link", alias = "link")]
    pub source_link: String,
}

impl PublicationRecord {
    /// Create a new record
    pub fn new(
        authors: impl Into<String>,
        title: impl Into<String>,
        year: i32,
        source_link: impl Into<String>,
    ) -> Self {
        Self {
            authors: authors.into(),
            title: title.into(),
            year,
            source_link: source_link.into(),
        }
    }

    /// Title shortened for log lines
    pub fn short_title(&self) -> String {
        const MAX: usize = 60;
        if self.title.chars().count() <= MAX {
            self.title.clone()
        } else {
            let head: String = self.title.chars().take(MAX).collect();
            format!("{}...", head)
        }
    }
}

/// Answer of the text classifier. It never says "not found".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Yes,
    No,
}

/// Final label written for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    /// Text explicitly acknowledges the office
    Yes,
    /// Text was read and contains no explicit acknowledgement
    No,
    /// No usable text could be obtained
    Nf,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Yes => "YES",
            Label::No => "NO",
            Label::Nf => "NF",
        }
    }
}

impl From<Verdict> for Label {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Yes => Label::Yes,
            Verdict::No => Label::No,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the output table. Row `i` corresponds to input row `i`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRow {
    pub authors: String,
    pub title: String,
    pub year: i32,
    pub dric: Label,
}

impl OutputRow {
    /// Column names, in file order
    pub const HEADER: [&'static str; 4] = ["authors", "title", "year", "dric"];

    /// Build the output row for a record
    pub fn from_record(record: &PublicationRecord, dric: Label) -> Self {
        Self {
            authors: record.authors.clone(),
            title: record.title.clone(),
            year: record.year,
            dric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_from_verdict() {
        assert_eq!(Label::from(Verdict::Yes), Label::Yes);
        assert_eq!(Label::from(Verdict::No), Label::No);
    }

    #[test]
    fn test_label_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Label::Nf).unwrap(), "\"NF\"");
        assert_eq!(Label::Yes.to_string(), "YES");
    }

    #[test]
    fn test_record_accepts_scholar_link_column() {
        let data = "authors,title,year,scholar_link\nA Mensah,Study X,2017,https://scholar.google.com/x\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let record: PublicationRecord = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(record.title, "Study X");
        assert_eq!(record.year, 2017);
        assert_eq!(record.source_link, "https://scholar.google.com/x");
    }

    #[test]
    fn test_short_title() {
        let record = PublicationRecord::new("A", "x".repeat(80), 2020, "l");
        assert_eq!(record.short_title().chars().count(), 63);
        assert!(record.short_title().ends_with("..."));

        let record = PublicationRecord::new("A", "Short", 2020, "l");
        assert_eq!(record.short_title(), "Short");
    }
}
