//! Transient per-record results of link resolution and content fetching.

use serde::{Deserialize, Serialize};
use url::Url;

/// Which step of the resolver produced a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkOrigin {
    /// The title hyperlink of the search-result page
    MainTitleLink,
    /// A link found in the citation table of the search-result page
    CitationTableLink,
    /// A file link taken from an institutional-repository item page
    RepositoryFileLink,
}

impl std::fmt::Display for LinkOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LinkOrigin::MainTitleLink => "main title link",
            LinkOrigin::CitationTableLink => "citation table link",
            LinkOrigin::RepositoryFileLink => "repository file link",
        };
        f.write_str(name)
    }
}

/// Best candidate full-text URL for a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub url: Url,
    pub origin: LinkOrigin,
}

impl ResolvedLink {
    pub fn new(url: Url, origin: LinkOrigin) -> Self {
        Self { url, origin }
    }
}

/// Outcome category of a content fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchStatus {
    Ok,
    Timeout,
    RateLimited,
    NotFound,
    Unreadable,
}

/// Result of fetching one URL. `text` is present only when `status` is `Ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub status: FetchStatus,
    text: Option<String>,
}

impl FetchResult {
    /// Successful fetch. Empty or whitespace-only text is downgraded to
    /// `Unreadable`.
    pub fn ok(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            return Self::failed(FetchStatus::Unreadable);
        }
        Self {
            status: FetchStatus::Ok,
            text: Some(text),
        }
    }

    /// Failed fetch with the given status
    pub fn failed(status: FetchStatus) -> Self {
        debug_assert!(status != FetchStatus::Ok);
        Self { status, text: None }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FetchStatus::Ok
    }

    /// The fetched text, if any
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_is_unreadable() {
        let result = FetchResult::ok("  \n\t ");
        assert_eq!(result.status, FetchStatus::Unreadable);
        assert!(result.text().is_none());
        assert!(!result.is_ok());
    }

    #[test]
    fn test_ok_keeps_text() {
        let result = FetchResult::ok("Acknowledgements ...");
        assert!(result.is_ok());
        assert_eq!(result.text(), Some("Acknowledgements ..."));
    }
}
