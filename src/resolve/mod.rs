//! Link resolution: from a search-engine result page to a full-text URL.
//!
//! Candidates are tried in a fixed order:
//!
//! 1. the title hyperlink of the result page,
//! 2. the first usable link in the page's citation table.
//!
//! Whichever candidate wins, if it points at an institutional-repository item
//! page (`.../xmlui/handle/...`) the item page is opened and its first file
//! link replaces the handle URL.
//!
//! A link is *usable* when it is an absolute `http(s)` URL that does not lead
//! back to the search engine. Every way of not finding one is reported as a
//! [`ResolveError`]; callers turn that into an NF label.

mod page;

pub use page::{HttpPageSource, Page, PageSource};

use scraper::{Html, Selector};
use std::sync::Arc;
use url::Url;

use crate::config::ResolverConfig;
use crate::models::{LinkOrigin, PublicationRecord, ResolvedLink};

/// Title hyperlink on a result page
const TITLE_LINK_SELECTOR: &str = "#gsc_oci_title a";

/// Links inside the citation table values
const CITATION_TABLE_SELECTOR: &str = "#gsc_oci_table .gsc_oci_value a";

/// File links on a repository item page, most specific first
const REPOSITORY_FILE_SELECTORS: [&str; 2] = [
    "#aspect_artifactbrowser_ItemViewer_div_item-view .file-list .file-link a",
    ".file-list .file-link a",
];

/// Reasons a record's full-text link could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Invalid source link '{0}'")]
    InvalidSourceLink(String),

    #[error("Page {url} unavailable: {reason}")]
    PageUnavailable { url: String, reason: String },

    #[error("No usable link on result page")]
    NoUsableLink,

    #[error("Every link on result page loops back to the search engine")]
    LoopsToSearchEngine,

    #[error("No file link on repository item page {0}")]
    RepositoryWithoutFile(String),
}

/// True when `url` belongs to the search engine that produced the result page
pub fn is_search_engine_url(url: &Url, search_engine_hosts: &[String]) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    search_engine_hosts
        .iter()
        .any(|marker| host.contains(&marker.to_ascii_lowercase()))
}

/// True when `url` is an institutional-repository item (handle) page
pub fn is_repository_handle(url: &Url, handle_marker: &str) -> bool {
    !handle_marker.is_empty() && url.path().contains(handle_marker)
}

/// URL predicates used while resolving
#[derive(Debug, Clone)]
pub struct LinkRules {
    search_engine_hosts: Vec<String>,
    handle_marker: String,
}

impl LinkRules {
    pub fn new(search_engine_hosts: Vec<String>, handle_marker: impl Into<String>) -> Self {
        Self {
            search_engine_hosts,
            handle_marker: handle_marker.into(),
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(
            config.search_engine_hosts.clone(),
            config.repository_handle_marker.clone(),
        )
    }

    pub fn is_search_engine_url(&self, url: &Url) -> bool {
        is_search_engine_url(url, &self.search_engine_hosts)
    }

    pub fn is_repository_handle(&self, url: &Url) -> bool {
        is_repository_handle(url, &self.handle_marker)
    }

    /// Absolute web URL that does not point back to the search engine
    pub fn is_usable(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https") && !self.is_search_engine_url(url)
    }
}

impl Default for LinkRules {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

/// Resolves records to full-text links
#[derive(Debug, Clone)]
pub struct LinkResolver {
    pages: Arc<dyn PageSource>,
    rules: LinkRules,
}

impl LinkResolver {
    pub fn new(pages: Arc<dyn PageSource>, rules: LinkRules) -> Self {
        Self { pages, rules }
    }

    /// Resolve the best candidate full-text URL for `record`
    pub async fn resolve(&self, record: &PublicationRecord) -> Result<ResolvedLink, ResolveError> {
        let source = Url::parse(record.source_link.trim())
            .map_err(|_| ResolveError::InvalidSourceLink(record.source_link.clone()))?;

        tracing::debug!("Opening result page {}", source);
        let page = self.pages.load(&source).await?;

        let candidate = {
            let document = Html::parse_document(&page.html);
            select_candidate(&document, &page.url, &self.rules)?
        };

        if self.rules.is_repository_handle(&candidate.url) {
            tracing::info!(
                "Repository item page found via {}, looking for file link: {}",
                candidate.origin,
                candidate.url
            );
            return self.follow_repository(&candidate.url).await;
        }

        Ok(candidate)
    }

    async fn follow_repository(&self, handle: &Url) -> Result<ResolvedLink, ResolveError> {
        let page = self.pages.load(handle).await?;
        let document = Html::parse_document(&page.html);

        let file_url = repository_file_link(&document, &page.url)
            .filter(|url| self.rules.is_usable(url))
            .ok_or_else(|| ResolveError::RepositoryWithoutFile(handle.to_string()))?;

        tracing::info!("Resolved repository file link: {}", file_url);
        Ok(ResolvedLink::new(file_url, LinkOrigin::RepositoryFileLink))
    }
}

/// Pick the main title link, else the first usable citation-table link
fn select_candidate(
    document: &Html,
    base: &Url,
    rules: &LinkRules,
) -> Result<ResolvedLink, ResolveError> {
    let mut loops_back = false;

    match first_href(document, TITLE_LINK_SELECTOR, base) {
        Some(url) if rules.is_usable(&url) => {
            return Ok(ResolvedLink::new(url, LinkOrigin::MainTitleLink));
        }
        Some(url) => {
            loops_back |= rules.is_search_engine_url(&url);
            tracing::info!("Title link unusable or loops back to the search engine: {}", url);
        }
        None => tracing::info!("No title link on result page {}", base),
    }

    for url in hrefs(document, CITATION_TABLE_SELECTOR, base) {
        if rules.is_usable(&url) {
            tracing::info!("Using citation table link: {}", url);
            return Ok(ResolvedLink::new(url, LinkOrigin::CitationTableLink));
        }
        loops_back |= rules.is_search_engine_url(&url);
    }

    if loops_back {
        Err(ResolveError::LoopsToSearchEngine)
    } else {
        Err(ResolveError::NoUsableLink)
    }
}

/// First file entry of a repository item page, made absolute against `base`
fn repository_file_link(document: &Html, base: &Url) -> Option<Url> {
    REPOSITORY_FILE_SELECTORS
        .iter()
        .find_map(|selector| first_href(document, selector, base))
}

fn first_href(document: &Html, selector: &str, base: &Url) -> Option<Url> {
    hrefs(document, selector, base).into_iter().next()
}

/// All `href`s matched by `selector`, joined onto `base`; unparsable ones are skipped
fn hrefs(document: &Html, selector: &str, base: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| base.join(href).ok())
        .collect()
}
