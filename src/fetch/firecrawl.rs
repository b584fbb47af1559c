//! Firecrawl scrape API as the content service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{ContentService, FetchError};
use crate::config::FetchConfig;
use crate::utils::{retry_after_secs, HttpClient};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'a str; 1],
    timeout: u64,
    block_ads: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Scrapes pages and documents to markdown through Firecrawl
#[derive(Debug, Clone)]
pub struct FirecrawlService {
    client: HttpClient,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    wait_for: Duration,
}

impl FirecrawlService {
    pub fn new(config: &FetchConfig, api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        let timeout = config.request_timeout();
        // the HTTP call has to outlive the scrape budget we hand to the service
        let client = HttpClient::with_timeout(timeout + Duration::from_secs(15))?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/scrape", config.firecrawl_url.trim_end_matches('/')),
            api_key: api_key.into(),
            timeout,
            wait_for: Duration::from_millis(config.wait_for_ms),
        })
    }

    fn request_body<'a>(&self, url: &'a Url) -> ScrapeRequest<'a> {
        let is_pdf = url.path().to_ascii_lowercase().ends_with(".pdf");
        ScrapeRequest {
            url: url.as_str(),
            formats: ["markdown"],
            timeout: self.timeout.as_millis() as u64,
            block_ads: false,
            wait_for: (!is_pdf).then(|| self.wait_for.as_millis() as u64),
        }
    }
}

#[async_trait]
impl ContentService for FirecrawlService {
    fn name(&self) -> &str {
        "firecrawl"
    }

    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(url))
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            return Err(FetchError::from_status(status, retry_after));
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Unreadable(format!("malformed scrape response: {}", e)))?;

        if !body.success {
            return Err(FetchError::Unreadable(
                body.error.unwrap_or_else(|| "scrape reported failure".to_string()),
            ));
        }

        Ok(body
            .data
            .and_then(|data| data.markdown.or(data.text))
            .unwrap_or_default())
    }
}
