//! Loading result and repository pages.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::ResolveError;
use crate::utils::{HttpClient, Pacer};

/// An HTML page and the URL it was finally served from
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub html: String,
}

impl Page {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }
}

/// Black-box page renderer used by the resolver
#[async_trait]
pub trait PageSource: Send + Sync + std::fmt::Debug {
    /// Load `url` and return its HTML
    async fn load(&self, url: &Url) -> Result<Page, ResolveError>;
}

/// Loads pages with a plain HTTP GET, spaced out by a shared pacer
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: HttpClient,
    pacer: Pacer,
}

impl HttpPageSource {
    pub fn new(timeout: Duration, pacer: Pacer) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: HttpClient::with_timeout(timeout)?,
            pacer,
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn load(&self, url: &Url) -> Result<Page, ResolveError> {
        let unavailable = |reason: String| ResolveError::PageUnavailable {
            url: url.to_string(),
            reason,
        };

        self.pacer.wait().await;
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("status {}", status)));
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| unavailable(format!("failed to read body: {}", e)))?;

        Ok(Page::new(final_url, html))
    }
}
