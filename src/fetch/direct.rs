//! Plain HTTP download with local text extraction.
//!
//! HTML is reduced to its visible text with `scraper`, PDFs go through
//! `pdf-extract`, other `text/*` bodies are used as-is.

use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;
use url::Url;

use super::{ContentService, FetchError};
use crate::utils::{retry_after_secs, HttpClient};

/// Fetches documents directly from their host
#[derive(Debug, Clone)]
pub struct DirectService {
    client: HttpClient,
}

impl DirectService {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: HttpClient::with_timeout(timeout)?,
        })
    }
}

#[async_trait]
impl ContentService for DirectService {
    fn name(&self) -> &str {
        "direct"
    }

    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            return Err(FetchError::from_status(status, retry_after));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        if content_type.contains("application/pdf") || body.starts_with(b"%PDF") {
            let bytes = body.to_vec();
            return tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| FetchError::Unreadable(format!("PDF extraction aborted: {}", e)))?
                .map_err(|e| FetchError::Unreadable(format!("PDF extraction failed: {}", e)));
        }

        let text = String::from_utf8_lossy(&body);
        if content_type.contains("html") || content_type.is_empty() {
            return Ok(html_text(&text));
        }
        if content_type.starts_with("text/") {
            return Ok(text.into_owned());
        }

        Err(FetchError::Unreadable(format!(
            "unsupported content type '{}'",
            content_type
        )))
    }
}

/// Visible text of an HTML document, one text node per line
pub(crate) fn html_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|e| e.name().to_string()))
            .is_some_and(|name| matches!(name.as_str(), "script" | "style" | "noscript" | "template"));
        if hidden {
            continue;
        }

        let text = text.trim();
        if !text.is_empty() {
            out.push_str(text);
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_text_skips_scripts() {
        let html = r#"<html><head><style>p{}</style><script>var x = 1;</script></head>
            <body><h1>Study X</h1><p>Funded by the <b>Directorate</b> of Research.</p></body></html>"#;
        let text = html_text(html);

        assert!(text.contains("Study X"));
        assert!(text.contains("Directorate"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("p{}"));
    }

    #[tokio::test]
    async fn test_direct_fetch_html() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/article")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><body><p>Acknowledgements</p></body></html>")
            .create_async()
            .await;

        let service = DirectService::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/article", server.url())).unwrap();
        let text = service.fetch_text(&url).await.unwrap();

        assert_eq!(text.trim(), "Acknowledgements");
    }

    #[tokio::test]
    async fn test_direct_fetch_plain_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/notes.txt")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("plain body")
            .create_async()
            .await;

        let service = DirectService::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/notes.txt", server.url())).unwrap();

        assert_eq!(service.fetch_text(&url).await.unwrap(), "plain body");
    }

    #[tokio::test]
    async fn test_direct_fetch_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let service = DirectService::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/missing", server.url())).unwrap();

        assert_eq!(service.fetch_text(&url).await.unwrap_err(), FetchError::NotFound(404));
    }

    #[tokio::test]
    async fn test_direct_fetch_rejects_binary() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/blob")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(vec![0u8, 1, 2, 3])
            .create_async()
            .await;

        let service = DirectService::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/blob", server.url())).unwrap();

        assert!(matches!(
            service.fetch_text(&url).await.unwrap_err(),
            FetchError::Unreadable(_)
        ));
    }
}
