//! OpenAI-compatible chat completion endpoint as the classification service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{build_prompt, parse_answer, ClassifyError, TextClassifier};
use crate::config::ClassifierConfig;
use crate::models::Verdict;
use crate::utils::{retry_after_secs, HttpClient};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Classifies text with an LLM (Groq by default) under the strict prompt
#[derive(Debug, Clone)]
pub struct ChatClassifier {
    client: HttpClient,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: String,
}

impl ChatClassifier {
    pub fn new(config: &ClassifierConfig, api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: HttpClient::with_timeout(config.request_timeout())?,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl TextClassifier for ChatClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn classify_text(&self, text: &str) -> Result<Verdict, ClassifyError> {
        let prompt = build_prompt(text);
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: 8,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClassifyError::RateLimited(retry_after_secs(response.headers())));
        }
        if status.is_server_error() {
            return Err(ClassifyError::Unavailable(format!("status {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Rejected(format!("status {}: {}", status, body)));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::Malformed(e.to_string()))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ClassifyError::Malformed("empty reply".to_string()))?;

        tracing::debug!("Classifier raw reply: {:?}", content);
        Ok(parse_answer(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn classifier(endpoint: String) -> ChatClassifier {
        let config = ClassifierConfig {
            endpoint,
            ..ClassifierConfig::default()
        };
        ChatClassifier::new(&config, "gsk_test").unwrap()
    }

    fn reply(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_yes_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openai/v1/chat/completions")
            .match_header("authorization", "Bearer gsk_test")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "meta-llama/llama-4-scout-17b-16e-instruct",
                "temperature": 0.0
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply("YES"))
            .create_async()
            .await;

        let verdict = classifier(format!("{}/openai/v1/chat/completions", server.url()))
            .classify_text("Funded by DRIC")
            .await
            .unwrap();

        assert_eq!(verdict, Verdict::Yes);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_reply() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(200)
            .with_body(reply("No."))
            .create_async()
            .await;

        let verdict = classifier(format!("{}/chat", server.url()))
            .classify_text("We thank the reviewers.")
            .await
            .unwrap();

        assert_eq!(verdict, Verdict::No);
    }

    #[tokio::test]
    async fn test_rate_limited_reply() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(429)
            .with_header("retry-after", "2")
            .create_async()
            .await;

        let err = classifier(format!("{}/chat", server.url()))
            .classify_text("text")
            .await
            .unwrap_err();

        assert_eq!(err, ClassifyError::RateLimited(Some(2)));
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = classifier(format!("{}/chat", server.url()))
            .classify_text("text")
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifyError::Malformed(_)));
    }
}
