//! Classification of full text into YES / NO.
//!
//! The decision is delegated to a [`TextClassifier`] service, bound by a strict
//! contract: YES only for an explicit statement attributing funding, support or
//! acknowledgement to the Directorate of Research, Innovation and Consultancy
//! (DRIC) of the University of Cape Coast. Anything else is NO. A classifier
//! never answers NF; unobtainable text is the pipeline's business.
//!
//! [`Classifier`] adds pacing, rate-limit retries and a memo keyed by the
//! SHA-256 of the text on top of any service.

mod chat;
mod keyword;

pub use chat::ChatClassifier;
pub use keyword::KeywordClassifier;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::models::Verdict;
use crate::utils::{with_retry, Pacer, RetryConfig, Retryable, TransientError};

/// Full name of the office whose acknowledgement counts
pub const OFFICE_NAME: &str = "Directorate of Research, Innovation and Consultancy";

/// Acronym of the office
pub const OFFICE_ACRONYM: &str = "DRIC";

/// Institution the office belongs to
pub const INSTITUTION: &str = "University of Cape Coast";

/// Instruction contract sent ahead of the text
pub const STRICT_PROMPT: &str = "Answer YES or NO only.\n\
Answer YES only if the text below contains an explicit statement that the work was funded, \
supported or sponsored by, or acknowledges funding or support from, the Directorate of \
Research, Innovation and Consultancy (DRIC) of the University of Cape Coast. Look for the \
phrases 'Directorate of Research, Innovation and Consultancy' or 'DRIC' inside such a statement.\n\
Answer NO in every other case: no acknowledgement at all, generic thanks, acknowledgement of a \
different body or office, or a statement that is ambiguous about who provided the support.\n\
If in doubt, answer NO.";

/// Prompt for one text
pub fn build_prompt(text: &str) -> String {
    format!("{}\n\nText:\n{}", STRICT_PROMPT, text)
}

/// Interpret a raw service reply. Only a reply starting with YES counts as YES.
pub fn parse_answer(raw: &str) -> Verdict {
    let answer = raw
        .trim_start_matches(|c: char| c.is_whitespace() || c == '*' || c == '"' || c == '\'')
        .to_ascii_uppercase();
    if answer.starts_with("YES") {
        Verdict::Yes
    } else {
        Verdict::No
    }
}

/// Failure of the classification service for one text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("Classifier rate limit exceeded")]
    RateLimited(Option<u64>),

    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed classifier response: {0}")]
    Malformed(String),

    #[error("Classifier rejected request: {0}")]
    Rejected(String),
}

impl Retryable for ClassifyError {
    fn transient(&self) -> Option<TransientError> {
        match self {
            ClassifyError::RateLimited(after) => Some(TransientError::RateLimit(*after)),
            _ => None,
        }
    }
}

/// Black-box text classification service
#[async_trait]
pub trait TextClassifier: Send + Sync + std::fmt::Debug {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Label `text` under the strict contract
    async fn classify_text(&self, text: &str) -> Result<Verdict, ClassifyError>;
}

/// Paced, retrying, memoising front end to a [`TextClassifier`]
#[derive(Debug, Clone)]
pub struct Classifier {
    service: Arc<dyn TextClassifier>,
    pacer: Pacer,
    retry: RetryConfig,
    memo: Arc<Mutex<HashMap<String, Verdict>>>,
}

impl Classifier {
    pub fn new(service: Arc<dyn TextClassifier>, pacer: Pacer, retry: RetryConfig) -> Self {
        Self {
            service,
            pacer,
            retry,
            memo: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Classify `text`, answering from the memo when the same text was seen
    pub async fn classify(&self, text: &str) -> Result<Verdict, ClassifyError> {
        let key = digest(text);
        if let Some(verdict) = self.memo.lock().ok().and_then(|memo| memo.get(&key).copied()) {
            tracing::debug!("Classification memo hit");
            return Ok(verdict);
        }

        let service = &self.service;
        let pacer = &self.pacer;
        let verdict = with_retry(self.retry, move || async move {
            pacer.wait().await;
            tracing::debug!("{} classification request ({} chars)", service.name(), text.len());
            service.classify_text(text).await
        })
        .await?;

        tracing::info!("{} classified text as {:?}", self.service.name(), verdict);
        if let Ok(mut memo) = self.memo.lock() {
            memo.insert(key, verdict);
        }
        Ok(verdict)
    }
}

fn digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
