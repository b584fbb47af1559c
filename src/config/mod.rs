//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `DRIC_CHECK_` (nested keys separated by
//! `__`, e.g. `DRIC_CHECK_FETCH__MIN_INTERVAL_MS=3000`).
//!
//! # Configuration File Format
//!
//! ```toml
//! [api_keys]
//! firecrawl = "fc-..."
//! groq = "gsk_..."
//!
//! [resolver]
//! search_engine_hosts = ["scholar.google"]
//! repository_handle_marker = "/xmlui/handle/"
//! page_timeout_secs = 30
//! min_interval_ms = 1000
//!
//! [fetch]
//! backend = "firecrawl"
//! min_interval_ms = 2000
//! max_attempts = 3
//! backoff_ms = 2000
//!
//! [classifier]
//! backend = "chat"
//! model = "meta-llama/llama-4-scout-17b-16e-instruct"
//! min_interval_ms = 1000
//! max_attempts = 4
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::RetryConfig;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "DRIC_CHECK";

/// File name searched for in the working directory
pub const LOCAL_CONFIG_FILE: &str = "dric-check.toml";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Link resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Content fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Text classification settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Copy of this configuration with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "***".to_string());
        let mut config = self.clone();
        config.api_keys.firecrawl = mask(&self.api_keys.firecrawl);
        config.api_keys.groq = mask(&self.api_keys.groq);
        config
    }
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Firecrawl API key (content fetch service)
    #[serde(default = "env_firecrawl_key")]
    pub firecrawl: Option<String>,

    /// Groq API key (classification service)
    #[serde(default = "env_groq_key")]
    pub groq: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            firecrawl: env_firecrawl_key(),
            groq: env_groq_key(),
        }
    }
}

fn env_firecrawl_key() -> Option<String> {
    std::env::var("FIRECRAWL_API_KEY").ok().filter(|k| !k.is_empty())
}

fn env_groq_key() -> Option<String> {
    std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty())
}

/// Link resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Host fragments identifying the search engine itself
    #[serde(default = "default_search_engine_hosts")]
    pub search_engine_hosts: Vec<String>,

    /// Path fragment identifying an institutional-repository item page
    #[serde(default = "default_repository_handle_marker")]
    pub repository_handle_marker: String,

    /// Timeout for loading a result or item page
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Minimum spacing between page loads, in milliseconds
    #[serde(default = "default_resolver_interval")]
    pub min_interval_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_engine_hosts: default_search_engine_hosts(),
            repository_handle_marker: default_repository_handle_marker(),
            page_timeout_secs: default_page_timeout(),
            min_interval_ms: default_resolver_interval(),
        }
    }
}

impl ResolverConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

fn default_search_engine_hosts() -> Vec<String> {
    vec!["scholar.google".to_string()]
}

fn default_repository_handle_marker() -> String {
    "/xmlui/handle/".to_string()
}

fn default_page_timeout() -> u64 {
    30
}

fn default_resolver_interval() -> u64 {
    1000
}

/// Which content fetch service to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackend {
    /// Firecrawl scrape API (markdown output)
    #[default]
    Firecrawl,
    /// Plain HTTP GET with local HTML/PDF text extraction
    Direct,
}

/// Content fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub backend: FetchBackend,

    /// Base URL of the Firecrawl API
    #[serde(default = "default_firecrawl_url")]
    pub firecrawl_url: String,

    /// Minimum interval between content requests
    #[serde(default = "default_fetch_interval")]
    pub min_interval_ms: u64,

    /// Attempts per URL, including the first
    #[serde(default = "default_fetch_attempts")]
    pub max_attempts: u32,

    /// Delay after the first transient failure; doubles afterwards
    #[serde(default = "default_fetch_backoff")]
    pub backoff_ms: u64,

    /// Per-request timeout
    #[serde(default = "default_fetch_timeout")]
    pub request_timeout_secs: u64,

    /// Time the scrape service waits for page scripts (not applied to PDFs)
    #[serde(default = "default_wait_for")]
    pub wait_for_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            backend: FetchBackend::default(),
            firecrawl_url: default_firecrawl_url(),
            min_interval_ms: default_fetch_interval(),
            max_attempts: default_fetch_attempts(),
            backoff_ms: default_fetch_backoff(),
            request_timeout_secs: default_fetch_timeout(),
            wait_for_ms: default_wait_for(),
        }
    }
}

impl FetchConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .max_attempts(self.max_attempts)
            .initial_delay(Duration::from_millis(self.backoff_ms))
    }
}

fn default_firecrawl_url() -> String {
    "https://api.firecrawl.dev".to_string()
}

fn default_fetch_interval() -> u64 {
    2000
}

fn default_fetch_attempts() -> u32 {
    3
}

fn default_fetch_backoff() -> u64 {
    2000
}

fn default_fetch_timeout() -> u64 {
    45
}

fn default_wait_for() -> u64 {
    500
}

/// Which classification service to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierBackend {
    /// OpenAI-compatible chat completion endpoint under the strict prompt
    #[default]
    Chat,
    /// Offline explicit-phrase matcher
    Keyword,
}

/// Classification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub backend: ClassifierBackend,

    /// Chat completion endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    /// Minimum interval between classification requests
    #[serde(default = "default_classifier_interval")]
    pub min_interval_ms: u64,

    #[serde(default = "default_classifier_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_classifier_backoff")]
    pub backoff_ms: u64,

    #[serde(default = "default_classifier_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::default(),
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: 0.0,
            min_interval_ms: default_classifier_interval(),
            max_attempts: default_classifier_attempts(),
            backoff_ms: default_classifier_backoff(),
            request_timeout_secs: default_classifier_timeout(),
        }
    }
}

impl ClassifierConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .max_attempts(self.max_attempts)
            .initial_delay(Duration::from_millis(self.backoff_ms))
    }
}

fn default_endpoint() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "meta-llama/llama-4-scout-17b-16e-instruct".to_string()
}

fn default_classifier_interval() -> u64 {
    1000
}

fn default_classifier_attempts() -> u32 {
    4
}

fn default_classifier_backoff() -> u64 {
    1500
}

fn default_classifier_timeout() -> u64 {
    60
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` for structured output, anything else for the default formatter
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from an optional file plus environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("resolver.search_engine_hosts"),
        )
        .build()?;

    settings.try_deserialize()
}

/// Find a configuration file in the conventional locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    default_config_path().filter(|path| path.is_file())
}

/// Per-user configuration file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dric-check").join("config.toml"))
}
