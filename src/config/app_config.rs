use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::domain::StreamError;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where completions are requested from and with which credential
#[derive(Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

/// HTTP client tuning
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Total request timeout; unset for long-lived streams
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_base_url() -> String {
    "http://localhost:8080/".to_string()
}

fn default_api_key() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "test".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            model: default_model(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// The key stays out of Debug output so it never reaches the logs.
impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl EndpointConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Check the base URL is http(s) and the key and model are present
    pub fn validate(&self) -> Result<(), StreamError> {
        self.parsed_base_url()?;

        if self.api_key.is_empty() {
            return Err(StreamError::configuration("api key must not be empty"));
        }

        if self.model.trim().is_empty() {
            return Err(StreamError::configuration("model must not be empty"));
        }

        Ok(())
    }

    fn parsed_base_url(&self) -> Result<Url, StreamError> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            StreamError::configuration(format!("invalid base url '{}': {}", self.base_url, e))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(StreamError::configuration(format!(
                "base url must use http or https, got '{}'",
                scheme
            ))),
        }
    }

    /// `{base_url}/chat/completions`, tolerating a trailing slash on the base.
    /// Any query string on the base is kept; a fragment is dropped.
    pub fn completions_url(&self) -> Result<String, StreamError> {
        let mut url = self.parsed_base_url()?;

        let path = format!("{}/chat/completions", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.set_fragment(None);

        Ok(url.to_string())
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
