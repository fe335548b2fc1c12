use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::errors::PlannerError;

pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_LANGUAGE: &str = "Traditional Chinese";
const DEFAULT_TEMPERATURE: f64 = 0.6;
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Settings for `CompletionStreamClient`.
#[derive(Clone)]
pub struct ClientConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Bound on TCP/TLS connection establishment.
    pub connect_timeout: Duration,
    /// Bound on waiting for response headers; the body stream is unbounded.
    pub request_timeout: Duration,
    /// Treat a clean end of body without `[DONE]` as completion.
    pub lenient_eof: bool,
}

impl ClientConfig {
    /// # Errors
    ///
    /// Returns `Config` if `endpoint` is not an absolute http(s) URL.
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self, PlannerError> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            lenient_eof: false,
        })
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("lenient_eof", &self.lenient_eof)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub language: String,
    pub history_path: Option<PathBuf>,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `Config` if the API key is missing or a value does not parse.
    pub fn from_env() -> Result<Self, PlannerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the API key is missing or a value does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PlannerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("TRIP_API_KEY")
            .or_else(|| lookup("GROQ_API_KEY"))
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PlannerError::Config("TRIP_API_KEY is not set".to_string()))?;

        let endpoint = lookup("TRIP_API_URL").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let mut client = ClientConfig::new(&endpoint, api_key)?;

        if let Some(model) = lookup("TRIP_MODEL") {
            client.model = model;
        }
        if let Some(raw) = lookup("TRIP_TEMPERATURE") {
            client.temperature = Some(parse_var("TRIP_TEMPERATURE", &raw)?);
        }
        if let Some(raw) = lookup("TRIP_MAX_TOKENS") {
            client.max_tokens = Some(parse_var("TRIP_MAX_TOKENS", &raw)?);
        }
        if let Some(raw) = lookup("TRIP_CONNECT_TIMEOUT_SECS") {
            client.connect_timeout =
                Duration::from_secs(parse_var("TRIP_CONNECT_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = lookup("TRIP_REQUEST_TIMEOUT_SECS") {
            client.request_timeout =
                Duration::from_secs(parse_var("TRIP_REQUEST_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = lookup("TRIP_LENIENT_EOF") {
            client.lenient_eof = parse_var("TRIP_LENIENT_EOF", &raw)?;
        }

        Ok(Self {
            client,
            language: lookup("TRIP_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            history_path: lookup("TRIP_HISTORY_PATH").map(PathBuf::from),
        })
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, PlannerError> {
    let url = Url::parse(raw).map_err(|e| PlannerError::Config(format!("TRIP_API_URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PlannerError::Config(format!(
            "TRIP_API_URL: unsupported scheme {other}"
        ))),
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, PlannerError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| PlannerError::Config(format!("{name}: {e}")))
}
