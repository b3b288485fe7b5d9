//! Environment-driven settings.
//!
//! Values come from the process environment, with a `.env` file loaded first
//! when one is present.

use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.pollinations.ai";
pub const DEFAULT_IMAGE_SIZE: u32 = 512;
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_OWNER: &str = "Akbar Maulana";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub image_base_url: String,
    pub image_size: u32,
    pub owner: String,
    pub persona: Option<String>,
    pub bind: String,
    pub chat_url: Option<String>,
    pub http_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            image_size: DEFAULT_IMAGE_SIZE,
            owner: DEFAULT_OWNER.to_string(),
            persona: None,
            bind: DEFAULT_BIND.to_string(),
            chat_url: None,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup, so tests don't touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let image_size = match get("FOLIO_IMAGE_SIZE") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::Invalid {
                    key: "FOLIO_IMAGE_SIZE",
                    value: raw,
                })?,
            None => defaults.image_size,
        };

        let http_timeout = match get("FOLIO_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "FOLIO_HTTP_TIMEOUT_SECS",
                value: raw,
            })?),
            None => defaults.http_timeout,
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            image_base_url: get("FOLIO_IMAGE_BASE_URL").unwrap_or(defaults.image_base_url),
            image_size,
            owner: get("FOLIO_OWNER").unwrap_or(defaults.owner),
            persona: get("FOLIO_PERSONA"),
            bind: get("FOLIO_BIND").unwrap_or(defaults.bind),
            chat_url: get("FOLIO_CHAT_URL"),
            http_timeout,
        })
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.gemini_api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Shared HTTP client for the upstream calls.
    pub fn http_client(&self) -> reqwest::Client {
        #[cfg(not(target_arch = "wasm32"))]
        {
            reqwest::Client::builder()
                .timeout(self.http_timeout)
                .build()
                .unwrap_or_else(|err| {
                    tracing::warn!("falling back to default http client: {err}");
                    reqwest::Client::new()
                })
        }
        #[cfg(target_arch = "wasm32")]
        {
            reqwest::Client::new()
        }
    }
}

/// Load `.env` if present. Missing files are fine; the environment wins.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("loaded environment from {}", path.display()),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!("failed to read .env: {err}"),
    }
}

/// Install the `tracing` subscriber used by the binaries.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
