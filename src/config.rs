//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::api::normalize_api_url;

pub const DEFAULT_CURRENCY_SYMBOL: &str = "Tzs";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_API_URL: &str = "FOODHUB_API_URL";
const ENV_DATA_DIR: &str = "FOODHUB_DATA_DIR";
const ENV_CURRENCY: &str = "FOODHUB_CURRENCY";
const ENV_REFRESH_SECS: &str = "FOODHUB_REFRESH_SECS";
const ENV_TOKEN_BACKEND: &str = "FOODHUB_TOKEN_BACKEND";

/// Where session tokens are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenBackend {
    /// OS credential store.
    #[default]
    Keyring,
    /// `local_settings` table in the data directory database.
    Local,
}

impl TokenBackend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "keyring" | "os" => Some(TokenBackend::Keyring),
            "local" | "sqlite" | "db" => Some(TokenBackend::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote endpoint URL, normalised.
    pub api_url: String,

    /// Currency prefix for formatted amounts. Replaced by the remote
    /// `currency_symbol` setting once loaded.
    pub currency_symbol: String,

    /// Polling interval for the admin order list and the tracker.
    pub refresh_interval: Duration,

    pub request_timeout: Duration,

    /// Directory holding `foodhub.db`. `None` keeps state in memory only.
    pub data_dir: Option<PathBuf>,

    pub token_backend: TokenBackend,
}

impl ClientConfig {
    pub fn new(api_url: impl AsRef<str>) -> Self {
        Self {
            api_url: normalize_api_url(api_url.as_ref()),
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            data_dir: None,
            token_backend: TokenBackend::default(),
        }
    }

    /// Build from `FOODHUB_*` environment variables. Returns `None` when
    /// `FOODHUB_API_URL` is unset or blank.
    pub fn from_env() -> Option<Self> {
        let api_url = std::env::var(ENV_API_URL)
            .ok()
            .filter(|s| !s.trim().is_empty())?;
        let mut config = Self::new(api_url);

        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                config.data_dir = Some(PathBuf::from(dir.trim()));
            }
        }
        if let Ok(symbol) = std::env::var(ENV_CURRENCY) {
            if !symbol.trim().is_empty() {
                config.currency_symbol = symbol.trim().to_string();
            }
        }
        if let Some(secs) = std::env::var(ENV_REFRESH_SECS)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
        {
            config.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(backend) = std::env::var(ENV_TOKEN_BACKEND)
            .ok()
            .and_then(|s| TokenBackend::parse(&s))
        {
            config.token_backend = backend;
        }
        Some(config)
    }

    pub fn with_currency_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.currency_symbol = symbol.into();
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_token_backend(mut self, backend: TokenBackend) -> Self {
        self.token_backend = backend;
        self
    }
}
