//! Alpaca API credentials.
//!
//! Read from the process environment after loading `.env` (if present).
//! The official `APCA_*` names win over the short `API_KEY` / `API_SECRET`
//! pair.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const PAPER_BASE_URL: &str = "https://paper-api.alpaca.markets";
pub const LIVE_BASE_URL: &str = "https://api.alpaca.markets";
pub const DATA_BASE_URL: &str = "https://data.alpaca.markets";

const KEY_VARS: [&str; 2] = ["APCA_API_KEY_ID", "API_KEY"];
const SECRET_VARS: [&str; 2] = ["APCA_API_SECRET_KEY", "API_SECRET"];
const BASE_URL_VARS: [&str; 2] = ["APCA_API_BASE_URL", "BASE_URL"];

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("missing credential: set {0} (or {1}) in the environment or .env")]
    Missing(&'static str, &'static str),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Clone)]
pub struct AlpacaCredentials {
    pub key_id: String,
    pub secret_key: String,
    /// Trading endpoint. Defaults to the paper endpoint.
    pub base_url: String,
}

impl fmt::Debug for AlpacaCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlpacaCredentials")
            .field("key_id", &self.key_id)
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AlpacaCredentials {
    pub fn new(key_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret_key: secret_key.into(),
            base_url: PAPER_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Load `.env` then read the environment.
    pub fn from_env() -> Result<Self, CredentialsError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve credentials through `lookup` (an environment stand-in).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: [&'static str; 2]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };
        let key_id = first(KEY_VARS).ok_or(CredentialsError::Missing(KEY_VARS[0], KEY_VARS[1]))?;
        let secret_key =
            first(SECRET_VARS).ok_or(CredentialsError::Missing(SECRET_VARS[0], SECRET_VARS[1]))?;
        let base_url = first(BASE_URL_VARS).unwrap_or_else(|| PAPER_BASE_URL.to_string());
        Ok(Self {
            key_id,
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_paper(&self) -> bool {
        self.base_url.contains("paper-api")
    }

    /// Attach the Alpaca auth headers to a request.
    pub fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        request
            .header("APCA-API-KEY-ID", &self.key_id)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
    }
}

/// Blocking client shared by the Alpaca adapters.
pub fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, CredentialsError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("sentitrade/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| CredentialsError::Client(e.to_string()))
}
