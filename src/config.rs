//! Environment-driven configuration.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{info, warn};

use crate::auth::{ApiKey, DEFAULT_API_KEY_HEADER};
use crate::client::BackendConfig;
use crate::error::ConfigError;
use crate::live::ConnectionConfig;

pub const WS_URL_VAR: &str = "BARANGAY_WS_URL";
pub const API_URL_VAR: &str = "BARANGAY_API_URL";
pub const API_KEY_HEADER_VAR: &str = "BARANGAY_API_KEY_HEADER";
pub const API_KEY_VAR: &str = "BARANGAY_API_KEY";
pub const HTTP_TIMEOUT_VAR: &str = "BARANGAY_HTTP_TIMEOUT_SECS";

/// Connection and backend settings for one session.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    pub connection: ConnectionConfig,
    pub backend: BackendConfig,
}

impl SyncConfig {
    /// Read settings from the process environment.
    ///
    /// Unset variables fall back to defaults and are logged. The socket and
    /// the HTTP client share one [`ApiKey`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let header = load_or(&lookup, API_KEY_HEADER_VAR, DEFAULT_API_KEY_HEADER.to_string());
        let key = lookup(API_KEY_VAR).unwrap_or_else(|| {
            warn!("{API_KEY_VAR} not set, connecting without credentials");
            String::new()
        });
        let api_key = ApiKey::new(header, Arc::new(RwLock::new(key)));

        let timeout_secs = try_load(
            &lookup,
            HTTP_TIMEOUT_VAR,
            defaults.backend.request_timeout.as_secs(),
        )?;

        Ok(Self {
            connection: ConnectionConfig {
                url: load_or(&lookup, WS_URL_VAR, defaults.connection.url),
                api_key,
                ..defaults.connection
            },
            backend: BackendConfig {
                base_url: load_or(&lookup, API_URL_VAR, defaults.backend.base_url),
                request_timeout: Duration::from_secs(timeout_secs),
                ..defaults.backend
            },
        })
    }

    /// The credential shared by the socket and HTTP backend.
    pub fn api_key(&self) -> &ApiKey {
        &self.connection.api_key
    }
}

fn load_or<F>(lookup: &F, key: &str, default: String) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default
    })
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        info!("{key} not set, using default: {default}");
        return Ok(default);
    };
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }
    })
}
