//! API key credential attached to the event-stream handshake and to every
//! backend request.

use std::sync::{Arc, PoisonError, RwLock};

use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ConnectError;

/// Default header the backend reads the key from.
pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

/// A named header carrying a shared, refreshable key.
///
/// The key is read from the [`RwLock`] each time a header is produced, so
/// writing a new value into the lock rotates the credential for the next
/// request or reconnect without rebuilding anything. An empty key means no
/// header is sent.
#[derive(Debug, Clone)]
pub struct ApiKey {
    header: String,
    key: Arc<RwLock<String>>,
}

impl ApiKey {
    pub fn new(header: impl Into<String>, key: Arc<RwLock<String>>) -> Self {
        Self {
            header: header.into(),
            key,
        }
    }

    /// A fixed key under [`DEFAULT_API_KEY_HEADER`].
    pub fn fixed(key: impl Into<String>) -> Self {
        Self::new(DEFAULT_API_KEY_HEADER, Arc::new(RwLock::new(key.into())))
    }

    /// A credential that adds nothing.
    pub fn none() -> Self {
        Self::fixed(String::new())
    }

    pub fn header_name(&self) -> &str {
        &self.header
    }

    /// Current `(header, value)` pair, or `None` when the key is empty.
    pub fn current(&self) -> Option<(String, String)> {
        // A writer that panicked mid-update still leaves a complete String.
        let key = self.key.read().unwrap_or_else(PoisonError::into_inner);
        if key.is_empty() {
            None
        } else {
            Some((self.header.clone(), key.clone()))
        }
    }

    /// Insert the header into a handshake request's header map.
    ///
    /// # Errors
    ///
    /// [`ConnectError::InvalidHeader`] if the name or value contains
    /// characters HTTP headers cannot carry.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), ConnectError> {
        let Some((name, value)) = self.current() else {
            return Ok(());
        };
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConnectError::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|_| {
                ConnectError::InvalidHeader(format!("{}: invalid key characters", name.as_str()))
            })?;
        headers.insert(name, value);
        Ok(())
    }
}
