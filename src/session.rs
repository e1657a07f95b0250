//! Wiring for one mounted admin view.
//!
//! A [`Session`] owns the store, the live connection feeding it, and the
//! coordinator acting on it. Open one when the view mounts and call
//! [`Session::shutdown`] when it unmounts.

use std::sync::Arc;

use tokio::sync::watch;

use crate::client::{Backend, BackendConfig, HttpBackend};
use crate::config::SyncConfig;
use crate::coordinator::ActionCoordinator;
use crate::dispatch::EventDispatcher;
use crate::error::OpenError;
use crate::live::{self, ConnectionConfig, ConnectionHandle};
use crate::notice::{AutoConfirm, Confirm, NetworkStatus, Notifier, OnlineFlag, TracingNotifier};
use crate::store::TransactionStore;
use crate::template::TemplateTable;
use crate::transaction::Transaction;

/// Builder for a [`Session`].
///
/// Defaults: configuration from [`SyncConfig::default`], the built-in
/// template table, an HTTP backend, always-online, auto-confirm, and
/// notices written to the log.
///
/// # Examples
///
/// ```no_run
/// use barangay_sync::{Session, SyncConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .config(SyncConfig::from_env()?)
///     .open()
///     .await?;
/// println!("{} requests", session.store().len());
/// session.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    config: SyncConfig,
    templates: TemplateTable,
    backend: Option<Arc<dyn Backend>>,
    network: Arc<dyn NetworkStatus>,
    confirm: Arc<dyn Confirm>,
    notifier: Arc<dyn Notifier>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
            templates: TemplateTable::default(),
            backend: None,
            network: Arc::new(OnlineFlag::default()),
            confirm: Arc::new(AutoConfirm),
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.config.connection = connection;
        self
    }

    pub fn backend_config(mut self, backend: BackendConfig) -> Self {
        self.config.backend = backend;
        self
    }

    /// Use a custom backend instead of building an [`HttpBackend`].
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn templates(mut self, templates: TemplateTable) -> Self {
        self.templates = templates;
        self
    }

    pub fn network(mut self, network: Arc<dyn NetworkStatus>) -> Self {
        self.network = network;
        self
    }

    pub fn confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Connect and start applying push events.
    ///
    /// # Errors
    ///
    /// [`OpenError::Connect`] if the first handshake fails,
    /// [`OpenError::Backend`] if the HTTP client cannot be built.
    pub async fn open(self) -> Result<Session, OpenError> {
        let backend = match self.backend {
            Some(backend) => backend,
            None => Arc::new(HttpBackend::new(
                self.config.backend,
                self.config.connection.api_key.clone(),
            )?),
        };

        let store = TransactionStore::new();
        let dispatcher = EventDispatcher::new(store.clone());
        let connection = live::connect(
            self.config.connection,
            dispatcher,
            Arc::clone(&self.notifier),
        )
        .await?;

        let coordinator =
            ActionCoordinator::new(store.clone(), backend, self.network, self.confirm, self.notifier)
                .with_templates(self.templates);

        tracing::info!("session opened");
        Ok(Session {
            store,
            coordinator,
            connection,
        })
    }
}

/// A store kept live by the event stream, plus the coordinator acting on it.
#[derive(Debug)]
pub struct Session {
    store: TransactionStore,
    coordinator: ActionCoordinator,
    connection: ConnectionHandle,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    pub fn coordinator(&self) -> &ActionCoordinator {
        &self.coordinator
    }

    /// Change notifications carrying the full list.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Transaction>> {
        self.store.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Stop applying push events and close the socket.
    ///
    /// Actions already in flight still complete.
    pub async fn shutdown(&self) {
        self.connection.disconnect().await;
        tracing::info!("session closed");
    }
}
