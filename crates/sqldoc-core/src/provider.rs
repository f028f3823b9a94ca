//! Connection providers
//!
//! Catalog readers ask a provider for connections instead of holding one
//! directly. A provider either hands out the same shared connection every
//! time (queries then run one after another) or opens a fresh connection per
//! request so independent queries can run concurrently.

use crate::{Connection, ConnectionConfig, DatabaseDriver, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Get a connection to run catalog queries on
    async fn acquire(&self) -> Result<Arc<dyn Connection>>;

    /// Hand a connection back once the caller is done with it
    async fn release(&self, _connection: Arc<dyn Connection>) {}

    /// Whether connections returned by `acquire` are independent of each other
    fn supports_concurrency(&self) -> bool;
}

/// Hands out one shared connection
pub struct SharedConnection {
    connection: Arc<dyn Connection>,
}

impl SharedConnection {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ConnectionProvider for SharedConnection {
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        if self.connection.is_closed() {
            return Err(crate::SqldocError::Connection(
                "shared connection is closed".into(),
            ));
        }
        Ok(self.connection.clone())
    }

    fn supports_concurrency(&self) -> bool {
        false
    }
}

/// Opens a new connection through a driver on every `acquire`
pub struct DriverConnections {
    driver: Arc<dyn DatabaseDriver>,
    config: ConnectionConfig,
}

impl DriverConnections {
    pub fn new(driver: Arc<dyn DatabaseDriver>, config: ConnectionConfig) -> Self {
        Self { driver, config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[async_trait]
impl ConnectionProvider for DriverConnections {
    #[tracing::instrument(skip(self), fields(driver = self.driver.id(), host = %self.config.host))]
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        tracing::debug!("opening catalog connection");
        self.driver.connect(&self.config).await
    }

    async fn release(&self, connection: Arc<dyn Connection>) {
        if let Err(e) = connection.close().await {
            tracing::warn!(error = %e, "failed to close catalog connection");
        }
    }

    fn supports_concurrency(&self) -> bool {
        true
    }
}
