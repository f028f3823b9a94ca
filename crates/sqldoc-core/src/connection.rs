//! Connection trait

use crate::{QueryResult, Result};
use async_trait::async_trait;

/// A live, already-authenticated database connection.
///
/// Implementations serialize access to the underlying wire connection, so a
/// single connection can be shared between tasks but never runs two queries
/// at once.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "mssql")
    fn driver_name(&self) -> &str;

    /// Execute a read-only query that returns rows
    async fn query(&self, sql: &str) -> Result<QueryResult>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
