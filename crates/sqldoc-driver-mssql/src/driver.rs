//! SQL Server driver implementation

use crate::connection::{DEFAULT_PORT, MssqlAuth, MssqlConnectOptions, MssqlConnection};
use async_trait::async_trait;
use sqldoc_core::{Connection, ConnectionConfig, DatabaseDriver, Result, SqldocError};
use std::sync::Arc;

/// SQL Server / Azure SQL Database driver
pub struct MssqlDriver;

impl MssqlDriver {
    pub fn new() -> Self {
        tracing::debug!("SQL Server driver initialized");
        Self
    }
}

impl Default for MssqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for MssqlDriver {
    fn id(&self) -> &'static str {
        "mssql"
    }

    fn display_name(&self) -> &'static str {
        "SQL Server"
    }

    fn default_port(&self) -> Option<u16> {
        Some(DEFAULT_PORT)
    }

    #[tracing::instrument(skip(self, config), fields(host = config.get_string("host").as_deref(), database = config.get_string("database").as_deref()))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let connection = MssqlConnection::from_config(config).await?;
        Ok(Arc::new(connection))
    }

    #[tracing::instrument(skip(self, config))]
    async fn test_connection(&self, config: &ConnectionConfig) -> Result<String> {
        tracing::debug!("testing SQL Server connection");
        let conn = self.connect(config).await?;
        let result = conn.query("SELECT @@VERSION AS version").await;
        conn.close().await?;

        let version = result?
            .scalar()
            .and_then(|v| v.as_str())
            .and_then(|v| v.lines().next())
            .map(|line| line.trim().to_string())
            .ok_or_else(|| SqldocError::Query("server did not report a version".into()))?;
        Ok(version)
    }

    fn build_connection_string(&self, config: &ConnectionConfig) -> String {
        let host = config
            .get_string("host")
            .unwrap_or_else(|| "localhost".to_string());
        let port = if config.port > 0 {
            config.port
        } else {
            DEFAULT_PORT
        };

        let mut conn_str = format!("Server=tcp:{},{}", host, port);

        if let Some(db) = config.get_string("database") {
            conn_str.push_str(&format!(";Database={}", db));
        }

        match MssqlConnectOptions::from_config(config).map(|o| o.auth) {
            Ok(MssqlAuth::AadToken(_)) => {
                conn_str.push_str(";Authentication=ActiveDirectoryAccessToken");
            }
            Ok(MssqlAuth::SqlServer { username, password }) => {
                conn_str.push_str(&format!(";User Id={}", username));
                if !password.is_empty() {
                    conn_str.push_str(";Password=***");
                }
            }
            Err(_) => {}
        }

        let encrypt = config.get_flag("encrypt").unwrap_or(true);
        conn_str.push_str(if encrypt { ";Encrypt=True" } else { ";Encrypt=False" });
        if config.get_flag("trust_cert").unwrap_or(false) {
            conn_str.push_str(";TrustServerCertificate=True");
        }

        conn_str
    }
}
