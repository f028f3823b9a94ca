//! SQL Server connection implementation using tiberius

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use sqldoc_core::{ColumnMeta, Connection, ConnectionConfig, QueryResult, Result, Row, SqldocError, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, Row as TiberiusRow};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use uuid::Uuid;

pub(crate) const DEFAULT_PORT: u16 = 1433;
const APPLICATION_NAME: &str = "sqldoc";

/// SQL Server connection errors
#[derive(Debug, thiserror::Error)]
pub enum MssqlConnectionError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid connection settings: {0}")]
    InvalidSettings(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MssqlConnectionError> for SqldocError {
    fn from(err: MssqlConnectionError) -> Self {
        match err {
            MssqlConnectionError::ConnectionFailed(_)
            | MssqlConnectionError::AuthenticationFailed(_)
            | MssqlConnectionError::ConnectionClosed
            | MssqlConnectionError::Io(_) => SqldocError::Connection(err.to_string()),
            MssqlConnectionError::InvalidSettings(_) => SqldocError::Configuration(err.to_string()),
            MssqlConnectionError::QueryFailed(_) => SqldocError::Query(err.to_string()),
            MssqlConnectionError::TypeConversion(_) => SqldocError::Driver(err.to_string()),
        }
    }
}

/// How the connection authenticates
#[derive(Clone, PartialEq, Eq)]
pub enum MssqlAuth {
    /// SQL Server login
    SqlServer { username: String, password: String },
    /// Azure AD access token obtained by the caller
    AadToken(String),
}

impl std::fmt::Debug for MssqlAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MssqlAuth::SqlServer { username, .. } => f
                .debug_struct("SqlServer")
                .field("username", username)
                .finish_non_exhaustive(),
            MssqlAuth::AadToken(_) => f.write_str("AadToken(***)"),
        }
    }
}

/// Everything needed to open a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MssqlConnectOptions {
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub auth: MssqlAuth,
    /// Trust the server certificate without validation (dev/testing only)
    pub trust_cert: bool,
    /// Encrypt the whole session; Azure SQL requires this
    pub encrypt: bool,
}

impl MssqlConnectOptions {
    /// Read options from a generic connection config.
    ///
    /// Recognised params: `access_token`, `trust_cert`, `encrypt`.
    pub fn from_config(
        config: &ConnectionConfig,
    ) -> std::result::Result<Self, MssqlConnectionError> {
        let host = config
            .get_string("host")
            .ok_or_else(|| MssqlConnectionError::InvalidSettings("host is required".into()))?;
        let port = if config.port > 0 {
            config.port
        } else {
            DEFAULT_PORT
        };

        let auth = match (config.get_string("access_token"), config.get_string("username")) {
            (Some(token), _) => MssqlAuth::AadToken(token),
            (None, Some(username)) => MssqlAuth::SqlServer {
                username,
                password: config.get_string("password").unwrap_or_default(),
            },
            (None, None) => {
                return Err(MssqlConnectionError::AuthenticationFailed(
                    "either a username or an access token is required".into(),
                ));
            }
        };

        Ok(Self {
            host,
            port,
            database: config.get_string("database"),
            auth,
            trust_cert: config.get_flag("trust_cert").unwrap_or(false),
            encrypt: config.get_flag("encrypt").unwrap_or(true),
        })
    }

    pub(crate) fn to_tiberius_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.application_name(APPLICATION_NAME);

        if let Some(db) = &self.database {
            config.database(db);
        }

        if self.trust_cert {
            config.trust_cert();
        }

        config.encryption(if self.encrypt {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::Off
        });

        match &self.auth {
            MssqlAuth::SqlServer { username, password } => {
                config.authentication(AuthMethod::sql_server(username, password));
            }
            MssqlAuth::AadToken(token) => {
                config.authentication(AuthMethod::aad_token(token));
            }
        }

        config
    }
}

type MssqlClient = Client<Compat<TcpStream>>;

/// SQL Server connection using tiberius
pub struct MssqlConnection {
    client: Mutex<MssqlClient>,
    closed: AtomicBool,
    database: Option<String>,
}

impl MssqlConnection {
    /// Open a connection, following an Azure SQL gateway redirect if one is returned
    #[tracing::instrument(skip(options), fields(host = %options.host, port = options.port, database = ?options.database))]
    pub async fn connect(
        options: &MssqlConnectOptions,
    ) -> std::result::Result<Self, MssqlConnectionError> {
        tracing::debug!("connecting to SQL Server");

        let config = options.to_tiberius_config();
        let client = match open_client(config.clone()).await {
            Ok(client) => client,
            Err(tiberius::error::Error::Routing { host, port }) => {
                tracing::debug!(%host, port, "following gateway redirect");
                let mut redirected = config;
                redirected.host(&host);
                redirected.port(port);
                open_client(redirected)
                    .await
                    .map_err(|e| MssqlConnectionError::ConnectionFailed(e.to_string()))?
            }
            Err(e) => return Err(MssqlConnectionError::ConnectionFailed(e.to_string())),
        };

        tracing::debug!("connected to SQL Server");

        Ok(Self {
            client: Mutex::new(client),
            closed: AtomicBool::new(false),
            database: options.database.clone(),
        })
    }

    /// Create connection from config with standard keys
    pub async fn from_config(
        config: &ConnectionConfig,
    ) -> std::result::Result<Self, MssqlConnectionError> {
        let options = MssqlConnectOptions::from_config(config)?;
        Self::connect(&options).await
    }

    fn ensure_not_closed(&self) -> std::result::Result<(), MssqlConnectionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MssqlConnectionError::ConnectionClosed);
        }
        Ok(())
    }
}

async fn open_client(config: Config) -> tiberius::Result<MssqlClient> {
    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;
    Client::connect(config, tcp.compat_write()).await
}

#[async_trait]
impl Connection for MssqlConnection {
    fn driver_name(&self) -> &str {
        "mssql"
    }

    #[tracing::instrument(skip(self, sql), fields(database = ?self.database))]
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.ensure_not_closed()?;
        let start = std::time::Instant::now();

        let mut client = self.client.lock().await;

        let stream = client.simple_query(sql).await.map_err(|e| {
            tracing::error!(error = %e, "query failed");
            MssqlConnectionError::QueryFailed(e.to_string())
        })?;

        let tib_rows = stream
            .into_first_result()
            .await
            .map_err(|e| MssqlConnectionError::QueryFailed(e.to_string()))?;

        let columns: Vec<ColumnMeta> = tib_rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .map(|(ordinal, col)| ColumnMeta {
                        name: col.name().to_string(),
                        data_type: format!("{:?}", col.column_type()),
                        ordinal,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

        let mut rows = Vec::with_capacity(tib_rows.len());
        for tib_row in tib_rows {
            rows.push(Row::new(column_names.clone(), tiberius_row_to_values(tib_row)?));
        }

        let execution_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            duration_ms = execution_time_ms,
            "query completed"
        );

        Ok(QueryResult {
            id: Uuid::new_v4(),
            columns,
            rows,
            execution_time_ms,
        })
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!("SQL Server connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn tiberius_row_to_values(row: TiberiusRow) -> Result<Vec<Value>> {
    row.into_iter().map(column_data_to_value).collect()
}

fn days_after(
    year: i32,
    days: i64,
) -> std::result::Result<NaiveDate, MssqlConnectionError> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|base| base.checked_add_signed(Duration::days(days)))
        .ok_or_else(|| {
            MssqlConnectionError::TypeConversion(format!("date out of range: {year} + {days} days"))
        })
}

/// TDS time values count 100ns increments since midnight
fn time_from_increments(increments: u64) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(
        (increments / 10_000_000) as u32,
        ((increments % 10_000_000) * 100) as u32,
    )
    .unwrap_or_default()
}

/// Convert tiberius ColumnData to a sqldoc Value
pub(crate) fn column_data_to_value(col_data: ColumnData<'static>) -> Result<Value> {
    let value = match col_data {
        ColumnData::Bit(v) => v.map(Value::Bool).unwrap_or(Value::Null),
        ColumnData::U8(v) => v.map(|v| Value::Int16(v as i16)).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(Value::Int16).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(Value::Int32).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::Int64).unwrap_or(Value::Null),
        ColumnData::F32(v) => v.map(Value::Float32).unwrap_or(Value::Null),
        ColumnData::F64(v) => v.map(Value::Float64).unwrap_or(Value::Null),
        ColumnData::String(v) => v
            .map(|s| Value::String(s.into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Guid(v) => v.map(Value::Uuid).unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .map(|b| Value::Bytes(b.into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v
            .map(|n| Value::Decimal(n.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Xml(v) => v
            .map(|x| Value::String(x.into_owned().into_string()))
            .unwrap_or(Value::Null),
        ColumnData::DateTime(None)
        | ColumnData::SmallDateTime(None)
        | ColumnData::DateTime2(None)
        | ColumnData::DateTimeOffset(None)
        | ColumnData::Date(None)
        | ColumnData::Time(None) => Value::Null,
        ColumnData::DateTime(Some(v)) => {
            // datetime stores 1/300 second ticks
            let fragments = v.seconds_fragments() as u64;
            let time = NaiveTime::from_num_seconds_from_midnight_opt(
                (fragments / 300) as u32,
                ((fragments % 300) * 1_000_000_000 / 300) as u32,
            )
            .unwrap_or_default();
            Value::DateTime(NaiveDateTime::new(days_after(1900, v.days() as i64)?, time))
        }
        ColumnData::SmallDateTime(Some(v)) => {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(
                (v.seconds_fragments() as u32) * 60,
                0,
            )
            .unwrap_or_default();
            Value::DateTime(NaiveDateTime::new(days_after(1900, v.days() as i64)?, time))
        }
        ColumnData::DateTime2(Some(v)) => Value::DateTime(NaiveDateTime::new(
            days_after(1, v.date().days() as i64)?,
            time_from_increments(v.time().increments()),
        )),
        ColumnData::DateTimeOffset(Some(v)) => {
            let dt2 = v.datetime2();
            let naive = NaiveDateTime::new(
                days_after(1, dt2.date().days() as i64)?,
                time_from_increments(dt2.time().increments()),
            );
            Value::DateTimeUtc(naive.and_utc())
        }
        ColumnData::Date(Some(v)) => Value::Date(days_after(1, v.days() as i64)?),
        ColumnData::Time(Some(v)) => Value::Time(time_from_increments(v.increments())),
    };
    Ok(value)
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("database", &self.database)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}
