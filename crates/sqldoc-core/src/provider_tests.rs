//! Tests for connection providers and value accessors

use crate::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct StubConnection {
    closed: AtomicBool,
}

impl StubConnection {
    fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Connection for StubConnection {
    fn driver_name(&self) -> &str {
        "stub"
    }

    async fn query(&self, _sql: &str) -> Result<QueryResult> {
        Ok(QueryResult::from_rows(&["one"], vec![vec![Value::Int32(1)]]))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct StubDriver {
    connects: Mutex<Vec<String>>,
}

#[async_trait]
impl DatabaseDriver for StubDriver {
    fn id(&self) -> &'static str {
        "stub"
    }

    fn display_name(&self) -> &'static str {
        "Stub"
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        self.connects.lock().push(config.host.clone());
        Ok(Arc::new(StubConnection::new()))
    }

    async fn test_connection(&self, _config: &ConnectionConfig) -> Result<String> {
        Ok("stub 1.0".into())
    }

    fn build_connection_string(&self, config: &ConnectionConfig) -> String {
        format!("Server={}", config.host)
    }
}

#[tokio::test]
async fn test_shared_connection_returns_same_connection() {
    let conn: Arc<dyn Connection> = Arc::new(StubConnection::new());
    let provider = SharedConnection::new(conn.clone());

    let first = provider.acquire().await.unwrap();
    let second = provider.acquire().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(!provider.supports_concurrency());
}

#[tokio::test]
async fn test_shared_connection_rejects_closed_connection() {
    let conn: Arc<dyn Connection> = Arc::new(StubConnection::new());
    conn.close().await.unwrap();
    let provider = SharedConnection::new(conn);

    let err = provider.acquire().await.err().unwrap();
    assert!(err.is_connection_failure());
}

#[tokio::test]
async fn test_driver_connections_open_one_connection_per_acquire() {
    let driver = Arc::new(StubDriver {
        connects: Mutex::new(Vec::new()),
    });
    let config = ConnectionConfig::new_mssql("db.example.net", 1433, "sales");
    let provider = DriverConnections::new(driver.clone(), config);

    let first = provider.acquire().await.unwrap();
    let second = provider.acquire().await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(provider.supports_concurrency());
    assert_eq!(driver.connects.lock().len(), 2);
}

#[test]
fn test_connection_config_lookup() {
    let config = ConnectionConfig::new_mssql("localhost", 1433, "sales")
        .with_credentials("reader", Some("hunter2"))
        .with_param("trust_cert", "yes");

    assert_eq!(config.get_string("host").as_deref(), Some("localhost"));
    assert_eq!(config.get_string("user").as_deref(), Some("reader"));
    assert_eq!(config.get_string("database").as_deref(), Some("sales"));
    assert_eq!(config.get_flag("trust_cert"), Some(true));
    assert_eq!(config.get_flag("encrypt"), None);
}

#[test]
fn test_connection_config_debug_masks_secrets() {
    let config = ConnectionConfig::new_mssql("localhost", 1433, "sales")
        .with_credentials("reader", Some("hunter2"))
        .with_param("access_token", "eyJ0eXAi");

    let debug = format!("{:?}", config);
    assert!(!debug.contains("hunter2"));
    assert!(!debug.contains("eyJ0eXAi"));
    assert!(debug.contains("reader"));
}

#[test]
fn test_value_accessors() {
    assert_eq!(Value::Int16(7).as_i64(), Some(7));
    assert_eq!(Value::Decimal("42".into()).as_i64(), Some(42));
    assert_eq!(Value::Decimal("12.5".into()).as_f64(), Some(12.5));
    assert_eq!(Value::Int32(0).as_bool(), Some(false));
    assert_eq!(Value::Bool(true).as_bool(), Some(true));
    assert_eq!(Value::Null.as_str(), None);
    assert_eq!(Value::from(None::<&str>), Value::Null);
}

#[test]
fn test_value_as_datetime() {
    let parsed = Value::String("2024-03-01 08:30:00.123".into())
        .as_datetime()
        .unwrap();
    assert_eq!(parsed.to_string(), "2024-03-01 08:30:00.123");

    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    assert_eq!(
        Value::Date(date).as_datetime(),
        date.and_hms_opt(0, 0, 0)
    );
}

#[test]
fn test_query_result_from_rows() {
    let result = QueryResult::from_rows(
        &["name", "rows"],
        vec![vec!["Users".into(), Value::Int64(10)]],
    );

    assert_eq!(result.row_count(), 1);
    assert_eq!(result.columns[1].ordinal, 1);
    let row = &result.rows[0];
    assert_eq!(row.get_by_name("rows").and_then(|v| v.as_i64()), Some(10));
    assert_eq!(result.scalar().and_then(|v| v.as_str()), Some("Users"));
}

#[tokio::test]
async fn test_release_closes_only_driver_connections() {
    let shared: Arc<dyn Connection> = Arc::new(StubConnection::new());
    let provider = SharedConnection::new(shared.clone());
    let conn = provider.acquire().await.unwrap();
    provider.release(conn).await;
    assert!(!shared.is_closed());

    let driver = Arc::new(StubDriver {
        connects: Mutex::new(Vec::new()),
    });
    let provider = DriverConnections::new(driver, ConnectionConfig::new("stub"));
    let conn = provider.acquire().await.unwrap();
    provider.release(conn.clone()).await;
    assert!(conn.is_closed());
}
