//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sqldoc_core::{Connection, ConnectionProvider, QueryResult, Result, SqldocError, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Mock connection answering catalog queries by SQL pattern. Later
/// registrations win; unmatched queries return an empty result.
#[derive(Clone)]
pub struct MockConnection {
    responses: Vec<(String, std::result::Result<QueryResult, String>)>,
    query_log: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            query_log: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_query_response(mut self, sql_contains: &str, result: QueryResult) -> Self {
        self.responses.push((sql_contains.to_string(), Ok(result)));
        self
    }

    pub fn with_query_failure(mut self, sql_contains: &str, message: &str) -> Self {
        self.responses
            .push((sql_contains.to_string(), Err(message.to_string())));
        self
    }

    pub fn query_count(&self) -> usize {
        self.query_log.lock().len()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.query_log.lock().push(sql.to_string());
        for (pattern, response) in self.responses.iter().rev() {
            if sql.contains(pattern.as_str()) {
                return response.clone().map_err(SqldocError::Query);
            }
        }
        Ok(QueryResult::empty())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Provider whose first `acquire` can be held back until the test opens the gate
pub struct GatedProvider {
    connection: MockConnection,
    gate: Option<Arc<Notify>>,
    refuse: bool,
}

impl GatedProvider {
    pub fn open(connection: MockConnection) -> Self {
        Self {
            connection,
            gate: None,
            refuse: false,
        }
    }

    pub fn gated(connection: MockConnection, gate: Arc<Notify>) -> Self {
        Self {
            connection,
            gate: Some(gate),
            refuse: false,
        }
    }

    pub fn refusing() -> Self {
        Self {
            connection: MockConnection::new(),
            gate: None,
            refuse: true,
        }
    }
}

#[async_trait]
impl ConnectionProvider for GatedProvider {
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.refuse {
            return Err(SqldocError::Connection("login failed for user 'reader'".into()));
        }
        Ok(Arc::new(self.connection.clone()))
    }

    fn supports_concurrency(&self) -> bool {
        false
    }
}

pub fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
    QueryResult::from_rows(columns, rows)
}

/// Database `sales` with tables dbo.Users and dbo.Orders
pub fn small_catalog() -> MockConnection {
    let column = |table: &str, id: i32, name: &str, type_name: &str| -> Vec<Value> {
        vec![
            "dbo".into(),
            table.into(),
            Value::Int32(id),
            name.into(),
            type_name.into(),
            Value::Int16(4),
            Value::Int32(10),
            Value::Int32(0),
            Value::Bool(false),
            Value::Bool(id == 1),
            Value::Bool(false),
            Value::Null,
            Value::Null,
        ]
    };
    let table = |name: &str| -> Vec<Value> {
        vec![
            "dbo".into(),
            name.into(),
            Value::Bool(false),
            Value::Null,
            Value::Null,
            Value::Null,
        ]
    };

    MockConnection::new()
        .with_query_response(
            "sqldoc:database_info */",
            result(
                &["database_name", "server_name", "server_version", "user_name"],
                vec![vec![
                    "sales".into(),
                    "sql01.database.windows.net".into(),
                    "Microsoft SQL Azure (RTM) - 12.0.2000.8".into(),
                    "reader".into(),
                ]],
            ),
        )
        .with_query_response(
            "sqldoc:schemas */",
            result(
                &["schema_name", "principal_name"],
                vec![vec!["dbo".into(), "dbo".into()]],
            ),
        )
        .with_query_response(
            "sqldoc:tables */",
            result(
                &[
                    "schema_name",
                    "table_name",
                    "is_ms_shipped",
                    "create_date",
                    "modify_date",
                    "description",
                ],
                vec![table("Users"), table("Orders")],
            ),
        )
        .with_query_response(
            "sqldoc:columns */",
            result(
                &[
                    "schema_name",
                    "table_name",
                    "column_id",
                    "column_name",
                    "type_name",
                    "max_length",
                    "precision",
                    "scale",
                    "is_nullable",
                    "is_identity",
                    "is_computed",
                    "default_value",
                    "description",
                ],
                vec![
                    column("Users", 1, "Id", "int"),
                    column("Users", 2, "Age", "int"),
                    column("Orders", 1, "Id", "int"),
                ],
            ),
        )
        .with_query_response(
            "sqldoc:row_counts */",
            result(
                &["schema_name", "table_name", "row_count"],
                vec![
                    vec!["dbo".into(), "Users".into(), Value::Int64(10)],
                    vec!["dbo".into(), "Orders".into(), Value::Int64(2500)],
                ],
            ),
        )
}
