//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use sqldoc_core::{Connection, ConnectionProvider, QueryResult, Result, SqldocError, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone)]
enum Response {
    Rows(QueryResult),
    Failure(String),
}

/// Mock connection answering catalog queries by SQL pattern.
///
/// Responses registered later win over earlier ones, so a test can start from
/// [`sample_catalog`] and override single categories.
#[derive(Clone)]
pub struct MockConnection {
    responses: Vec<(String, Response)>,
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

    /// Register a response for queries containing the given SQL pattern.
    pub fn with_query_response(mut self, sql_contains: impl Into<String>, result: QueryResult) -> Self {
        self.responses
            .push((sql_contains.into(), Response::Rows(result)));
        self
    }

    /// Make queries containing the pattern fail.
    pub fn with_query_failure(mut self, sql_contains: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses
            .push((sql_contains.into(), Response::Failure(message.into())));
        self
    }

    pub fn query_log(&self) -> Vec<String> {
        self.query_log.lock().clone()
    }

    pub fn queries_matching(&self, pattern: &str) -> usize {
        self.query_log
            .lock()
            .iter()
            .filter(|sql| sql.contains(pattern))
            .count()
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
                return match response {
                    Response::Rows(result) => Ok(result.clone()),
                    Response::Failure(message) => Err(SqldocError::Query(message.clone())),
                };
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

/// Provider handing out clones of one mock per acquire, as a pool would
pub struct MockPool {
    pub connection: MockConnection,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub refuse: bool,
}

impl MockPool {
    pub fn new(connection: MockConnection) -> Self {
        Self {
            connection,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            refuse: false,
        }
    }

    pub fn refusing(connection: MockConnection) -> Self {
        Self {
            refuse: true,
            ..Self::new(connection)
        }
    }
}

#[async_trait]
impl ConnectionProvider for MockPool {
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        if self.refuse {
            return Err(SqldocError::Connection("login failed for user 'reader'".into()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.connection.clone()))
    }

    async fn release(&self, _connection: Arc<dyn Connection>) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn supports_concurrency(&self) -> bool {
        true
    }
}

pub fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
    QueryResult::from_rows(columns, rows)
}

pub fn timestamp(day: u32) -> Value {
    Value::DateTime(
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|d| d.and_hms_milli_opt(8, 30, 15, 250))
            .unwrap(),
    )
}

fn column(
    schema: &str,
    table: &str,
    id: i32,
    name: &str,
    type_name: &str,
    max_length: i16,
    precision: i32,
    scale: i32,
    flags: (bool, bool),
    default_value: Option<&str>,
    description: Option<&str>,
) -> Vec<Value> {
    vec![
        schema.into(),
        table.into(),
        Value::Int32(id),
        name.into(),
        type_name.into(),
        Value::Int16(max_length),
        Value::Int32(precision),
        Value::Int32(scale),
        Value::Bool(flags.0),
        Value::Bool(flags.1),
        Value::Bool(false),
        default_value.into(),
        description.into(),
    ]
}

const COLUMN_FIELDS: &[&str] = &[
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
];

/// A small database: dbo.Users, dbo.Orders, sales.Regions, one view, one
/// procedure, one function and a shipped dbo.sysdiagrams table
pub fn sample_catalog() -> MockConnection {
    MockConnection::new()
        .with_query_response(
            "sqldoc:database_info */",
            result(
                &["database_name", "server_name", "server_version", "user_name"],
                vec![vec![
                    "sales".into(),
                    "sql01.database.windows.net".into(),
                    "Microsoft SQL Azure (RTM) - 12.0.2000.8\n\tCopyright (C) 2022 Microsoft Corporation".into(),
                    "reader".into(),
                ]],
            ),
        )
        .with_query_response(
            "sqldoc:schemas */",
            result(
                &["schema_name", "principal_name"],
                vec![
                    vec!["dbo".into(), "dbo".into()],
                    vec!["sales".into(), "dbo".into()],
                    vec!["sys".into(), "sys".into()],
                    vec!["db_owner".into(), "db_owner".into()],
                ],
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
                vec![
                    vec![
                        "dbo".into(),
                        "Users".into(),
                        Value::Bool(false),
                        timestamp(2),
                        timestamp(3),
                        "Application users".into(),
                    ],
                    vec![
                        "sales".into(),
                        "Regions".into(),
                        Value::Bool(false),
                        timestamp(4),
                        Value::Null,
                        Value::Null,
                    ],
                    vec![
                        "dbo".into(),
                        "Orders".into(),
                        Value::Bool(false),
                        timestamp(2),
                        timestamp(5),
                        Value::Null,
                    ],
                    vec![
                        "dbo".into(),
                        "sysdiagrams".into(),
                        Value::Bool(true),
                        timestamp(1),
                        timestamp(1),
                        Value::Null,
                    ],
                ],
            ),
        )
        .with_query_response(
            "sqldoc:columns */",
            result(
                COLUMN_FIELDS,
                vec![
                    column("dbo", "Users", 1, "Id", "int", 4, 10, 0, (false, true), None, Some("Surrogate key")),
                    column("dbo", "Users", 2, "Email", "nvarchar", 200, 0, 0, (false, false), None, None),
                    column("dbo", "Users", 3, "CreatedAt", "datetime2", 8, 27, 7, (false, false), Some("(sysutcdatetime())"), None),
                    column("dbo", "Orders", 1, "Id", "int", 4, 10, 0, (false, true), None, None),
                    column("dbo", "Orders", 2, "UserId", "int", 4, 10, 0, (false, false), None, None),
                    column("dbo", "Orders", 3, "Total", "decimal", 9, 18, 2, (true, false), None, None),
                    column("sales", "Regions", 1, "Code", "char", 2, 0, 0, (false, false), None, None),
                    column("sales", "Regions", 2, "Notes", "nvarchar", -1, 0, 0, (true, false), None, None),
                    column("dbo", "sysdiagrams", 1, "name", "sysname", 256, 0, 0, (false, false), None, None),
                ],
            ),
        )
        .with_query_response(
            "sqldoc:primary_keys */",
            result(
                &["schema_name", "table_name", "column_name", "key_ordinal"],
                vec![
                    vec!["dbo".into(), "Users".into(), "Id".into(), Value::Int32(1)],
                    vec!["dbo".into(), "Orders".into(), "Id".into(), Value::Int32(1)],
                    vec!["sales".into(), "Regions".into(), "Code".into(), Value::Int32(1)],
                ],
            ),
        )
        .with_query_response(
            "sqldoc:foreign_keys */",
            result(
                &[
                    "foreign_key_name",
                    "parent_schema",
                    "parent_table",
                    "parent_column",
                    "referenced_schema",
                    "referenced_table",
                    "referenced_column",
                    "on_delete",
                    "on_update",
                    "constraint_column_id",
                    "is_ms_shipped",
                ],
                vec![vec![
                    "FK_Orders_Users".into(),
                    "dbo".into(),
                    "Orders".into(),
                    "UserId".into(),
                    "dbo".into(),
                    "Users".into(),
                    "Id".into(),
                    "CASCADE".into(),
                    "NO_ACTION".into(),
                    Value::Int32(1),
                    Value::Bool(false),
                ]],
            ),
        )
        .with_query_response(
            "sqldoc:indexes */",
            result(
                &[
                    "schema_name",
                    "table_name",
                    "index_name",
                    "index_type",
                    "is_unique",
                    "is_primary_key",
                    "column_name",
                    "key_ordinal",
                ],
                vec![
                    vec![
                        "dbo".into(),
                        "Users".into(),
                        "PK_Users".into(),
                        "CLUSTERED".into(),
                        Value::Bool(true),
                        Value::Bool(true),
                        "Id".into(),
                        Value::Int32(1),
                    ],
                    vec![
                        "dbo".into(),
                        "Orders".into(),
                        "IX_Orders_UserId".into(),
                        "NONCLUSTERED".into(),
                        Value::Bool(false),
                        Value::Bool(false),
                        "UserId".into(),
                        Value::Int32(1),
                    ],
                    vec![
                        "dbo".into(),
                        "Orders".into(),
                        "PK_Orders".into(),
                        "CLUSTERED".into(),
                        Value::Bool(true),
                        Value::Bool(true),
                        "Id".into(),
                        Value::Int32(1),
                    ],
                ],
            ),
        )
        .with_query_response(
            "sqldoc:check_constraints */",
            result(
                &["schema_name", "table_name", "constraint_name", "definition", "is_ms_shipped"],
                vec![vec![
                    "dbo".into(),
                    "Orders".into(),
                    "CK_Orders_Total".into(),
                    "([Total]>=(0))".into(),
                    Value::Bool(false),
                ]],
            ),
        )
        .with_query_response(
            "sqldoc:triggers */",
            result(
                &[
                    "schema_name",
                    "table_name",
                    "trigger_name",
                    "trigger_type",
                    "is_disabled",
                    "is_ms_shipped",
                    "description",
                ],
                vec![vec![
                    "dbo".into(),
                    "Users".into(),
                    "trg_Users_Audit".into(),
                    "SQL_TRIGGER".into(),
                    Value::Bool(false),
                    Value::Bool(false),
                    "Writes audit rows".into(),
                ]],
            ),
        )
        .with_query_response(
            "sqldoc:views */",
            result(
                &["schema_name", "view_name", "is_ms_shipped", "create_date", "modify_date", "description"],
                vec![vec![
                    "dbo".into(),
                    "ActiveUsers".into(),
                    Value::Bool(false),
                    timestamp(6),
                    timestamp(6),
                    Value::Null,
                ]],
            ),
        )
        .with_query_response(
            "sqldoc:view_columns */",
            result(
                COLUMN_FIELDS,
                vec![
                    column("dbo", "ActiveUsers", 2, "Email", "nvarchar", 200, 0, 0, (false, false), None, None),
                    column("dbo", "ActiveUsers", 1, "Id", "int", 4, 10, 0, (false, false), None, None),
                ],
            ),
        )
        .with_query_response(
            "sqldoc:stored_procedures */",
            result(
                &["schema_name", "procedure_name", "is_ms_shipped", "create_date", "modify_date", "description"],
                vec![
                    vec![
                        "dbo".into(),
                        "usp_GetUser".into(),
                        Value::Bool(false),
                        timestamp(7),
                        timestamp(7),
                        "Fetch one user".into(),
                    ],
                    vec![
                        "dbo".into(),
                        "sp_upgraddiagrams".into(),
                        Value::Bool(true),
                        timestamp(1),
                        timestamp(1),
                        Value::Null,
                    ],
                ],
            ),
        )
        .with_query_response(
            "sqldoc:functions */",
            result(
                &[
                    "schema_name",
                    "function_name",
                    "function_type",
                    "is_ms_shipped",
                    "create_date",
                    "modify_date",
                    "description",
                ],
                vec![vec![
                    "dbo".into(),
                    "fn_OrderTotal".into(),
                    "SQL_SCALAR_FUNCTION".into(),
                    Value::Bool(false),
                    timestamp(8),
                    timestamp(9),
                    Value::Null,
                ]],
            ),
        )
        .with_query_response(
            "sqldoc:row_counts */",
            result(
                &["schema_name", "table_name", "row_count"],
                vec![
                    vec!["dbo".into(), "Users".into(), Value::Int64(1500)],
                    vec!["dbo".into(), "Orders".into(), Value::Int64(1_234_567)],
                    vec!["sales".into(), "Regions".into(), Value::Int64(0)],
                    vec!["dbo".into(), "sysdiagrams".into(), Value::Int64(0)],
                ],
            ),
        )
        .with_query_response(
            "sqldoc:database_size */",
            result(
                &["size_mb", "used_mb"],
                vec![vec![Value::Float64(2048.0), Value::Float64(1536.5)]],
            ),
        )
}
