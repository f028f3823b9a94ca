//! Schema model fixtures

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use sqldoc_catalog::{
    Column, DatabaseMetadata, ForeignKey, Index, SchemaEntry, SchemaModel, StoredProcedure, Table,
    View,
};

pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap()
}

pub fn metadata(database_name: &str) -> DatabaseMetadata {
    DatabaseMetadata {
        database_name: database_name.into(),
        server_name: Some("sql01.database.windows.net".into()),
        server_version: Some("Microsoft SQL Azure (RTM) - 12.0.2000.8".into()),
        user_name: None,
        extraction_date: at(14, 9),
        size_mb: Some(1536.25),
        used_mb: None,
    }
}

pub fn column(name: &str, data_type: &str, nullable: bool, identity: bool) -> Column {
    Column {
        name: name.into(),
        data_type: data_type.into(),
        is_nullable: nullable,
        is_identity: identity,
        is_computed: false,
        default_value: None,
        description: None,
    }
}

pub fn table(schema: &str, name: &str, columns: Vec<Column>, row_count: Option<u64>) -> Table {
    Table {
        schema_name: schema.into(),
        table_name: name.into(),
        description: None,
        created: Some(at(1, 10)),
        modified: None,
        row_count,
        columns,
        primary_keys: Vec::new(),
        foreign_keys: Vec::new(),
        indexes: Vec::new(),
        check_constraints: Vec::new(),
        triggers: Vec::new(),
    }
}

fn dbo() -> SchemaEntry {
    SchemaEntry {
        name: "dbo".into(),
        principal: Some("dbo".into()),
    }
}

/// One schema, one table `dbo.Users (Id, Name)` with 10 rows and no foreign keys
pub fn users_model() -> SchemaModel {
    let mut users = table(
        "dbo",
        "Users",
        vec![
            column("Id", "int", false, true),
            column("Name", "nvarchar(50)", true, false),
        ],
        Some(10),
    );
    users.primary_keys = vec!["Id".into()];
    SchemaModel::new(
        metadata("sales"),
        vec![dbo()],
        vec![users],
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
    )
}

/// Two related tables, a view and a procedure
pub fn orders_model() -> SchemaModel {
    let fk = ForeignKey {
        foreign_key_name: "FK_Orders_Users".into(),
        parent_schema: "dbo".into(),
        parent_table: "Orders".into(),
        parent_column: "UserId".into(),
        referenced_schema: "dbo".into(),
        referenced_table: "Users".into(),
        referenced_column: "Id".into(),
        on_delete: "CASCADE".into(),
        on_update: "NO_ACTION".into(),
    };

    let mut users = table(
        "dbo",
        "Users",
        vec![column("Id", "int", false, true), column("Email", "nvarchar(100)", false, false)],
        None,
    );
    users.primary_keys = vec!["Id".into()];
    users.description = Some("Customers <and> staff".into());

    let mut orders = table(
        "dbo",
        "Orders",
        vec![
            column("Id", "int", false, true),
            column("UserId", "int", false, false),
            column("Total", "decimal(18,2)", true, false),
        ],
        Some(1_234_567),
    );
    orders.primary_keys = vec!["Id".into()];
    orders.foreign_keys = vec![fk.clone()];
    orders.indexes = vec![Index {
        index_name: "PK_Orders".into(),
        index_type: "CLUSTERED".into(),
        is_unique: true,
        is_primary_key: true,
        columns: vec!["Id".into()],
    }];

    let view = View {
        schema_name: "dbo".into(),
        view_name: "BigOrders".into(),
        description: None,
        created: Some(at(3, 8)),
        modified: Some(at(4, 8)),
        columns: vec![column("Id", "int", false, false)],
    };
    let procedure = StoredProcedure {
        schema_name: "dbo".into(),
        procedure_name: "usp_PlaceOrder".into(),
        description: Some("Places an order".into()),
        created: Some(at(5, 8)),
        modified: Some(at(6, 8)),
    };

    SchemaModel::new(
        metadata("shop"),
        vec![dbo()],
        vec![orders, users],
        vec![view],
        vec![procedure],
        Vec::new(),
        vec![fk],
    )
}
