//! The schema model produced by one extraction run
//!
//! Every type here serializes field-for-field, so the JSON document is the
//! model itself. Timestamps are written in [`DATE_FORMAT`] and carry whole
//! seconds only, which keeps a serialize/parse round trip exact.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The one date format used by every output
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How many tables `Statistics::largest_tables` keeps
pub const LARGEST_TABLES_LIMIT: usize = 10;

/// Root aggregate for one database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub metadata: DatabaseMetadata,
    pub schemas: Vec<SchemaEntry>,
    pub tables: Vec<Table>,
    pub views: Vec<View>,
    pub stored_procedures: Vec<StoredProcedure>,
    pub functions: Vec<Function>,
    pub relationships: Relationships,
    pub statistics: Statistics,
}

impl SchemaModel {
    /// Assemble a model, deriving relationship counts and statistics from the collections
    pub fn new(
        metadata: DatabaseMetadata,
        schemas: Vec<SchemaEntry>,
        tables: Vec<Table>,
        views: Vec<View>,
        stored_procedures: Vec<StoredProcedure>,
        functions: Vec<Function>,
        foreign_keys: Vec<ForeignKey>,
    ) -> Self {
        let statistics = Statistics::compute(
            &schemas,
            &tables,
            &views,
            &stored_procedures,
            &functions,
        );
        Self {
            metadata,
            schemas,
            tables,
            views,
            stored_procedures,
            functions,
            relationships: Relationships::new(foreign_keys),
            statistics,
        }
    }

    /// Look up a table by exact schema and table name
    pub fn table(&self, schema_name: &str, table_name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.schema_name == schema_name && t.table_name == table_name)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    pub database_name: String,
    pub server_name: Option<String>,
    pub server_version: Option<String>,
    pub user_name: Option<String>,
    #[serde(with = "timestamp")]
    pub extraction_date: NaiveDateTime,
    pub size_mb: Option<f64>,
    pub used_mb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub name: String,
    pub principal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub schema_name: String,
    pub table_name: String,
    pub description: Option<String>,
    #[serde(with = "timestamp::option")]
    pub created: Option<NaiveDateTime>,
    #[serde(with = "timestamp::option")]
    pub modified: Option<NaiveDateTime>,
    /// `None` when the count was not fetched or could not be read
    pub row_count: Option<u64>,
    pub columns: Vec<Column>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<Index>,
    pub check_constraints: Vec<CheckConstraint>,
    pub triggers: Vec<Trigger>,
}

impl Table {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Display form, e.g. `nvarchar(50)` or `decimal(18,2)`
    pub data_type: String,
    pub is_nullable: bool,
    pub is_identity: bool,
    pub is_computed: bool,
    pub default_value: Option<String>,
    pub description: Option<String>,
}

/// One column pair of a foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub foreign_key_name: String,
    pub parent_schema: String,
    pub parent_table: String,
    pub parent_column: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_delete: String,
    pub on_update: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub index_name: String,
    pub index_type: String,
    pub is_unique: bool,
    pub is_primary_key: bool,
    /// Key columns in key order
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub constraint_name: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub trigger_name: String,
    pub trigger_type: String,
    pub is_disabled: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub schema_name: String,
    pub view_name: String,
    pub description: Option<String>,
    #[serde(with = "timestamp::option")]
    pub created: Option<NaiveDateTime>,
    #[serde(with = "timestamp::option")]
    pub modified: Option<NaiveDateTime>,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProcedure {
    pub schema_name: String,
    pub procedure_name: String,
    pub description: Option<String>,
    #[serde(with = "timestamp::option")]
    pub created: Option<NaiveDateTime>,
    #[serde(with = "timestamp::option")]
    pub modified: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub schema_name: String,
    pub function_name: String,
    /// Catalog type description, e.g. `SQL_SCALAR_FUNCTION`
    pub function_type: String,
    pub description: Option<String>,
    #[serde(with = "timestamp::option")]
    pub created: Option<NaiveDateTime>,
    #[serde(with = "timestamp::option")]
    pub modified: Option<NaiveDateTime>,
}

/// Every foreign key column pair in the database, including ones whose
/// tables were not extracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationships {
    pub foreign_keys: Vec<ForeignKey>,
    pub relationship_count: usize,
}

impl Relationships {
    pub fn new(foreign_keys: Vec<ForeignKey>) -> Self {
        Self {
            relationship_count: foreign_keys.len(),
            foreign_keys,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_schemas: usize,
    pub total_tables: usize,
    pub total_views: usize,
    pub total_procedures: usize,
    pub total_functions: usize,
    pub total_columns: usize,
    /// Sum over tables with a known row count
    pub total_rows: u64,
    pub largest_tables: Vec<TableRowCount>,
}

impl Statistics {
    pub fn compute(
        schemas: &[SchemaEntry],
        tables: &[Table],
        views: &[View],
        procedures: &[StoredProcedure],
        functions: &[Function],
    ) -> Self {
        let mut counted: Vec<TableRowCount> = tables
            .iter()
            .filter_map(|t| {
                t.row_count.map(|row_count| TableRowCount {
                    schema_name: t.schema_name.clone(),
                    table_name: t.table_name.clone(),
                    row_count,
                })
            })
            .collect();
        let total_rows = counted.iter().map(|t| t.row_count).sum();

        counted.sort_by(|a, b| {
            b.row_count
                .cmp(&a.row_count)
                .then_with(|| a.schema_name.cmp(&b.schema_name))
                .then_with(|| a.table_name.cmp(&b.table_name))
        });
        counted.truncate(LARGEST_TABLES_LIMIT);

        Self {
            total_schemas: schemas.len(),
            total_tables: tables.len(),
            total_views: views.len(),
            total_procedures: procedures.len(),
            total_functions: functions.len(),
            total_columns: tables.iter().map(|t| t.columns.len()).sum(),
            total_rows,
            largest_tables: counted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRowCount {
    pub schema_name: String,
    pub table_name: String,
    pub row_count: u64,
}

/// Serde adapters for [`DATE_FORMAT`] timestamps
pub mod timestamp {
    use super::DATE_FORMAT;
    use chrono::{NaiveDateTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Drop sub-second precision so the value survives formatting
    pub fn truncate(value: NaiveDateTime) -> NaiveDateTime {
        value.with_nanosecond(0).unwrap_or(value)
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(DATE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, DATE_FORMAT).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|text| {
                    NaiveDateTime::parse_from_str(&text, DATE_FORMAT)
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}
