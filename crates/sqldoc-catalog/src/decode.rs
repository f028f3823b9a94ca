//! Decoding catalog query results into raw records
//!
//! Records keep the owning (schema, table) names and the catalog ordinal so the
//! builder can join and order them afterwards.

use crate::data_type::format_data_type;
use crate::model::{
    timestamp, CheckConstraint, Column, ForeignKey, Function, SchemaEntry, StoredProcedure, Table,
    Trigger, View,
};
use crate::Category;
use chrono::NaiveDateTime;
use sqldoc_core::{QueryResult, Row, Value};
use strum::IntoEnumIterator;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("column `{column}` is missing or null")]
    Missing { column: &'static str },

    #[error("column `{column}` has unexpected value {value}")]
    Invalid { column: &'static str, value: String },
}

/// Typed access to the columns of one catalog row
pub struct RowReader<'a> {
    row: &'a Row,
}

impl<'a> RowReader<'a> {
    pub fn new(row: &'a Row) -> Self {
        Self { row }
    }

    fn raw(&self, column: &'static str) -> Result<&'a Value, DecodeError> {
        self.row
            .get_by_name(column)
            .ok_or(DecodeError::Missing { column })
    }

    fn present(&self, column: &'static str) -> Result<Option<&'a Value>, DecodeError> {
        let value = self.raw(column)?;
        Ok((!value.is_null()).then_some(value))
    }

    fn invalid(column: &'static str, value: &Value) -> DecodeError {
        DecodeError::Invalid {
            column,
            value: value.to_string(),
        }
    }

    pub fn string(&self, column: &'static str) -> Result<String, DecodeError> {
        self.opt_string(column)?
            .ok_or(DecodeError::Missing { column })
    }

    /// Text value, `None` for NULL or blank text
    pub fn opt_string(&self, column: &'static str) -> Result<Option<String>, DecodeError> {
        match self.present(column)? {
            None => Ok(None),
            Some(value) => {
                let text = value
                    .as_str()
                    .ok_or_else(|| Self::invalid(column, value))?;
                Ok((!text.trim().is_empty()).then(|| text.to_string()))
            }
        }
    }

    /// Flag value, NULL reads as false
    pub fn flag(&self, column: &'static str) -> Result<bool, DecodeError> {
        match self.present(column)? {
            None => Ok(false),
            Some(value) => value.as_bool().ok_or_else(|| Self::invalid(column, value)),
        }
    }

    pub fn int(&self, column: &'static str) -> Result<i64, DecodeError> {
        let value = self
            .present(column)?
            .ok_or(DecodeError::Missing { column })?;
        value.as_i64().ok_or_else(|| Self::invalid(column, value))
    }

    pub fn count(&self, column: &'static str) -> Result<u64, DecodeError> {
        let value = self
            .present(column)?
            .ok_or(DecodeError::Missing { column })?;
        value
            .as_i64()
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| Self::invalid(column, value))
    }

    pub fn opt_float(&self, column: &'static str) -> Result<Option<f64>, DecodeError> {
        self.present(column)?
            .map(|value| value.as_f64().ok_or_else(|| Self::invalid(column, value)))
            .transpose()
    }

    /// Timestamp truncated to whole seconds
    pub fn opt_datetime(&self, column: &'static str) -> Result<Option<NaiveDateTime>, DecodeError> {
        self.present(column)?
            .map(|value| {
                value
                    .as_datetime()
                    .map(timestamp::truncate)
                    .ok_or_else(|| Self::invalid(column, value))
            })
            .transpose()
    }
}

/// Decode every row of a result, failing on the first bad row
pub fn decode_rows<T>(
    result: &QueryResult,
    decode: impl Fn(&RowReader<'_>) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    result
        .rows
        .iter()
        .map(|row| decode(&RowReader::new(row)))
        .collect()
}

/// A top-level catalog object with its shipped-by-Microsoft flag
#[derive(Debug, Clone, PartialEq)]
pub struct Shipped<T> {
    pub is_ms_shipped: bool,
    pub item: T,
}

/// A row that belongs to a table or view
#[derive(Debug, Clone, PartialEq)]
pub struct Owned<T> {
    pub schema_name: String,
    pub table_name: String,
    pub ordinal: i64,
    pub is_ms_shipped: bool,
    pub item: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyRow {
    pub ordinal: i64,
    pub is_ms_shipped: bool,
    pub foreign_key: ForeignKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumnRow {
    pub schema_name: String,
    pub table_name: String,
    pub index_name: String,
    pub index_type: String,
    pub is_unique: bool,
    pub is_primary_key: bool,
    pub column_name: String,
    pub key_ordinal: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseInfo {
    pub database_name: String,
    pub server_name: Option<String>,
    pub server_version: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DatabaseSize {
    pub size_mb: Option<f64>,
    pub used_mb: Option<f64>,
}

pub fn decode_database_info(result: &QueryResult) -> Result<Option<DatabaseInfo>, DecodeError> {
    let Some(row) = result.rows.first() else {
        return Ok(None);
    };
    let r = RowReader::new(row);
    Ok(Some(DatabaseInfo {
        database_name: r.string("database_name")?,
        server_name: r.opt_string("server_name")?,
        // @@VERSION spans several lines; the first names the product and build
        server_version: r
            .opt_string("server_version")?
            .and_then(|v| v.lines().next().map(|line| line.trim().to_string())),
        user_name: r.opt_string("user_name")?,
    }))
}

/// Decoded rows of every category, empty where a category was skipped or failed
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub schemas: Vec<SchemaEntry>,
    pub tables: Vec<Shipped<Table>>,
    pub columns: Vec<Owned<Column>>,
    pub primary_keys: Vec<Owned<String>>,
    pub foreign_keys: Vec<ForeignKeyRow>,
    pub indexes: Vec<IndexColumnRow>,
    pub check_constraints: Vec<Owned<CheckConstraint>>,
    pub triggers: Vec<Owned<Trigger>>,
    pub views: Vec<Shipped<View>>,
    pub view_columns: Vec<Owned<Column>>,
    pub stored_procedures: Vec<Shipped<StoredProcedure>>,
    pub functions: Vec<Shipped<Function>>,
    pub row_counts: Vec<Owned<u64>>,
    pub database_size: DatabaseSize,
}

impl CatalogSnapshot {
    /// Decode one category result into the snapshot
    pub fn absorb(&mut self, category: Category, result: &QueryResult) -> Result<(), DecodeError> {
        match category {
            Category::Schemas => self.schemas = decode_rows(result, decode_schema)?,
            Category::Tables => self.tables = decode_rows(result, decode_table)?,
            Category::Columns => self.columns = decode_rows(result, decode_column)?,
            Category::PrimaryKeys => self.primary_keys = decode_rows(result, decode_primary_key)?,
            Category::ForeignKeys => self.foreign_keys = decode_rows(result, decode_foreign_key)?,
            Category::Indexes => self.indexes = decode_rows(result, decode_index_column)?,
            Category::CheckConstraints => {
                self.check_constraints = decode_rows(result, decode_check_constraint)?
            }
            Category::Triggers => self.triggers = decode_rows(result, decode_trigger)?,
            Category::Views => self.views = decode_rows(result, decode_view)?,
            Category::ViewColumns => self.view_columns = decode_rows(result, decode_column)?,
            Category::StoredProcedures => {
                self.stored_procedures = decode_rows(result, decode_procedure)?
            }
            Category::Functions => self.functions = decode_rows(result, decode_function)?,
            Category::RowCounts => self.row_counts = decode_rows(result, decode_row_count)?,
            Category::DatabaseSize => {
                self.database_size = match result.rows.first() {
                    Some(row) => {
                        let r = RowReader::new(row);
                        DatabaseSize {
                            size_mb: r.opt_float("size_mb")?,
                            used_mb: r.opt_float("used_mb")?,
                        }
                    }
                    None => DatabaseSize::default(),
                }
            }
        }
        Ok(())
    }

    /// Drop the rows of one category, returning how many were dropped
    pub fn discard(&mut self, category: Category) -> usize {
        fn drain<T>(rows: &mut Vec<T>) -> usize {
            std::mem::take(rows).len()
        }
        match category {
            Category::Schemas => drain(&mut self.schemas),
            Category::Tables => drain(&mut self.tables),
            Category::Columns => drain(&mut self.columns),
            Category::PrimaryKeys => drain(&mut self.primary_keys),
            Category::ForeignKeys => drain(&mut self.foreign_keys),
            Category::Indexes => drain(&mut self.indexes),
            Category::CheckConstraints => drain(&mut self.check_constraints),
            Category::Triggers => drain(&mut self.triggers),
            Category::Views => drain(&mut self.views),
            Category::ViewColumns => drain(&mut self.view_columns),
            Category::StoredProcedures => drain(&mut self.stored_procedures),
            Category::Functions => drain(&mut self.functions),
            Category::RowCounts => drain(&mut self.row_counts),
            Category::DatabaseSize => {
                let had_size = self.database_size != DatabaseSize::default();
                self.database_size = DatabaseSize::default();
                usize::from(had_size)
            }
        }
    }

    /// Drop the table-only categories, returning the non-empty ones with their row counts
    pub fn discard_table_children(&mut self) -> Vec<(Category, usize)> {
        Category::iter()
            .filter(|c| c.is_table_child())
            .map(|c| (c, self.discard(c)))
            .filter(|(_, dropped)| *dropped > 0)
            .collect()
    }
}

fn decode_schema(r: &RowReader<'_>) -> Result<SchemaEntry, DecodeError> {
    Ok(SchemaEntry {
        name: r.string("schema_name")?,
        principal: r.opt_string("principal_name")?,
    })
}

fn decode_table(r: &RowReader<'_>) -> Result<Shipped<Table>, DecodeError> {
    Ok(Shipped {
        is_ms_shipped: r.flag("is_ms_shipped")?,
        item: Table {
            schema_name: r.string("schema_name")?,
            table_name: r.string("table_name")?,
            description: r.opt_string("description")?,
            created: r.opt_datetime("create_date")?,
            modified: r.opt_datetime("modify_date")?,
            row_count: None,
            columns: Vec::new(),
            primary_keys: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            check_constraints: Vec::new(),
            triggers: Vec::new(),
        },
    })
}

fn owned<T>(r: &RowReader<'_>, ordinal: i64, is_ms_shipped: bool, item: T) -> Result<Owned<T>, DecodeError> {
    Ok(Owned {
        schema_name: r.string("schema_name")?,
        table_name: r.string("table_name")?,
        ordinal,
        is_ms_shipped,
        item,
    })
}

fn decode_column(r: &RowReader<'_>) -> Result<Owned<Column>, DecodeError> {
    let type_name = r.string("type_name")?;
    let column = Column {
        name: r.string("column_name")?,
        data_type: format_data_type(
            &type_name,
            r.int("max_length")?,
            r.int("precision")?,
            r.int("scale")?,
        ),
        is_nullable: r.flag("is_nullable")?,
        is_identity: r.flag("is_identity")?,
        is_computed: r.flag("is_computed")?,
        default_value: r.opt_string("default_value")?,
        description: r.opt_string("description")?,
    };
    owned(r, r.int("column_id")?, false, column)
}

fn decode_primary_key(r: &RowReader<'_>) -> Result<Owned<String>, DecodeError> {
    owned(r, r.int("key_ordinal")?, false, r.string("column_name")?)
}

fn decode_foreign_key(r: &RowReader<'_>) -> Result<ForeignKeyRow, DecodeError> {
    Ok(ForeignKeyRow {
        ordinal: r.int("constraint_column_id")?,
        is_ms_shipped: r.flag("is_ms_shipped")?,
        foreign_key: ForeignKey {
            foreign_key_name: r.string("foreign_key_name")?,
            parent_schema: r.string("parent_schema")?,
            parent_table: r.string("parent_table")?,
            parent_column: r.string("parent_column")?,
            referenced_schema: r.string("referenced_schema")?,
            referenced_table: r.string("referenced_table")?,
            referenced_column: r.string("referenced_column")?,
            on_delete: r.string("on_delete")?,
            on_update: r.string("on_update")?,
        },
    })
}

fn decode_index_column(r: &RowReader<'_>) -> Result<IndexColumnRow, DecodeError> {
    Ok(IndexColumnRow {
        schema_name: r.string("schema_name")?,
        table_name: r.string("table_name")?,
        index_name: r.string("index_name")?,
        index_type: r.string("index_type")?,
        is_unique: r.flag("is_unique")?,
        is_primary_key: r.flag("is_primary_key")?,
        column_name: r.string("column_name")?,
        key_ordinal: r.int("key_ordinal")?,
    })
}

fn decode_check_constraint(r: &RowReader<'_>) -> Result<Owned<CheckConstraint>, DecodeError> {
    let constraint = CheckConstraint {
        constraint_name: r.string("constraint_name")?,
        definition: r.string("definition")?,
    };
    owned(r, 0, r.flag("is_ms_shipped")?, constraint)
}

fn decode_trigger(r: &RowReader<'_>) -> Result<Owned<Trigger>, DecodeError> {
    let trigger = Trigger {
        trigger_name: r.string("trigger_name")?,
        trigger_type: r.string("trigger_type")?,
        is_disabled: r.flag("is_disabled")?,
        description: r.opt_string("description")?,
    };
    owned(r, 0, r.flag("is_ms_shipped")?, trigger)
}

fn decode_view(r: &RowReader<'_>) -> Result<Shipped<View>, DecodeError> {
    Ok(Shipped {
        is_ms_shipped: r.flag("is_ms_shipped")?,
        item: View {
            schema_name: r.string("schema_name")?,
            view_name: r.string("view_name")?,
            description: r.opt_string("description")?,
            created: r.opt_datetime("create_date")?,
            modified: r.opt_datetime("modify_date")?,
            columns: Vec::new(),
        },
    })
}

fn decode_procedure(r: &RowReader<'_>) -> Result<Shipped<StoredProcedure>, DecodeError> {
    Ok(Shipped {
        is_ms_shipped: r.flag("is_ms_shipped")?,
        item: StoredProcedure {
            schema_name: r.string("schema_name")?,
            procedure_name: r.string("procedure_name")?,
            description: r.opt_string("description")?,
            created: r.opt_datetime("create_date")?,
            modified: r.opt_datetime("modify_date")?,
        },
    })
}

fn decode_function(r: &RowReader<'_>) -> Result<Shipped<Function>, DecodeError> {
    Ok(Shipped {
        is_ms_shipped: r.flag("is_ms_shipped")?,
        item: Function {
            schema_name: r.string("schema_name")?,
            function_name: r.string("function_name")?,
            function_type: r.string("function_type")?,
            description: r.opt_string("description")?,
            created: r.opt_datetime("create_date")?,
            modified: r.opt_datetime("modify_date")?,
        },
    })
}

fn decode_row_count(r: &RowReader<'_>) -> Result<Owned<u64>, DecodeError> {
    owned(r, 0, false, r.count("row_count")?)
}
