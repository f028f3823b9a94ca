//! Catalog categories and the query each one runs
//!
//! Every query reads the whole database in one round trip and tags itself with
//! a leading `/* sqldoc:<category> */` comment so it can be recognised in
//! server-side traces. Filtering of system objects happens client side.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};

/// Tag of the probe that reads database identity
pub const DATABASE_INFO_TAG: &str = "/* sqldoc:database_info */";

pub const DATABASE_INFO_SQL: &str = "/* sqldoc:database_info */
SELECT
    DB_NAME() AS database_name,
    CAST(SERVERPROPERTY('ServerName') AS nvarchar(256)) AS server_name,
    CAST(@@VERSION AS nvarchar(4000)) AS server_version,
    SUSER_SNAME() AS user_name";

/// One independently fetched slice of the system catalog
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Schemas,
    Tables,
    Columns,
    PrimaryKeys,
    ForeignKeys,
    Indexes,
    CheckConstraints,
    Triggers,
    Views,
    ViewColumns,
    StoredProcedures,
    Functions,
    RowCounts,
    DatabaseSize,
}

impl Category {
    /// Categories whose rows only exist attached to a table.
    ///
    /// Foreign keys are not among them: they are also listed on their own as
    /// relationships.
    pub fn is_table_child(self) -> bool {
        matches!(
            self,
            Category::Columns
                | Category::PrimaryKeys
                | Category::Indexes
                | Category::CheckConstraints
                | Category::Triggers
                | Category::RowCounts
        )
    }

    pub fn sql(self) -> &'static str {
        match self {
            Category::Schemas => SCHEMAS_SQL,
            Category::Tables => TABLES_SQL,
            Category::Columns => COLUMNS_SQL,
            Category::PrimaryKeys => PRIMARY_KEYS_SQL,
            Category::ForeignKeys => FOREIGN_KEYS_SQL,
            Category::Indexes => INDEXES_SQL,
            Category::CheckConstraints => CHECK_CONSTRAINTS_SQL,
            Category::Triggers => TRIGGERS_SQL,
            Category::Views => VIEWS_SQL,
            Category::ViewColumns => VIEW_COLUMNS_SQL,
            Category::StoredProcedures => STORED_PROCEDURES_SQL,
            Category::Functions => FUNCTIONS_SQL,
            Category::RowCounts => ROW_COUNTS_SQL,
            Category::DatabaseSize => DATABASE_SIZE_SQL,
        }
    }
}

/// Exact row count of a single table
pub fn exact_row_count_sql(schema_name: &str, table_name: &str) -> String {
    format!(
        "/* sqldoc:row_counts */ SELECT COUNT_BIG(*) AS row_count FROM {}.{}",
        quote_identifier(schema_name),
        quote_identifier(table_name)
    )
}

/// Bracket-quote an identifier, doubling any closing bracket
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

const SCHEMAS_SQL: &str = "/* sqldoc:schemas */
SELECT
    s.name AS schema_name,
    p.name AS principal_name
FROM sys.schemas s
LEFT JOIN sys.database_principals p ON s.principal_id = p.principal_id
ORDER BY s.name";

const TABLES_SQL: &str = "/* sqldoc:tables */
SELECT
    s.name AS schema_name,
    t.name AS table_name,
    t.is_ms_shipped,
    t.create_date,
    t.modify_date,
    CAST(ep.value AS nvarchar(4000)) AS description
FROM sys.tables t
INNER JOIN sys.schemas s ON t.schema_id = s.schema_id
LEFT JOIN sys.extended_properties ep
    ON ep.major_id = t.object_id AND ep.minor_id = 0
    AND ep.class = 1 AND ep.name = 'MS_Description'
ORDER BY s.name, t.name";

const COLUMNS_SQL: &str = "/* sqldoc:columns */
SELECT
    s.name AS schema_name,
    t.name AS table_name,
    c.column_id,
    c.name AS column_name,
    ty.name AS type_name,
    c.max_length,
    c.precision,
    c.scale,
    c.is_nullable,
    c.is_identity,
    c.is_computed,
    dc.definition AS default_value,
    CAST(ep.value AS nvarchar(4000)) AS description
FROM sys.columns c
INNER JOIN sys.tables t ON c.object_id = t.object_id
INNER JOIN sys.schemas s ON t.schema_id = s.schema_id
INNER JOIN sys.types ty ON c.user_type_id = ty.user_type_id
LEFT JOIN sys.default_constraints dc ON c.default_object_id = dc.object_id
LEFT JOIN sys.extended_properties ep
    ON ep.major_id = c.object_id AND ep.minor_id = c.column_id
    AND ep.class = 1 AND ep.name = 'MS_Description'
ORDER BY s.name, t.name, c.column_id";

const PRIMARY_KEYS_SQL: &str = "/* sqldoc:primary_keys */
SELECT
    s.name AS schema_name,
    t.name AS table_name,
    c.name AS column_name,
    ic.key_ordinal
FROM sys.key_constraints kc
INNER JOIN sys.tables t ON kc.parent_object_id = t.object_id
INNER JOIN sys.schemas s ON t.schema_id = s.schema_id
INNER JOIN sys.index_columns ic
    ON ic.object_id = kc.parent_object_id AND ic.index_id = kc.unique_index_id
INNER JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
WHERE kc.type = 'PK'
ORDER BY s.name, t.name, ic.key_ordinal";

const FOREIGN_KEYS_SQL: &str = "/* sqldoc:foreign_keys */
SELECT
    fk.name AS foreign_key_name,
    ps.name AS parent_schema,
    pt.name AS parent_table,
    pc.name AS parent_column,
    rs.name AS referenced_schema,
    rt.name AS referenced_table,
    rc.name AS referenced_column,
    fk.delete_referential_action_desc AS on_delete,
    fk.update_referential_action_desc AS on_update,
    fkc.constraint_column_id,
    fk.is_ms_shipped
FROM sys.foreign_keys fk
INNER JOIN sys.foreign_key_columns fkc ON fk.object_id = fkc.constraint_object_id
INNER JOIN sys.tables pt ON fkc.parent_object_id = pt.object_id
INNER JOIN sys.schemas ps ON pt.schema_id = ps.schema_id
INNER JOIN sys.columns pc
    ON fkc.parent_object_id = pc.object_id AND fkc.parent_column_id = pc.column_id
INNER JOIN sys.tables rt ON fkc.referenced_object_id = rt.object_id
INNER JOIN sys.schemas rs ON rt.schema_id = rs.schema_id
INNER JOIN sys.columns rc
    ON fkc.referenced_object_id = rc.object_id AND fkc.referenced_column_id = rc.column_id
ORDER BY ps.name, pt.name, fk.name, fkc.constraint_column_id";

const INDEXES_SQL: &str = "/* sqldoc:indexes */
SELECT
    s.name AS schema_name,
    t.name AS table_name,
    i.name AS index_name,
    i.type_desc AS index_type,
    i.is_unique,
    i.is_primary_key,
    c.name AS column_name,
    ic.key_ordinal
FROM sys.indexes i
INNER JOIN sys.tables t ON i.object_id = t.object_id
INNER JOIN sys.schemas s ON t.schema_id = s.schema_id
INNER JOIN sys.index_columns ic ON i.object_id = ic.object_id AND i.index_id = ic.index_id
INNER JOIN sys.columns c ON ic.object_id = c.object_id AND ic.column_id = c.column_id
WHERE i.type > 0 AND ic.is_included_column = 0
ORDER BY s.name, t.name, i.name, ic.key_ordinal";

const CHECK_CONSTRAINTS_SQL: &str = "/* sqldoc:check_constraints */
SELECT
    s.name AS schema_name,
    t.name AS table_name,
    cc.name AS constraint_name,
    cc.definition,
    cc.is_ms_shipped
FROM sys.check_constraints cc
INNER JOIN sys.tables t ON cc.parent_object_id = t.object_id
INNER JOIN sys.schemas s ON t.schema_id = s.schema_id
ORDER BY s.name, t.name, cc.name";

const TRIGGERS_SQL: &str = "/* sqldoc:triggers */
SELECT
    s.name AS schema_name,
    t.name AS table_name,
    tr.name AS trigger_name,
    tr.type_desc AS trigger_type,
    tr.is_disabled,
    tr.is_ms_shipped,
    CAST(ep.value AS nvarchar(4000)) AS description
FROM sys.triggers tr
INNER JOIN sys.tables t ON tr.parent_id = t.object_id
INNER JOIN sys.schemas s ON t.schema_id = s.schema_id
LEFT JOIN sys.extended_properties ep
    ON ep.major_id = tr.object_id AND ep.minor_id = 0
    AND ep.class = 1 AND ep.name = 'MS_Description'
ORDER BY s.name, t.name, tr.name";

const VIEWS_SQL: &str = "/* sqldoc:views */
SELECT
    s.name AS schema_name,
    v.name AS view_name,
    v.is_ms_shipped,
    v.create_date,
    v.modify_date,
    CAST(ep.value AS nvarchar(4000)) AS description
FROM sys.views v
INNER JOIN sys.schemas s ON v.schema_id = s.schema_id
LEFT JOIN sys.extended_properties ep
    ON ep.major_id = v.object_id AND ep.minor_id = 0
    AND ep.class = 1 AND ep.name = 'MS_Description'
ORDER BY s.name, v.name";

const VIEW_COLUMNS_SQL: &str = "/* sqldoc:view_columns */
SELECT
    s.name AS schema_name,
    v.name AS table_name,
    c.column_id,
    c.name AS column_name,
    ty.name AS type_name,
    c.max_length,
    c.precision,
    c.scale,
    c.is_nullable,
    c.is_identity,
    c.is_computed,
    CAST(NULL AS nvarchar(4000)) AS default_value,
    CAST(ep.value AS nvarchar(4000)) AS description
FROM sys.columns c
INNER JOIN sys.views v ON c.object_id = v.object_id
INNER JOIN sys.schemas s ON v.schema_id = s.schema_id
INNER JOIN sys.types ty ON c.user_type_id = ty.user_type_id
LEFT JOIN sys.extended_properties ep
    ON ep.major_id = c.object_id AND ep.minor_id = c.column_id
    AND ep.class = 1 AND ep.name = 'MS_Description'
ORDER BY s.name, v.name, c.column_id";

const STORED_PROCEDURES_SQL: &str = "/* sqldoc:stored_procedures */
SELECT
    s.name AS schema_name,
    p.name AS procedure_name,
    p.is_ms_shipped,
    p.create_date,
    p.modify_date,
    CAST(ep.value AS nvarchar(4000)) AS description
FROM sys.procedures p
INNER JOIN sys.schemas s ON p.schema_id = s.schema_id
LEFT JOIN sys.extended_properties ep
    ON ep.major_id = p.object_id AND ep.minor_id = 0
    AND ep.class = 1 AND ep.name = 'MS_Description'
ORDER BY s.name, p.name";

const FUNCTIONS_SQL: &str = "/* sqldoc:functions */
SELECT
    s.name AS schema_name,
    o.name AS function_name,
    o.type_desc AS function_type,
    o.is_ms_shipped,
    o.create_date,
    o.modify_date,
    CAST(ep.value AS nvarchar(4000)) AS description
FROM sys.objects o
INNER JOIN sys.schemas s ON o.schema_id = s.schema_id
LEFT JOIN sys.extended_properties ep
    ON ep.major_id = o.object_id AND ep.minor_id = 0
    AND ep.class = 1 AND ep.name = 'MS_Description'
WHERE o.type IN ('FN', 'IF', 'TF', 'FS', 'FT')
ORDER BY s.name, o.name";

const ROW_COUNTS_SQL: &str = "/* sqldoc:row_counts */
SELECT
    s.name AS schema_name,
    t.name AS table_name,
    SUM(p.rows) AS row_count
FROM sys.tables t
INNER JOIN sys.schemas s ON t.schema_id = s.schema_id
INNER JOIN sys.partitions p ON t.object_id = p.object_id AND p.index_id IN (0, 1)
GROUP BY s.name, t.name
ORDER BY s.name, t.name";

const DATABASE_SIZE_SQL: &str = "/* sqldoc:database_size */
SELECT
    CAST(SUM(CAST(size AS bigint)) * 8 / 1024.0 AS float) AS size_mb,
    CAST(SUM(CAST(FILEPROPERTY(name, 'SpaceUsed') AS bigint)) * 8 / 1024.0 AS float) AS used_mb
FROM sys.database_files";

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_query_is_tagged_with_its_category() {
        for category in Category::iter() {
            let tag = format!("/* sqldoc:{} */", category);
            assert!(
                category.sql().starts_with(&tag),
                "{} query should start with {}",
                category,
                tag
            );
        }
        assert!(DATABASE_INFO_SQL.starts_with(DATABASE_INFO_TAG));
    }

    #[test]
    fn test_category_names_are_snake_case() {
        assert_eq!(Category::PrimaryKeys.to_string(), "primary_keys");
        assert_eq!(Category::ViewColumns.as_ref(), "view_columns");
        assert_eq!(
            serde_json::to_string(&Category::CheckConstraints).unwrap(),
            "\"check_constraints\""
        );
    }

    #[test]
    fn test_table_children() {
        let children: Vec<_> = Category::iter().filter(|c| c.is_table_child()).collect();
        assert_eq!(
            children,
            vec![
                Category::Columns,
                Category::PrimaryKeys,
                Category::Indexes,
                Category::CheckConstraints,
                Category::Triggers,
                Category::RowCounts,
            ]
        );
        assert!(!Category::ForeignKeys.is_table_child());
    }

    #[test]
    fn test_exact_count_quotes_identifiers() {
        assert_eq!(
            exact_row_count_sql("dbo", "Odd]Name"),
            "/* sqldoc:row_counts */ SELECT COUNT_BIG(*) AS row_count FROM [dbo].[Odd]]Name]"
        );
    }
}
