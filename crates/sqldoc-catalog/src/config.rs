use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Schemas that belong to SQL Server itself or to its fixed database roles
pub const SYSTEM_SCHEMAS: &[&str] = &[
    "sys",
    "INFORMATION_SCHEMA",
    "guest",
    "db_owner",
    "db_accessadmin",
    "db_securityadmin",
    "db_ddladmin",
    "db_backupoperator",
    "db_datareader",
    "db_datawriter",
    "db_denydatareader",
    "db_denydatawriter",
];

pub fn is_system_schema(name: &str) -> bool {
    SYSTEM_SCHEMAS.iter().any(|s| s.eq_ignore_ascii_case(name))
}

/// How child rows are matched to their table by (schema, table) name
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NameMatching {
    #[default]
    CaseSensitive,
    CaseInsensitive,
}

impl NameMatching {
    pub(crate) fn key(self, schema_name: &str, table_name: &str) -> (String, String) {
        match self {
            NameMatching::CaseSensitive => (schema_name.to_string(), table_name.to_string()),
            NameMatching::CaseInsensitive => (schema_name.to_lowercase(), table_name.to_lowercase()),
        }
    }
}

/// Where table row counts come from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RowCountStrategy {
    /// One query summing `sys.partitions`; approximate but cheap
    #[default]
    CatalogStatistics,
    /// `COUNT_BIG(*)` per table
    ExactCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub include_system_objects: bool,
    pub include_row_counts: bool,
    pub row_count_strategy: RowCountStrategy,
    pub name_matching: NameMatching,
    /// Fetch categories on separate connections at the same time when the
    /// connection provider allows it
    pub concurrent_categories: bool,
}

impl ExtractorConfig {
    /// Whether an object survives the system object filter
    pub fn keeps_object(&self, schema_name: &str, is_ms_shipped: bool) -> bool {
        self.include_system_objects || !(is_ms_shipped || is_system_schema(schema_name))
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            include_system_objects: false,
            include_row_counts: true,
            row_count_strategy: RowCountStrategy::default(),
            name_matching: NameMatching::default(),
            concurrent_categories: false,
        }
    }
}
