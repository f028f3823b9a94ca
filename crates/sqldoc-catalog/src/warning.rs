use crate::Category;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-fatal problem met while extracting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    /// The category could not be fetched or decoded and is left empty
    Category { category: Category, message: String },
    /// A row names a table that is not in the extracted table set
    JoinInconsistency {
        category: Category,
        schema_name: String,
        table_name: String,
        detail: String,
    },
}

impl ExtractionWarning {
    pub fn category(&self) -> Category {
        match self {
            ExtractionWarning::Category { category, .. }
            | ExtractionWarning::JoinInconsistency { category, .. } => *category,
        }
    }

    pub fn is_join_inconsistency(&self) -> bool {
        matches!(self, ExtractionWarning::JoinInconsistency { .. })
    }
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionWarning::Category { category, message } => {
                write!(f, "{} could not be extracted: {}", category, message)
            }
            ExtractionWarning::JoinInconsistency {
                category,
                schema_name,
                table_name,
                detail,
            } => write!(
                f,
                "{} row for unknown table {}.{}: {}",
                category, schema_name, table_name, detail
            ),
        }
    }
}
