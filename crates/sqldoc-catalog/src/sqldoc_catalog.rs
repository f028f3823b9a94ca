//! Schema metadata extraction for SQL Server
//!
//! This crate provides:
//!
//! - `MetadataExtractor` - runs the catalog queries and builds a `SchemaModel`
//! - `SchemaModel` - the immutable, serializable description of one database
//! - `Category` - the independently fetched slices of the system catalog
//! - `ExtractionWarning` - non-fatal problems reported alongside the model

mod builder;
mod category;
mod config;
mod data_type;
mod decode;
mod extractor;
pub mod model;
mod warning;

pub use builder::ModelBuilder;
pub use category::{exact_row_count_sql, quote_identifier, Category, DATABASE_INFO_SQL, DATABASE_INFO_TAG};
pub use config::{is_system_schema, ExtractorConfig, NameMatching, RowCountStrategy, SYSTEM_SCHEMAS};
pub use data_type::format_data_type;
pub use decode::{
    CatalogSnapshot, DatabaseInfo, DatabaseSize, DecodeError, ForeignKeyRow, IndexColumnRow, Owned,
    RowReader, Shipped,
};
pub use extractor::{
    ExtractError, Extraction, ExtractionOutcome, ExtractionProgress, MetadataExtractor,
    ProgressCallback,
};
pub use model::*;
pub use warning::ExtractionWarning;
