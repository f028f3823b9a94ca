//! Documentation rendering for sqldoc
//!
//! Turns a [`SchemaModel`](sqldoc_catalog::SchemaModel) into HTML, Markdown,
//! JSON, CSV and XML documents. HTML and Markdown come from MiniJinja
//! templates, JSON is the serialized model.

mod assembler;
mod engine;
mod export;
mod filters;

pub use assembler::{document_path, file_stem, DocumentationAssembler, FormatOutcome};
pub use engine::{
    DocumentTemplate, JinjaTemplate, JsonDocument, DEFAULT_HTML_TEMPLATE, DEFAULT_MARKDOWN_TEMPLATE,
    HTML_TEMPLATE_NAME, MARKDOWN_TEMPLATE_NAME,
};
pub use export::{CsvDocument, XmlDocument};
pub use filters::{anchor_id, default_formatter, format_value, group_thousands, FormatFn, FormatKind};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

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
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[strum(to_string = "html", serialize = "htm")]
    Html,
    #[strum(to_string = "markdown", serialize = "md")]
    #[serde(alias = "md")]
    Markdown,
    #[strum(to_string = "json")]
    Json,
    #[strum(to_string = "csv")]
    Csv,
    #[strum(to_string = "xml")]
    Xml,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Xml => "xml",
        }
    }

    /// Whether the format is rendered from a MiniJinja template
    pub fn is_templated(self) -> bool {
        matches!(self, OutputFormat::Html | OutputFormat::Markdown)
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template {name} failed: {message}")]
    Template { name: String, message: String },

    #[error("failed to serialize the schema model: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("render task failed: {0}")]
    Task(String),

    #[error("no template registered for {0}")]
    MissingTemplate(OutputFormat),

    #[error("{0} output is not template driven")]
    NotTemplated(OutputFormat),

    #[error("{format} export failed: {message}")]
    Export { format: OutputFormat, message: String },
}
