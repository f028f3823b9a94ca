//! Documentation assembly
//!
//! The assembler renders every requested format from one shared model. Each
//! format renders on the blocking pool and writes its own file, so a failure
//! in one format never touches the others.

use crate::engine::{DocumentTemplate, JinjaTemplate, JsonDocument};
use crate::export::{CsvDocument, XmlDocument};
use crate::filters::FormatFn;
use crate::{OutputFormat, RenderError};
use sqldoc_catalog::SchemaModel;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of rendering and writing one format
#[derive(Debug)]
pub struct FormatOutcome {
    pub format: OutputFormat,
    pub result: Result<PathBuf, RenderError>,
}

impl FormatOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct DocumentationAssembler {
    formatter: FormatFn,
    templates: HashMap<OutputFormat, Arc<dyn DocumentTemplate>>,
}

impl DocumentationAssembler {
    /// Assembler with the built-in templates for every format
    pub fn new(formatter: FormatFn) -> Self {
        let mut templates: HashMap<OutputFormat, Arc<dyn DocumentTemplate>> = HashMap::new();
        templates.insert(
            OutputFormat::Html,
            Arc::new(JinjaTemplate::html(formatter.clone())),
        );
        templates.insert(
            OutputFormat::Markdown,
            Arc::new(JinjaTemplate::markdown(formatter.clone())),
        );
        templates.insert(OutputFormat::Json, Arc::new(JsonDocument));
        templates.insert(OutputFormat::Csv, Arc::new(CsvDocument));
        templates.insert(OutputFormat::Xml, Arc::new(XmlDocument));
        Self {
            formatter,
            templates,
        }
    }

    /// Replace the template used for one format
    pub fn with_template(mut self, format: OutputFormat, template: Arc<dyn DocumentTemplate>) -> Self {
        self.templates.insert(format, template);
        self
    }

    /// Replace the template for HTML or Markdown with MiniJinja source
    pub fn with_template_source(
        self,
        format: OutputFormat,
        source: impl Into<String>,
    ) -> Result<Self, RenderError> {
        if !format.is_templated() {
            return Err(RenderError::NotTemplated(format));
        }
        let name = format!("custom.{}", format.extension());
        let template = JinjaTemplate::new(name, source, self.formatter.clone());
        Ok(self.with_template(format, Arc::new(template)))
    }

    /// Render a single format to text
    pub fn render(&self, format: OutputFormat, model: &SchemaModel) -> Result<String, RenderError> {
        match self.templates.get(&format) {
            Some(template) => template.render(model),
            None => Err(RenderError::MissingTemplate(format)),
        }
    }

    /// Render every requested format and write `<output_dir>/<database>.<ext>`
    #[tracing::instrument(skip(self, model, formats), fields(database = %model.metadata.database_name))]
    pub async fn assemble(
        &self,
        model: Arc<SchemaModel>,
        formats: &BTreeSet<OutputFormat>,
        output_dir: &Path,
    ) -> Vec<FormatOutcome> {
        if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
            tracing::error!(dir = %output_dir.display(), error = %e, "cannot create output directory");
            return formats
                .iter()
                .map(|format| FormatOutcome {
                    format: *format,
                    result: Err(RenderError::Io {
                        path: output_dir.to_path_buf(),
                        source: std::io::Error::new(e.kind(), e.to_string()),
                    }),
                })
                .collect();
        }

        let jobs = formats.iter().copied().map(|format| {
            let model = model.clone();
            let template = self.templates.get(&format).cloned();
            let path = document_path(output_dir, &model.metadata.database_name, format);
            async move {
                let result = render_and_write(format, template, model, path).await;
                match &result {
                    Ok(path) => tracing::info!(%format, path = %path.display(), "wrote documentation"),
                    Err(e) => tracing::warn!(%format, error = %e, "documentation format failed"),
                }
                FormatOutcome { format, result }
            }
        });
        futures::future::join_all(jobs).await
    }
}

async fn render_and_write(
    format: OutputFormat,
    template: Option<Arc<dyn DocumentTemplate>>,
    model: Arc<SchemaModel>,
    path: PathBuf,
) -> Result<PathBuf, RenderError> {
    let template = template.ok_or(RenderError::MissingTemplate(format))?;
    let text = tokio::task::spawn_blocking(move || template.render(&model))
        .await
        .map_err(|e| RenderError::Task(e.to_string()))??;
    tokio::fs::write(&path, text)
        .await
        .map_err(|source| RenderError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Output path for a database and format
pub fn document_path(output_dir: &Path, database_name: &str, format: OutputFormat) -> PathBuf {
    output_dir.join(format!("{}.{}", file_stem(database_name), format.extension()))
}

/// A database name made safe to use as a file name
pub fn file_stem(database_name: &str) -> String {
    let stem: String = database_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        "database".to_string()
    } else {
        stem.to_string()
    }
}
