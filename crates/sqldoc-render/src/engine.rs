//! Document templates

use crate::filters::{register_filters, FormatFn};
use crate::RenderError;
use minijinja::{context, Environment, UndefinedBehavior};
use sqldoc_catalog::SchemaModel;

pub const HTML_TEMPLATE_NAME: &str = "database_documentation.html";
pub const MARKDOWN_TEMPLATE_NAME: &str = "database_documentation.md";

pub const DEFAULT_HTML_TEMPLATE: &str = include_str!("../templates/database_documentation.html");
pub const DEFAULT_MARKDOWN_TEMPLATE: &str = include_str!("../templates/database_documentation.md");

/// Turns a schema model into the text of one document
pub trait DocumentTemplate: Send + Sync {
    fn render(&self, model: &SchemaModel) -> Result<String, RenderError>;
}

/// A MiniJinja template rendered against `doc`, the schema model.
///
/// Names ending in `.html` get HTML auto-escaping. Undefined variables are an
/// error, and `none` values print as empty text.
pub struct JinjaTemplate {
    name: String,
    source: String,
    formatter: FormatFn,
}

impl JinjaTemplate {
    pub fn new(name: impl Into<String>, source: impl Into<String>, formatter: FormatFn) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            formatter,
        }
    }

    pub fn html(formatter: FormatFn) -> Self {
        Self::new(HTML_TEMPLATE_NAME, DEFAULT_HTML_TEMPLATE, formatter)
    }

    pub fn markdown(formatter: FormatFn) -> Self {
        Self::new(MARKDOWN_TEMPLATE_NAME, DEFAULT_MARKDOWN_TEMPLATE, formatter)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn environment(&self) -> Environment<'_> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_formatter(|out, state, value| {
            if value.is_none() {
                return Ok(());
            }
            minijinja::escape_formatter(out, state, value)
        });
        register_filters(&mut env, &self.formatter);
        env
    }

    fn template_error(&self, error: minijinja::Error) -> RenderError {
        RenderError::Template {
            name: self.name.clone(),
            message: error.to_string(),
        }
    }
}

impl DocumentTemplate for JinjaTemplate {
    fn render(&self, model: &SchemaModel) -> Result<String, RenderError> {
        let env = self.environment();
        let template = env
            .template_from_named_str(&self.name, &self.source)
            .map_err(|e| self.template_error(e))?;
        template
            .render(context! { doc => model })
            .map_err(|e| self.template_error(e))
    }
}

/// The model itself as pretty-printed JSON
pub struct JsonDocument;

impl DocumentTemplate for JsonDocument {
    fn render(&self, model: &SchemaModel) -> Result<String, RenderError> {
        let mut json = model.to_json_pretty()?;
        json.push('\n');
        Ok(json)
    }
}
