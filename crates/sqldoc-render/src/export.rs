//! Data-only exports
//!
//! CSV is a flat column dictionary, one row per table column. XML carries the
//! catalog as elements and attributes. Neither is template driven.

use crate::engine::DocumentTemplate;
use crate::{OutputFormat, RenderError};
use chrono::NaiveDateTime;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use sqldoc_catalog::{Column, SchemaModel, Table, DATE_FORMAT};
use std::io;

const CSV_HEADER: [&str; 11] = [
    "Schema",
    "Table",
    "Row Count",
    "Column",
    "Data Type",
    "Nullable",
    "Identity",
    "Computed",
    "Primary Key",
    "Default",
    "Description",
];

fn export_error(format: OutputFormat, error: impl std::fmt::Display) -> RenderError {
    RenderError::Export {
        format,
        message: error.to_string(),
    }
}

fn flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn date(value: Option<&NaiveDateTime>) -> String {
    value
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Column dictionary as CSV. A table without columns still gets one row.
pub struct CsvDocument;

impl CsvDocument {
    fn column_record<'a>(table: &'a Table, row_count: &'a str, column: &'a Column) -> [&'a str; 11] {
        let is_key = table.primary_keys.iter().any(|key| key == &column.name);
        [
            table.schema_name.as_str(),
            table.table_name.as_str(),
            row_count,
            column.name.as_str(),
            column.data_type.as_str(),
            flag(column.is_nullable),
            flag(column.is_identity),
            flag(column.is_computed),
            flag(is_key),
            column.default_value.as_deref().unwrap_or(""),
            column.description.as_deref().unwrap_or(""),
        ]
    }
}

impl DocumentTemplate for CsvDocument {
    fn render(&self, model: &SchemaModel) -> Result<String, RenderError> {
        let fail = |e: csv::Error| export_error(OutputFormat::Csv, e);
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER).map_err(fail)?;
        for table in &model.tables {
            let row_count = table.row_count.map(|n| n.to_string()).unwrap_or_default();
            if table.columns.is_empty() {
                let mut record = [""; 11];
                record[0] = table.schema_name.as_str();
                record[1] = table.table_name.as_str();
                record[2] = row_count.as_str();
                writer.write_record(record).map_err(fail)?;
            }
            for column in &table.columns {
                writer
                    .write_record(Self::column_record(table, &row_count, column))
                    .map_err(fail)?;
            }
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| export_error(OutputFormat::Csv, e.error()))?;
        String::from_utf8(bytes).map_err(|e| export_error(OutputFormat::Csv, e))
    }
}

/// Element writer over an in-memory buffer
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn start(name: &str, attributes: &[(&str, &str)]) -> BytesStart<'static> {
        BytesStart::new(name.to_string()).with_attributes(
            attributes
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .copied(),
        )
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> io::Result<()> {
        self.writer
            .write_event(Event::Start(Self::start(name, attributes)))
    }

    fn close(&mut self, name: &str) -> io::Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))
    }

    /// Element with attributes only; empty attribute values are left out
    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> io::Result<()> {
        self.writer
            .write_event(Event::Empty(Self::start(name, attributes)))
    }

    fn text(&mut self, name: &str, value: &str) -> io::Result<()> {
        if value.is_empty() {
            return self.empty(name, &[]);
        }
        self.open(name, &[])?;
        self.writer.write_event(Event::Text(BytesText::new(value)))?;
        self.close(name)
    }

    fn columns(&mut self, columns: &[Column], primary_keys: &[String]) -> io::Result<()> {
        if columns.is_empty() {
            return Ok(());
        }
        self.open("Columns", &[])?;
        for column in columns {
            let is_key = primary_keys.iter().any(|key| key == &column.name);
            self.empty(
                "Column",
                &[
                    ("name", column.name.as_str()),
                    ("dataType", column.data_type.as_str()),
                    ("nullable", flag(column.is_nullable)),
                    ("identity", flag(column.is_identity)),
                    ("computed", flag(column.is_computed)),
                    ("primaryKey", flag(is_key)),
                    ("default", column.default_value.as_deref().unwrap_or("")),
                    ("description", column.description.as_deref().unwrap_or("")),
                ],
            )?;
        }
        self.close("Columns")
    }

    fn catalog(&mut self, model: &SchemaModel) -> io::Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        let metadata = &model.metadata;
        self.open(
            "DatabaseDocumentation",
            &[("database", metadata.database_name.as_str())],
        )?;

        self.open("Metadata", &[])?;
        self.text("DatabaseName", metadata.database_name.as_str())?;
        self.text("ServerName", metadata.server_name.as_deref().unwrap_or(""))?;
        self.text("ServerVersion", metadata.server_version.as_deref().unwrap_or(""))?;
        self.text("UserName", metadata.user_name.as_deref().unwrap_or(""))?;
        self.text("ExtractionDate", &date(Some(&metadata.extraction_date)))?;
        let size = metadata.size_mb.map(|mb| format!("{:.2}", mb)).unwrap_or_default();
        self.text("SizeMb", size.as_str())?;
        let used = metadata.used_mb.map(|mb| format!("{:.2}", mb)).unwrap_or_default();
        self.text("UsedMb", used.as_str())?;
        self.close("Metadata")?;

        let stats = &model.statistics;
        self.open("Statistics", &[])?;
        for (name, value) in [
            ("TotalSchemas", stats.total_schemas.to_string()),
            ("TotalTables", stats.total_tables.to_string()),
            ("TotalViews", stats.total_views.to_string()),
            ("TotalProcedures", stats.total_procedures.to_string()),
            ("TotalFunctions", stats.total_functions.to_string()),
            ("TotalColumns", stats.total_columns.to_string()),
            ("TotalRows", stats.total_rows.to_string()),
        ] {
            self.text(name, &value)?;
        }
        self.close("Statistics")?;

        self.open("Schemas", &[])?;
        for schema in &model.schemas {
            self.empty(
                "Schema",
                &[
                    ("name", schema.name.as_str()),
                    ("owner", schema.principal.as_deref().unwrap_or("")),
                ],
            )?;
        }
        self.close("Schemas")?;

        self.open("Tables", &[])?;
        for table in &model.tables {
            let row_count = table.row_count.map(|n| n.to_string()).unwrap_or_default();
            let created = date(table.created.as_ref());
            let modified = date(table.modified.as_ref());
            self.open(
                "Table",
                &[
                    ("schema", table.schema_name.as_str()),
                    ("name", table.table_name.as_str()),
                    ("rowCount", row_count.as_str()),
                    ("created", created.as_str()),
                    ("modified", modified.as_str()),
                ],
            )?;
            if let Some(description) = &table.description {
                self.text("Description", description)?;
            }
            self.columns(&table.columns, &table.primary_keys)?;
            for index in &table.indexes {
                let columns = index.columns.join(", ");
                self.empty(
                    "Index",
                    &[
                        ("name", index.index_name.as_str()),
                        ("type", index.index_type.as_str()),
                        ("unique", flag(index.is_unique)),
                        ("primaryKey", flag(index.is_primary_key)),
                        ("columns", columns.as_str()),
                    ],
                )?;
            }
            for check in &table.check_constraints {
                self.empty(
                    "CheckConstraint",
                    &[("name", check.constraint_name.as_str()), ("definition", check.definition.as_str())],
                )?;
            }
            for trigger in &table.triggers {
                self.empty(
                    "Trigger",
                    &[
                        ("name", trigger.trigger_name.as_str()),
                        ("type", trigger.trigger_type.as_str()),
                        ("disabled", flag(trigger.is_disabled)),
                    ],
                )?;
            }
            self.close("Table")?;
        }
        self.close("Tables")?;

        self.open("Views", &[])?;
        for view in &model.views {
            self.open(
                "View",
                &[
                    ("schema", view.schema_name.as_str()),
                    ("name", view.view_name.as_str()),
                    ("description", view.description.as_deref().unwrap_or("")),
                ],
            )?;
            self.columns(&view.columns, &[])?;
            self.close("View")?;
        }
        self.close("Views")?;

        self.open("StoredProcedures", &[])?;
        for procedure in &model.stored_procedures {
            self.empty(
                "StoredProcedure",
                &[
                    ("schema", procedure.schema_name.as_str()),
                    ("name", procedure.procedure_name.as_str()),
                    ("description", procedure.description.as_deref().unwrap_or("")),
                ],
            )?;
        }
        self.close("StoredProcedures")?;

        self.open("Functions", &[])?;
        for function in &model.functions {
            self.empty(
                "Function",
                &[
                    ("schema", function.schema_name.as_str()),
                    ("name", function.function_name.as_str()),
                    ("type", function.function_type.as_str()),
                    ("description", function.description.as_deref().unwrap_or("")),
                ],
            )?;
        }
        self.close("Functions")?;

        self.open("Relationships", &[])?;
        for fk in &model.relationships.foreign_keys {
            self.empty(
                "ForeignKey",
                &[
                    ("name", fk.foreign_key_name.as_str()),
                    ("parentSchema", fk.parent_schema.as_str()),
                    ("parentTable", fk.parent_table.as_str()),
                    ("parentColumn", fk.parent_column.as_str()),
                    ("referencedSchema", fk.referenced_schema.as_str()),
                    ("referencedTable", fk.referenced_table.as_str()),
                    ("referencedColumn", fk.referenced_column.as_str()),
                    ("onDelete", fk.on_delete.as_str()),
                    ("onUpdate", fk.on_update.as_str()),
                ],
            )?;
        }
        self.close("Relationships")?;

        self.close("DatabaseDocumentation")
    }
}

/// The catalog as an XML document
pub struct XmlDocument;

impl DocumentTemplate for XmlDocument {
    fn render(&self, model: &SchemaModel) -> Result<String, RenderError> {
        let mut out = XmlOut::new();
        out.catalog(model)
            .map_err(|e| export_error(OutputFormat::Xml, e))?;
        let mut text = String::from_utf8(out.writer.into_inner())
            .map_err(|e| export_error(OutputFormat::Xml, e))?;
        text.push('\n');
        Ok(text)
    }
}
