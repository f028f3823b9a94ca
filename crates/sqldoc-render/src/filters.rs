//! Value formatting for templates
//!
//! Templates never format numbers or dates themselves. They call the
//! `format_number`, `format_megabytes` and `format_date` filters, which all
//! delegate to one [`FormatFn`] handed to the assembler.

use chrono::{NaiveDate, NaiveDateTime};
use minijinja::{Environment, Value};
use sqldoc_catalog::DATE_FORMAT;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// Integer with thousands separators
    Number,
    /// Megabyte figure with separators, two decimals and a unit
    Megabytes,
    Date,
}

/// A pure `format(value, kind) -> text` function
pub type FormatFn = Arc<dyn Fn(&Value, FormatKind) -> String + Send + Sync>;

pub fn default_formatter() -> FormatFn {
    Arc::new(format_value)
}

/// The stock formatting rules. None and undefined render as empty text.
pub fn format_value(value: &Value, kind: FormatKind) -> String {
    if value.is_none() || value.is_undefined() {
        return String::new();
    }
    match kind {
        FormatKind::Number => match i64::try_from(value.clone()) {
            Ok(n) => group_thousands(n),
            Err(_) => match f64::try_from(value.clone()) {
                Ok(f) => format_decimal(f, 2),
                Err(_) => value.to_string(),
            },
        },
        FormatKind::Megabytes => match f64::try_from(value.clone()) {
            Ok(f) => format!("{} MB", format_decimal(f, 2)),
            Err(_) => value.to_string(),
        },
        FormatKind::Date => match value.as_str() {
            Some(text) => parse_date(text)
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| text.to_string()),
            None => value.to_string(),
        },
    }
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn format_decimal(value: f64, places: usize) -> String {
    let fixed = format!("{:.*}", places, value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let whole = whole
        .parse::<i64>()
        .map(group_thousands)
        .unwrap_or_else(|_| whole.to_string());
    let sign = if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    if fraction.is_empty() {
        format!("{}{}", sign, whole)
    } else {
        format!("{}{}.{}", sign, whole, fraction)
    }
}

/// Make text safe inside a Markdown table cell
pub fn markdown_cell(value: &Value) -> String {
    if value.is_none() || value.is_undefined() {
        return String::new();
    }
    let text = match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    };
    text.replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

/// Fragment id of a table. Characters outside `[A-Za-z0-9_]` are written as
/// `.<hex>.` so the `--` between schema and table can never be ambiguous.
pub fn anchor_id(schema_name: &str, table_name: &str) -> String {
    fn encode(part: &str, out: &mut String) {
        for ch in part.chars() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                out.push(ch);
            } else {
                out.push_str(&format!(".{:x}.", u32::from(ch)));
            }
        }
    }
    let mut id = String::from("table-");
    encode(schema_name, &mut id);
    id.push_str("--");
    encode(table_name, &mut id);
    id
}

/// Register the formatting filters with a MiniJinja environment
pub fn register_filters(env: &mut Environment<'_>, formatter: &FormatFn) {
    for (name, kind) in [
        ("format_number", FormatKind::Number),
        ("format_megabytes", FormatKind::Megabytes),
        ("format_date", FormatKind::Date),
    ] {
        let formatter = formatter.clone();
        env.add_filter(name, move |value: Value| formatter(&value, kind));
    }
    env.add_filter("md_cell", |value: Value| markdown_cell(&value));
    env.add_filter("anchor_id", anchor_id);
}
