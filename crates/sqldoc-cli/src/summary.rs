//! Terminal summary of a documentation run

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use sqldoc_render::group_thousands;
use sqldoc_services::RunReport;

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn overview(report: &RunReport) -> Table {
    let model = &report.model;
    let stats = &model.statistics;
    let mut overview = table(vec!["Database", "Schemas", "Tables", "Views", "Procedures", "Functions", "Rows"]);
    overview.add_row(vec![
        model.metadata.database_name.clone(),
        stats.total_schemas.to_string(),
        stats.total_tables.to_string(),
        stats.total_views.to_string(),
        stats.total_procedures.to_string(),
        stats.total_functions.to_string(),
        group_thousands(i64::try_from(stats.total_rows).unwrap_or(i64::MAX)),
    ]);
    overview
}

/// One row per warning; `None` when the run had none
pub fn warnings(report: &RunReport) -> Option<Table> {
    if report.warnings.is_empty() {
        return None;
    }
    let mut warnings = table(vec!["Category", "Warning"]);
    for (category, grouped) in report.warnings_by_category() {
        for warning in grouped {
            warnings.add_row(vec![category.to_string(), warning.to_string()]);
        }
    }
    Some(warnings)
}

pub fn outputs(report: &RunReport) -> Table {
    let mut outputs = table(vec!["Format", "Status", "Result"]);
    for outcome in &report.outputs {
        let (status, detail) = match &outcome.result {
            Ok(path) => ("written", path.display().to_string()),
            Err(e) => ("failed", e.to_string()),
        };
        outputs.add_row(vec![outcome.format.to_string(), status.to_string(), detail]);
    }
    outputs
}

/// Overview, warnings and outputs as one block of text
pub fn render(report: &RunReport) -> String {
    let mut text = overview(report).to_string();
    if let Some(warnings) = warnings(report) {
        text.push('\n');
        text.push_str(&warnings.to_string());
    }
    text.push('\n');
    text.push_str(&outputs(report).to_string());
    text.push_str(&format!(
        "\nFinished in {:.1}s with {} warning(s)",
        report.elapsed.as_secs_f64(),
        report.warnings.len()
    ));
    text
}
