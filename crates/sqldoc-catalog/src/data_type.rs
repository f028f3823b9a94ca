//! Display formatting for SQL Server column types

/// Render a column type the way SQL Server scripts it
///
/// `max_length` is the catalog byte length (`-1` for MAX). National character
/// types store two bytes per character, so their length is halved.
pub fn format_data_type(type_name: &str, max_length: i64, precision: i64, scale: i64) -> String {
    let lower = type_name.to_ascii_lowercase();
    match lower.as_str() {
        "nvarchar" | "nchar" => format!("{}({})", type_name, length(max_length, 2)),
        "varchar" | "char" | "varbinary" | "binary" => {
            format!("{}({})", type_name, length(max_length, 1))
        }
        "decimal" | "numeric" => format!("{}({},{})", type_name, precision, scale),
        "float" => format!("{}({})", type_name, precision),
        _ => type_name.to_string(),
    }
}

fn length(max_length: i64, bytes_per_char: i64) -> String {
    if max_length == -1 {
        "MAX".to_string()
    } else {
        (max_length / bytes_per_char).to_string()
    }
}
