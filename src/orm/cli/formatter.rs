//! CLI Output Formatting Module
//! Provides consistent, colorized output for terminal UX

use colored::Colorize;
use serde_json::Value;

use crate::orm::backend::{GraphNode, RecordMap, ID_FIELD};

pub struct CliFormatter;

impl CliFormatter {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a section header
    pub fn header(title: &str) {
        println!("\n{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(title.chars().count()).bright_black());
    }

    /// Print a key-value pair
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", key.bright_white().bold(), value);
    }

    /// Print a list item
    pub fn item(text: &str) {
        println!("  {} {}", "•".bright_black(), text);
    }

    /// Print one record, identity first
    pub fn record(record_type: &str, record: &RecordMap) {
        Self::header(&record_title(record_type, record));
        for (key, value) in record {
            if key != ID_FIELD && !value.is_null() {
                Self::kv(key, &format_value(value));
            }
        }
    }

    pub fn records(record_type: &str, records: &[RecordMap]) {
        if records.is_empty() {
            Self::info(&format!("No {} records matched", record_type));
            return;
        }
        for record in records {
            Self::record(record_type, record);
        }
        println!();
        Self::info(&format!("{} record(s)", records.len()));
    }

    /// Print traversal results grouped by hop distance
    pub fn nodes(nodes: &[GraphNode]) {
        if nodes.is_empty() {
            Self::info("Nothing reachable");
            return;
        }
        let mut depth = 0;
        for node in nodes {
            if node.depth != depth {
                depth = node.depth;
                Self::header(&format!("Depth {}", depth));
            }
            Self::item(&format!(
                "{} {}",
                record_title(&node.record_type, &node.data),
                format!("via {}", node.via).bright_black()
            ));
        }
    }
}

/// `aircraft #3 (737-800)`, using the first descriptive field present
pub fn record_title(record_type: &str, record: &RecordMap) -> String {
    let id = record
        .get(ID_FIELD)
        .and_then(Value::as_i64)
        .map(|id| format!(" #{}", id))
        .unwrap_or_default();
    let label = ["model", "name", "flight_number"]
        .iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str))
        .map(|label| format!(" ({})", label))
        .unwrap_or_default();
    format!("{}{}{}", record_type, id, label)
}

/// Render a field value for the terminal; nested values stay as compact JSON
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(|v| !v.is_object()) => items
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => format!("[{} related]", items.len()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> RecordMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_record_title() {
        assert_eq!(
            record_title("aircraft", &map(json!({"id": 3, "model": "737-800"}))),
            "aircraft #3 (737-800)"
        );
        assert_eq!(
            record_title("flight_data", &map(json!({"flight_number": "BA117"}))),
            "flight_data (BA117)"
        );
        assert_eq!(record_title("material", &map(json!({"id": 9}))), "material #9");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!("Boeing")), "Boeing");
        assert_eq!(format_value(&json!(600.5)), "600.5");
        assert_eq!(format_value(&json!([1, 2])), "1, 2");
        assert_eq!(format_value(&json!([{"id": 1}, {"id": 2}])), "[2 related]");
        assert_eq!(format_value(&json!({"a": true})), "{\"a\":true}");
    }
}
