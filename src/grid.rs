//! Presentation rules shared by the browse page and the export endpoint.
//!
//! The detail page renders and filters rows in the browser; the server
//! injects the [`GridLayout`] and [`PLACEHOLDER`] into the page so both sides
//! apply the same rules. Export runs the same filter server-side over the rows
//! the client sends back.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::loader::Row;

/// Glyph shown in place of blank or dash-like cells
pub const PLACEHOLDER: &str = "—";

/// File extension appended to exported workbooks
pub const EXPORT_EXTENSION: &str = ".xlsx";

const DEFAULT_EXPORT_NAME: &str = "export";

/// How a column is rendered on the detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind<'a> {
    /// Read-only normalized text
    Text,
    /// Constrained choice rendered as a selector
    Choice(&'a [String]),
    /// Free text rendered as a text area
    Note,
}

/// Column designations configured at startup
#[derive(Debug, Clone, Default, Serialize)]
pub struct GridLayout {
    pub hidden: Vec<String>,
    pub choices: BTreeMap<String, Vec<String>>,
    pub notes: Vec<String>,
}

impl GridLayout {
    pub fn kind(&self, column: &str) -> ColumnKind<'_> {
        if let Some(options) = self.choices.get(column) {
            ColumnKind::Choice(options)
        } else if self.notes.iter().any(|c| c == column) {
            ColumnKind::Note
        } else {
            ColumnKind::Text
        }
    }

    /// Headers of the row set: the first row's keys minus hidden columns
    pub fn visible_headers(&self, rows: &[Row]) -> Vec<String> {
        rows.first()
            .map(|row| {
                row.keys()
                    .filter(|key| !self.hidden.contains(key))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Render a cell as display text
///
/// Returns `None` when the cell should show the placeholder instead: `null`,
/// text that trims to `""`, `"-"` or `"--"`, and empty objects or arrays.
/// Objects carrying a `result` key (formula cells) render that result.
pub fn display_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => normalize(s),
        Value::Bool(_) | Value::Number(_) => normalize(&value.to_string()),
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Object(map) => match map.get("result") {
            Some(Value::Null) => None,
            Some(Value::String(s)) => normalize(s),
            Some(result) => normalize(&result.to_string()),
            None => Some(value.to_string()),
        },
        Value::Array(_) => Some(value.to_string()),
    }
}

fn normalize(text: &str) -> Option<String> {
    match text.trim() {
        "" | "-" | "--" => None,
        trimmed => Some(trimmed.to_string()),
    }
}

/// Display text of a cell, falling back to [`PLACEHOLDER`]
pub fn cell_text(value: &Value) -> String {
    display_cell(value).unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Keep the rows whose visible text contains `query`
///
/// Matching is a case-insensitive substring test over the rendered text of the
/// given columns. Placeholder cells never match. A blank query keeps every row.
/// Input order is preserved.
pub fn filter_rows<'a>(rows: &'a [Row], query: &str, columns: &[String]) -> Vec<&'a Row> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rows.iter().collect();
    }

    rows.iter()
        .filter(|row| {
            columns.iter().any(|column| {
                row.get(column.as_str())
                    .and_then(display_cell)
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
        })
        .collect()
}

/// Normalize a user-supplied export name so it ends in `.xlsx`
pub fn export_filename(input: &str) -> String {
    let name = match input.trim() {
        "" => DEFAULT_EXPORT_NAME,
        trimmed => trimmed,
    };

    if name.to_lowercase().ends_with(EXPORT_EXTENSION) {
        name.to_string()
    } else {
        format!("{}{}", name, EXPORT_EXTENSION)
    }
}
