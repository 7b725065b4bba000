use axum::body::Bytes;
use calamine::{Data, Reader, Xlsx};
use serde_json::{Map, Number, Value};
use std::io::Cursor;

use crate::downloader::column_to_letter;
use crate::error::SheetError;

/// One data row of a sheet, keyed by header name in column order
pub type Row = Map<String, Value>;

// Largest integer an f64 holds exactly (2^53)
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Decode an Excel workbook into a row set
///
/// Reads the first worksheet of an `.xlsx` workbook. The first row supplies
/// the header names and every later row is mapped positionally onto them:
/// - Empty header cells are named after their column letter (A, B, ..., AA)
/// - Repeated header names get a `_1`, `_2`, ... suffix
/// - Empty data cells become `""`
/// - Blank rows between data rows are kept, trailing blank rows are dropped
///
/// # Arguments
/// * `bytes` - Raw workbook content
///
/// # Returns
/// * `Result<Vec<Row>, SheetError>` - The decoded rows, or a read error
///
/// # Examples
/// ```no_run
/// use xlsx_vault::loader::from_excel;
///
/// let bytes = std::fs::read("data.xlsx").unwrap();
/// match from_excel(&bytes) {
///     Ok(rows) => println!("Decoded {} rows", rows.len()),
///     Err(e) => eprintln!("Error decoding workbook: {}", e),
/// }
/// ```
pub fn from_excel(bytes: &[u8]) -> Result<Vec<Row>, SheetError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    // A workbook without sheets has no rows
    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook.worksheet_range(&sheet_name)?;

    let first_col = range.start().map(|(_, col)| col).unwrap_or(0);
    let mut rows = range.rows();

    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let mut headers: Vec<String> = Vec::with_capacity(header_row.len());
    for (c, cell) in header_row.iter().enumerate() {
        let name = header_name(cell, first_col + c as u32);
        let name = unique_name(name, &headers);
        headers.push(name);
    }

    let data: Vec<&[Data]> = rows.collect();
    // Blank rows between data rows are kept; trailing ones are dropped
    let used = data
        .iter()
        .rposition(|cells| !cells.iter().all(is_blank))
        .map_or(0, |last| last + 1);

    let mut result = Vec::with_capacity(used);
    for cells in &data[..used] {
        let mut row = Row::new();
        for (header, cell) in headers.iter().zip(cells.iter()) {
            row.insert(header.clone(), cell_value(cell));
        }
        result.push(row);
    }

    Ok(result)
}

/// Decode workbook bytes on the blocking pool
///
/// Parsing is CPU bound, so it is moved off the async worker serving the
/// request.
pub async fn decode(bytes: Bytes) -> Result<Vec<Row>, SheetError> {
    tokio::task::spawn_blocking(move || from_excel(&bytes)).await?
}

fn header_name(cell: &Data, col: u32) -> String {
    let name = match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    };

    if name.is_empty() {
        column_to_letter(col.saturating_add(1))
    } else {
        name
    }
}

// Repeated header names get a numeric suffix so no column is overwritten
fn unique_name(name: String, taken: &[String]) -> String {
    if !taken.contains(&name) {
        return name;
    }

    (1..)
        .map(|n| format!("{}_{}", name, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(name)
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Convert a single cell into its JSON representation
fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => float_value(*f),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => Value::String(datetime.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => float_value(dt.as_f64()),
        },
        // ISO date/duration strings and cell errors (#DIV/0!, #N/A, ...)
        other => Value::String(other.to_string()),
    }
}

fn float_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < MAX_EXACT_INTEGER {
        return Value::from(f as i64);
    }
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use serde_json::json;

    fn workbook_bytes(build: impl FnOnce(&mut rust_xlsxwriter::Worksheet)) -> Vec<u8> {
        let mut workbook = Workbook::new();
        build(workbook.add_worksheet());
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn first_row_becomes_headers() {
        let bytes = workbook_bytes(|sheet| {
            sheet.write_string(0, 0, "A").unwrap();
            sheet.write_string(0, 1, "B").unwrap();
            sheet.write_string(1, 0, "1").unwrap();
            sheet.write_string(1, 1, "2").unwrap();
        });

        let rows = from_excel(&bytes).unwrap();
        assert_eq!(Value::Array(rows.into_iter().map(Value::Object).collect()), json!([{"A": "1", "B": "2"}]));
    }

    #[test]
    fn typed_cells_and_gaps() {
        let bytes = workbook_bytes(|sheet| {
            sheet.write_string(0, 0, "Name").unwrap();
            sheet.write_string(0, 2, "Score").unwrap();
            sheet.write_string(0, 3, "Active").unwrap();
            sheet.write_string(1, 0, "ada").unwrap();
            sheet.write_number(1, 2, 12.0).unwrap();
            sheet.write_boolean(1, 3, true).unwrap();
            // row 3 left completely empty
            sheet.write_string(3, 0, "bob").unwrap();
            sheet.write_number(3, 2, 2.5).unwrap();
        });

        let rows = from_excel(&bytes).unwrap();
        assert_eq!(rows.len(), 3);

        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Name", "B", "Score", "Active"]);

        assert_eq!(rows[0]["B"], json!(""));
        assert_eq!(rows[0]["Score"], json!(12));
        assert_eq!(rows[0]["Active"], json!(true));
        assert!(rows[1].values().all(|value| value == ""));
        assert_eq!(rows[2]["Name"], json!("bob"));
        assert_eq!(rows[2]["Score"], json!(2.5));
        assert_eq!(rows[2]["Active"], json!(""));
    }

    #[test]
    fn blank_header_never_shadows_a_named_column() {
        let bytes = workbook_bytes(|sheet| {
            sheet.write_string(0, 0, "B").unwrap();
            sheet.write_string(1, 0, "x").unwrap();
            sheet.write_string(1, 1, "y").unwrap();
        });

        let rows = from_excel(&bytes).unwrap();
        assert_eq!(Value::Object(rows[0].clone()), json!({"B": "x", "B_1": "y"}));
    }

    #[test]
    fn repeated_headers_are_numbered() {
        let bytes = workbook_bytes(|sheet| {
            for (c, name) in ["Name", "Name", "Name_1"].iter().enumerate() {
                sheet.write_string(0, c as u16, *name).unwrap();
            }
            for c in 0..3u16 {
                sheet.write_number(1, c, f64::from(c)).unwrap();
            }
        });

        let rows = from_excel(&bytes).unwrap();
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Name", "Name_1", "Name_1_1"]);
        assert_eq!(rows[0]["Name_1_1"], json!(2));
    }

    #[test]
    fn trailing_blank_rows_are_dropped() {
        let bytes = workbook_bytes(|sheet| {
            sheet.write_string(0, 0, "A").unwrap();
            sheet.write_string(0, 1, "B").unwrap();
            sheet.write_string(1, 0, "x").unwrap();
            sheet.write_string(3, 1, "").unwrap();
        });

        let rows = from_excel(&bytes).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn header_only_sheet_has_no_rows() {
        let bytes = workbook_bytes(|sheet| {
            sheet.write_string(0, 0, "Only").unwrap();
        });
        assert!(from_excel(&bytes).unwrap().is_empty());
    }

    #[test]
    fn empty_sheet_has_no_rows() {
        let bytes = workbook_bytes(|_| {});
        assert!(from_excel(&bytes).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_read_error() {
        let err = from_excel(b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, SheetError::Read(_)));
    }

    #[test]
    fn float_conversion() {
        assert_eq!(float_value(3.0), json!(3));
        assert_eq!(float_value(-0.25), json!(-0.25));
        assert_eq!(float_value(1e300), json!(1e300));
    }
}
