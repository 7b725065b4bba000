use axum::body::Bytes;
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde_json::Value;

use crate::error::SheetError;
use crate::loader::Row;

/// Name of the single sheet written on save and export
pub const SHEET_NAME: &str = "Sheet1";

/// MIME type of `.xlsx` workbooks
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Convert a row set to XLSX format
///
/// This function writes a row set to a single-sheet workbook using the
/// rust_xlsxwriter library. The header row is the union of every row's keys in
/// order of first appearance, so rows with differing shapes are all kept.
/// `null` values and missing keys leave the cell blank; nested objects and
/// arrays are written as JSON text.
///
/// # Arguments
/// * `rows` - The rows to write
///
/// # Returns
/// * `Result<Vec<u8>, SheetError>` - XLSX file content as bytes or an error
///
/// # Examples
/// ```
/// use serde_json::json;
/// use xlsx_vault::downloader::to_xlsx;
///
/// let rows = vec![json!({"A": "1", "B": 2}).as_object().unwrap().clone()];
/// match to_xlsx(&rows) {
///     Ok(xlsx_data) => println!("XLSX generated: {} bytes", xlsx_data.len()),
///     Err(e) => eprintln!("Failed to generate XLSX: {}", e),
/// }
/// ```
pub fn to_xlsx(rows: &[Row]) -> Result<Vec<u8>, SheetError> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(SHEET_NAME)?;

    let headers = collect_headers(rows);
    for (c, header) in headers.iter().enumerate() {
        worksheet.write_string(0, c as u16, header.as_str())?;
    }

    for (r, row) in rows.iter().enumerate() {
        let sheet_row = (r + 1) as u32;
        for (c, header) in headers.iter().enumerate() {
            if let Some(value) = row.get(header.as_str()) {
                write_value(&mut worksheet, sheet_row, c as u16, value)?;
            }
        }
    }

    workbook.push_worksheet(worksheet);

    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

/// Encode rows on the blocking pool
pub async fn encode(rows: Vec<Row>) -> Result<Bytes, SheetError> {
    let buffer = tokio::task::spawn_blocking(move || to_xlsx(&rows)).await??;
    Ok(Bytes::from(buffer))
}

fn collect_headers(rows: &[Row]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}

fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) => {
                worksheet.write_number(row, col, f)?;
            }
            None => {
                worksheet.write_string(row, col, n.to_string().as_str())?;
            }
        },
        Value::String(s) => {
            worksheet.write_string(row, col, s.as_str())?;
        }
        Value::Array(_) | Value::Object(_) => {
            worksheet.write_string(row, col, value.to_string().as_str())?;
        }
    }
    Ok(())
}

/// Convert column number to letter (A=1, B=2, etc.)
///
/// Helper function that converts a numerical column index to a spreadsheet-style
/// column letter (A, B, C, ..., Z, AA, AB, etc.).
///
/// # Arguments
/// * `col` - Column number (1-based)
///
/// # Returns
/// * `String` - Column letter (A, B, C, etc.)
pub(crate) fn column_to_letter(col: u32) -> String {
    let mut name = String::new();
    let mut n = col;

    while n > 0 {
        n -= 1;
        name.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }

    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::from_excel;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Row> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_to_letter(1), "A");
        assert_eq!(column_to_letter(26), "Z");
        assert_eq!(column_to_letter(27), "AA");
        assert_eq!(column_to_letter(52), "AZ");
        assert_eq!(column_to_letter(703), "AAA");
    }

    #[test]
    fn headers_follow_first_appearance() {
        let input = rows(json!([
            {"Name": "ada", "Score": 1},
            {"Score": 2, "Team": "red"},
        ]));
        assert_eq!(collect_headers(&input), vec!["Name", "Score", "Team"]);
    }

    #[test]
    fn written_rows_read_back() {
        let input = rows(json!([
            {"Name": "ada", "Score": 12, "Active": true},
            {"Name": "bob", "Score": 2.5, "Active": false},
        ]));

        let bytes = to_xlsx(&input).unwrap();
        assert_eq!(from_excel(&bytes).unwrap(), input);
    }

    #[test]
    fn ragged_rows_and_nested_values() {
        let input = rows(json!([
            {"A": "x", "B": null},
            {"C": {"result": 4}},
        ]));

        let decoded = from_excel(&to_xlsx(&input).unwrap()).unwrap();
        assert_eq!(
            decoded,
            rows(json!([
                {"A": "x", "B": "", "C": ""},
                {"A": "", "B": "", "C": "{\"result\":4}"},
            ]))
        );
    }

    #[test]
    fn empty_row_set_still_makes_a_workbook() {
        let bytes = to_xlsx(&[]).unwrap();
        assert!(from_excel(&bytes).unwrap().is_empty());
    }
}
