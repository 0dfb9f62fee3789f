//! CSV import of table rows
//!
//! The header row names the fields. Each cell is coerced to the JSON type the
//! target table expects for that field (numbers, booleans, nested JSON), dates
//! in common formats are normalized to `YYYY-MM-DD`, and every row is
//! validated before it is accepted.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::TableKind;
use crate::tables::TableStore;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV has no header row")]
    MissingHeader,
}

pub type ImportResult<T> = Result<T, ImportError>;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%Y/%m/%d"];

/// Why a row was not imported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    /// 1-based line in the file (header is line 1)
    pub line: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

/// Result of a CSV import operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct CsvImportResult {
    pub rows: Vec<Value>,
    pub rows_processed: usize,
    pub rows_failed: usize,
    pub errors: Vec<RowError>,
}

impl CsvImportResult {
    fn reject(&mut self, line: usize, message: impl Into<String>, missing: Vec<String>) {
        self.rows_failed += 1;
        self.errors.push(RowError {
            line,
            message: message.into(),
            missing,
        });
    }
}

/// CSV importer for one table
pub struct CsvImporter {
    table: TableKind,
    delimiter: u8,
}

impl CsvImporter {
    pub fn new(table: TableKind) -> Self {
        Self {
            table,
            delimiter: b',',
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Parse and validate rows without storing them
    pub fn parse(&self, input: &[u8]) -> ImportResult<CsvImportResult> {
        let (accepted, mut result) = self.read(input)?;
        result.rows = accepted.into_iter().map(|(_, row)| row).collect();
        Ok(result)
    }

    /// Parse, validate and insert the accepted rows
    ///
    /// Rows the store refuses (for example a duplicate `id`) are moved to the
    /// error list; `rows` then holds the stored rows.
    pub fn import_into(&self, store: &TableStore, input: &[u8]) -> ImportResult<CsvImportResult> {
        let (accepted, mut result) = self.read(input)?;

        for (line, row) in accepted {
            match store.insert(self.table.name(), row) {
                Ok(stored) => result.rows.push(stored),
                Err(e) => result.reject(line, e.to_string(), Vec::new()),
            }
        }
        result.errors.sort_by_key(|e| e.line);

        tracing::info!(
            table = %self.table,
            imported = result.rows.len(),
            failed = result.rows_failed,
            "CSV import finished"
        );
        Ok(result)
    }

    /// Accepted rows with their line numbers, plus the counters and errors
    fn read(&self, input: &[u8]) -> ImportResult<(Vec<(usize, Value)>, CsvImportResult)> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::MissingHeader);
        }

        let template = self.table.template();
        let mut accepted = Vec::new();
        let mut result = CsvImportResult::default();

        for (index, record) in reader.records().enumerate() {
            // Blank lines and quoted newlines make the record index drift from the file line
            let fallback = index + 2;

            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    let line = e.position().map_or(fallback, |p| p.line() as usize);
                    result.rows_processed += 1;
                    result.reject(line, e.to_string(), Vec::new());
                    continue;
                }
            };
            let line = record.position().map_or(fallback, |p| p.line() as usize);

            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            result.rows_processed += 1;

            let mut row = Map::new();
            let mut coercion_error = None;
            for (header, cell) in headers.iter().zip(record.iter()) {
                if header.is_empty() || cell.is_empty() {
                    continue;
                }
                match coerce(cell, template.get(header)) {
                    Ok(value) => {
                        row.insert(header.clone(), value);
                    }
                    Err(message) => {
                        coercion_error = Some(format!("{}: {}", header, message));
                        break;
                    }
                }
            }

            if let Some(message) = coercion_error {
                result.reject(line, message, Vec::new());
                continue;
            }

            let row = Value::Object(row);
            match self.table.validate_row(&row) {
                Ok(()) => accepted.push((line, row)),
                Err(e) => result.reject(line, e.to_string(), e.missing),
            }
        }

        tracing::debug!(
            table = %self.table,
            accepted = accepted.len(),
            failed = result.rows_failed,
            "Parsed CSV import"
        );
        Ok((accepted, result))
    }
}

/// `Unit Price` → `unit_price`
fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .replace([' ', '-'], "_")
}

/// Coerce a cell to the JSON type of `expected`
fn coerce(cell: &str, expected: Option<&Value>) -> Result<Value, String> {
    match expected {
        Some(Value::Number(_)) => {
            if let Ok(i) = cell.parse::<i64>() {
                return Ok(Value::from(i));
            }
            let cleaned = cell.replace(',', "");
            cleaned
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("expected a number, got {:?}", cell))
        }
        Some(Value::Bool(_)) => match cell.to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "n" | "0" => Ok(Value::Bool(false)),
            _ => Err(format!("expected true/false, got {:?}", cell)),
        },
        Some(Value::Array(_)) | Some(Value::Object(_)) => {
            serde_json::from_str(cell).map_err(|e| format!("expected JSON: {}", e))
        }
        Some(Value::Null) => Ok(Value::String(normalize_date(cell).unwrap_or_else(|| cell.to_string()))),
        _ => Ok(Value::String(cell.to_string())),
    }
}

/// Reformat a recognizable date as ISO `YYYY-MM-DD`
fn normalize_date(cell: &str) -> Option<String> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(cell, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date().format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.date_naive().format("%Y-%m-%d").to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_import_inventory() {
        let csv = "Name,SKU,Quantity,Unit Cost,Barcode\n\
                   Stapler,ST-01,12,4.50,4006381333931\n\
                   Toner,TN-02,2,\"1,055.00\",\n";
        let result = CsvImporter::new(TableKind::Inventory)
            .parse(csv.as_bytes())
            .unwrap();

        assert_eq!(result.rows_processed, 2);
        assert_eq!(result.rows_failed, 0);
        assert_eq!(result.rows[0]["quantity"], json!(12));
        assert_eq!(result.rows[0]["unit_cost"], json!(4.5));
        // Nullable text field stays text
        assert_eq!(result.rows[0]["barcode"], json!("4006381333931"));
        assert_eq!(result.rows[1]["unit_cost"], json!(1055.0));
        assert!(result.rows[1].get("barcode").is_none());
    }

    #[test]
    fn test_rejected_rows_report_line_and_fields() {
        let csv = "company_name,email,kind\n\
                   Acme,ap@acme.com,company\n\
                   ,,company\n\
                   Paper Co,x@paper.co,vendor\n";
        let result = CsvImporter::new(TableKind::Clients)
            .parse(csv.as_bytes())
            .unwrap();

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows_failed, 1);
        assert_eq!(result.errors[0].line, 3);
        assert_eq!(result.errors[0].missing, vec!["company_name", "email"]);
    }

    #[test]
    fn test_line_numbers_follow_the_file() {
        let csv = "company_name,email\n\
                   Acme,ap@acme.com\n\
                   \n\
                   \"Multi\nLine Ltd\",ml@example.com\n\
                   Beta,\n";
        let result = CsvImporter::new(TableKind::Clients)
            .parse(csv.as_bytes())
            .unwrap();

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1]["company_name"], json!("Multi\nLine Ltd"));
        assert_eq!(result.rows_failed, 1);
        assert_eq!(result.errors[0].line, 6);
        assert_eq!(result.errors[0].missing, vec!["email"]);
    }

    #[test]
    fn test_bad_number_rejected() {
        let csv = "name,sku,quantity\nStapler,ST-01,lots\n";
        let result = CsvImporter::new(TableKind::Inventory)
            .parse(csv.as_bytes())
            .unwrap();
        assert_eq!(result.rows_failed, 1);
        assert!(result.errors[0].message.starts_with("quantity: expected a number"));
    }

    #[test]
    fn test_dates_normalized_and_delimiter() {
        let csv = "description;amount;kind;date;reconciled\nRent;900;debit;03/15/2024;yes\n";
        let result = CsvImporter::new(TableKind::StatementTransactions)
            .with_delimiter(b';')
            .parse(csv.as_bytes())
            .unwrap();

        assert_eq!(result.rows_failed, 0, "{:?}", result.errors);
        assert_eq!(result.rows[0]["date"], json!("2024-03-15"));
        assert_eq!(result.rows[0]["reconciled"], json!(true));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let csv = "name,sku\nStapler,ST-01\n,\n";
        let result = CsvImporter::new(TableKind::Inventory)
            .parse(csv.as_bytes())
            .unwrap();
        assert_eq!(result.rows_processed, 1);
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_import_into_store() {
        let store = TableStore::open_in_memory().unwrap();
        store.insert("clients", json!({"id": "dup"})).unwrap();

        let csv = "id,company_name,email\n\
                   ,Acme,ap@acme.com\n\
                   ,,\n\
                   dup,Paper Co,x@paper.co\n";
        let result = CsvImporter::new(TableKind::Clients)
            .import_into(&store, csv.as_bytes())
            .unwrap();

        assert_eq!(result.rows.len(), 1);
        assert!(result.rows[0]["id"].as_str().unwrap().len() > 10);
        assert_eq!(result.rows_failed, 1);
        assert_eq!(result.errors[0].line, 4);
        assert!(result.errors[0].message.contains("already exists"));
        assert_eq!(store.count("clients").unwrap(), 2);
    }
}
