pub mod infer;

use calamine::{open_workbook_auto, Data, Reader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("contacts file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("unsupported contacts file extension: {0:?} (expected .xlsx, .xls or .csv)")]
    UnsupportedFormat(String),
    #[error("spreadsheet has no data")]
    Empty,
    #[error("failed to read spreadsheet: {0}")]
    Sheet(#[from] calamine::Error),
    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),
}

/// One row of the loaded table, reduced to what the send loop needs.
/// `phone` is digits only; rows that reduce to an empty phone are skipped
/// before a `Contact` is ever built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub row_index: usize,
    pub phone: String,
    pub name: String,
}

/// Contact spreadsheet loaded into memory. Read-only after load.
#[derive(Debug, Clone)]
pub struct ContactTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ContactTable {
    /// Loads a tabular contacts file, dispatching on the extension.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let table = match extension.as_str() {
            "xlsx" | "xls" | "xlsm" | "ods" => Self::load_workbook(path)?,
            "csv" => Self::load_csv(path)?,
            other => return Err(LoadError::UnsupportedFormat(other.to_string())),
        };

        if table.headers.is_empty() {
            return Err(LoadError::Empty);
        }

        info!(
            "Loaded {} with {} rows and {} columns",
            path.display(),
            table.rows.len(),
            table.headers.len()
        );
        Ok(table)
    }

    fn load_workbook(path: &Path) -> Result<Self, LoadError> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(LoadError::Empty)??;

        let mut rows_iter = range.rows();
        let headers: Vec<String> = rows_iter
            .next()
            .ok_or(LoadError::Empty)?
            .iter()
            .map(cell_to_string)
            .collect();

        let rows = rows_iter
            .map(|row| {
                let mut cells: Vec<String> = row.iter().map(cell_to_string).collect();
                cells.resize(headers.len(), String::new());
                cells
            })
            .collect();

        Ok(Self { headers, rows })
    }

    fn load_csv(path: &Path) -> Result<Self, LoadError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut cells: Vec<String> =
                record.iter().map(|c| c.trim().to_string()).collect();
            cells.resize(headers.len(), String::new());
            rows.push(cells);
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Infers the phone and name columns and extracts the sendable contacts.
    /// Rows whose phone cell has no digits are skipped. An empty name cell
    /// falls back to the phone string.
    pub fn contacts(&self) -> Vec<Contact> {
        let phone_col = infer::phone_column(&self.headers, &self.rows);
        let name_col = infer::name_column(&self.headers, phone_col);

        info!(
            "Selected column {:?} for phone numbers and {:?} for names",
            self.headers[phone_col], self.headers[name_col]
        );

        let mut contacts = Vec::new();
        for (row_index, row) in self.rows.iter().enumerate() {
            let phone = infer::normalize_phone(&row[phone_col]);
            if phone.is_empty() {
                debug!("Skipping row {}: no phone digits", row_index + 1);
                continue;
            }

            let name = row[name_col].trim();
            let name = if name.is_empty() {
                phone.clone()
            } else {
                name.to_string()
            };

            contacts.push(Contact {
                row_index,
                phone,
                name,
            });
        }
        contacts
    }
}

/// Spreadsheet cells come back typed; phone columns are usually numeric, so
/// integral floats must render without the trailing `.0`.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table_from_csv(content: &str) -> ContactTable {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("temp csv");
        file.write_all(content.as_bytes()).expect("write csv");
        ContactTable::load(file.path()).expect("load csv")
    }

    #[test]
    fn loads_csv_with_headers() {
        let table = table_from_csv("Phone,Name\n1234567,Alice\n7654321,Bob\n");
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.headers(), ["Phone", "Name"]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = ContactTable::load(Path::new("/nonexistent/contacts.xlsx")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .expect("temp file");
        let err = ContactTable::load(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ext) if ext == "pdf"));
    }

    #[test]
    fn short_rows_are_padded() {
        let table = table_from_csv("Phone,Name\n1234567\n");
        let contacts = table.contacts();
        assert_eq!(contacts.len(), 1);
        // padded name cell is empty, so the phone doubles as the name
        assert_eq!(contacts[0].name, "1234567");
    }

    #[test]
    fn rows_without_phone_digits_are_skipped() {
        let table = table_from_csv("Phone,Name\n1234567,Alice\n,Bob\n7654321,\n");
        let contacts = table.contacts();
        assert_eq!(contacts.len(), 2);
        assert_eq!(
            contacts[0],
            Contact {
                row_index: 0,
                phone: "1234567".to_string(),
                name: "Alice".to_string(),
            }
        );
        assert_eq!(
            contacts[1],
            Contact {
                row_index: 2,
                phone: "7654321".to_string(),
                name: "7654321".to_string(),
            }
        );
    }

    #[test]
    fn integral_float_cells_render_without_decimal() {
        assert_eq!(cell_to_string(&Data::Float(15551234567.0)), "15551234567");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }
}
