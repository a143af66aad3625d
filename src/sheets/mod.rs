pub mod http;
pub mod table;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("spreadsheet API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// The slice of the spreadsheet backend the bot relies on. Row and column
/// numbers are 1-based, like the ranges the backend itself speaks. None of
/// these calls retry; a failed call is reported as-is.
#[async_trait]
pub trait SheetsTransport: Send + Sync {
    /// Title of the spreadsheet document itself (not of a sheet within it).
    async fn spreadsheet_title(&self) -> Result<String, TransportError>;

    async fn sheet_titles(&self) -> Result<Vec<String>, TransportError>;

    /// Every populated row of the named sheet.
    async fn read_grid(&self, sheet: &str) -> Result<Vec<Vec<String>>, TransportError>;

    /// Rows `first_row..=last_row` limited to the first `columns` columns.
    /// Trailing unpopulated rows are not returned.
    async fn read_rows(
        &self,
        sheet: &str,
        first_row: usize,
        last_row: usize,
        columns: usize,
    ) -> Result<Vec<Vec<String>>, TransportError>;

    /// Overwrites one row starting at column A.
    async fn write_row(
        &self,
        sheet: &str,
        row_number: usize,
        cells: &[String],
    ) -> Result<(), TransportError>;

    /// Appends one row after the last populated row of the sheet.
    async fn append_row(&self, sheet: &str, cells: &[String]) -> Result<(), TransportError>;

    /// Creates a new document whose first sheet is `first_sheet` and rebinds
    /// the transport to it. Returns the new document id.
    async fn create_spreadsheet(
        &self,
        title: &str,
        first_sheet: &str,
    ) -> Result<String, TransportError>;

    async fn create_sheet(&self, title: &str) -> Result<(), TransportError>;

    /// Makes the bound document readable by anyone with the link.
    async fn grant_public_read(&self) -> Result<(), TransportError>;
}

/// Pulls the document id out of a `https://docs.google.com/spreadsheets/d/<id>/...`
/// link. A bare id (no slashes) is accepted as-is.
pub fn spreadsheet_id_from_url(link: &str) -> Option<String> {
    if !link.contains('/') {
        return Some(link.to_string()).filter(|id| !id.is_empty());
    }
    let mut parts = link.split('/');
    while let Some(part) = parts.next() {
        if part == "d" {
            return parts.next().filter(|id| !id.is_empty()).map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{SheetsTransport, TransportError};

    pub fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    /// In-memory stand-in for the spreadsheet backend.
    pub struct FakeSheets {
        title: String,
        sheets: Mutex<Vec<(String, Vec<Vec<String>>)>>,
        vanished: bool,
    }

    impl FakeSheets {
        pub fn new(title: &str) -> Self {
            Self {
                title: title.to_string(),
                sheets: Mutex::new(Vec::new()),
                vanished: false,
            }
        }

        /// A backend whose document no longer exists: every call fails.
        pub fn vanished() -> Self {
            Self {
                title: String::new(),
                sheets: Mutex::new(Vec::new()),
                vanished: true,
            }
        }

        pub fn with_sheet(self, title: &str, rows: Vec<Vec<String>>) -> Self {
            self.sheets.lock().unwrap().push((title.to_string(), rows));
            self
        }

        pub fn sheet_names(&self) -> Vec<String> {
            self.sheets.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
        }

        pub fn rows(&self, sheet: &str) -> Vec<Vec<String>> {
            self.sheets
                .lock()
                .unwrap()
                .iter()
                .find(|(t, _)| t == sheet)
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default()
        }

        fn guard(&self) -> Result<(), TransportError> {
            if self.vanished {
                return Err(TransportError::Api {
                    status: 404,
                    message: "Requested entity was not found.".to_string(),
                });
            }
            Ok(())
        }
    }

    fn no_such_sheet(sheet: &str) -> TransportError {
        TransportError::Api {
            status: 400,
            message: format!("Unable to parse range: {sheet}"),
        }
    }

    #[async_trait]
    impl SheetsTransport for FakeSheets {
        async fn spreadsheet_title(&self) -> Result<String, TransportError> {
            self.guard()?;
            Ok(self.title.clone())
        }

        async fn sheet_titles(&self) -> Result<Vec<String>, TransportError> {
            self.guard()?;
            Ok(self.sheet_names())
        }

        async fn read_grid(&self, sheet: &str) -> Result<Vec<Vec<String>>, TransportError> {
            self.guard()?;
            let sheets = self.sheets.lock().unwrap();
            sheets
                .iter()
                .find(|(t, _)| t == sheet)
                .map(|(_, rows)| rows.clone())
                .ok_or_else(|| no_such_sheet(sheet))
        }

        async fn read_rows(
            &self,
            sheet: &str,
            first_row: usize,
            last_row: usize,
            columns: usize,
        ) -> Result<Vec<Vec<String>>, TransportError> {
            self.guard()?;
            let sheets = self.sheets.lock().unwrap();
            let (_, rows) = sheets
                .iter()
                .find(|(t, _)| t == sheet)
                .ok_or_else(|| no_such_sheet(sheet))?;
            let start = first_row.saturating_sub(1);
            let end = last_row.min(rows.len());
            if start >= end {
                return Ok(Vec::new());
            }
            Ok(rows[start..end]
                .iter()
                .map(|r| r.iter().take(columns).cloned().collect())
                .collect())
        }

        async fn write_row(
            &self,
            sheet: &str,
            row_number: usize,
            cells: &[String],
        ) -> Result<(), TransportError> {
            self.guard()?;
            let mut sheets = self.sheets.lock().unwrap();
            let (_, rows) = sheets
                .iter_mut()
                .find(|(t, _)| t == sheet)
                .ok_or_else(|| no_such_sheet(sheet))?;
            while rows.len() < row_number {
                rows.push(Vec::new());
            }
            rows[row_number - 1] = cells.to_vec();
            Ok(())
        }

        async fn append_row(&self, sheet: &str, cells: &[String]) -> Result<(), TransportError> {
            self.guard()?;
            let mut sheets = self.sheets.lock().unwrap();
            let (_, rows) = sheets
                .iter_mut()
                .find(|(t, _)| t == sheet)
                .ok_or_else(|| no_such_sheet(sheet))?;
            rows.push(cells.to_vec());
            Ok(())
        }

        async fn create_spreadsheet(
            &self,
            _title: &str,
            first_sheet: &str,
        ) -> Result<String, TransportError> {
            self.guard()?;
            let mut sheets = self.sheets.lock().unwrap();
            sheets.clear();
            sheets.push((first_sheet.to_string(), Vec::new()));
            Ok("fake-spreadsheet".to_string())
        }

        async fn create_sheet(&self, title: &str) -> Result<(), TransportError> {
            self.guard()?;
            let mut sheets = self.sheets.lock().unwrap();
            if sheets.iter().any(|(t, _)| t == title) {
                return Err(TransportError::Api {
                    status: 400,
                    message: format!("A sheet with the name {title:?} already exists."),
                });
            }
            sheets.push((title.to_string(), Vec::new()));
            Ok(())
        }

        async fn grant_public_read(&self) -> Result<(), TransportError> {
            self.guard()
        }
    }

    #[test]
    fn url_parsing_extracts_document_id() {
        use super::spreadsheet_id_from_url;

        assert_eq!(
            spreadsheet_id_from_url("https://docs.google.com/spreadsheets/d/abc123/edit#gid=0"),
            Some("abc123".to_string())
        );
        assert_eq!(spreadsheet_id_from_url("abc123"), Some("abc123".to_string()));
        assert_eq!(spreadsheet_id_from_url(""), None);
        assert_eq!(spreadsheet_id_from_url("https://docs.google.com/spreadsheets/d/"), None);
        assert_eq!(spreadsheet_id_from_url("https://example.com/nothing/here"), None);
    }
}
