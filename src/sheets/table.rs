use std::collections::HashMap;
use std::sync::Arc;

use crate::error::BotError;

use super::SheetsTransport;

/// Ordered sheet declarations: title plus the attribute columns of its header
/// row. Declaration order is also the order provisioning creates the sheets.
#[derive(Debug, Clone, Default)]
pub struct SheetSchema {
    sheets: Vec<(String, Vec<String>)>,
}

impl SheetSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet<C: Into<String>>(
        mut self,
        title: &str,
        columns: impl IntoIterator<Item = C>,
    ) -> Self {
        self.sheets
            .push((title.to_string(), columns.into_iter().map(Into::into).collect()));
        self
    }

    pub fn columns(&self, title: &str) -> Option<&[String]> {
        self.sheets
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, columns)| columns.as_slice())
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|(title, _)| title.as_str())
    }
}

/// Treats each declared sheet as a table keyed by its first column. Rows are
/// matched, filled and blanked in place; nothing here takes a lock on the
/// shared sheet, so concurrent writers against one sheet can race.
pub struct RowTable {
    transport: Arc<dyn SheetsTransport>,
    schema: SheetSchema,
    scan_limit: usize,
}

impl RowTable {
    pub fn new(transport: Arc<dyn SheetsTransport>, schema: SheetSchema, scan_limit: usize) -> Self {
        Self {
            transport,
            schema,
            scan_limit,
        }
    }

    fn columns(&self, sheet: &str) -> Result<&[String], BotError> {
        self.schema
            .columns(sheet)
            .ok_or_else(|| BotError::UndeclaredSheet(sheet.to_string()))
    }

    async fn first_column_cells(&self, sheet: &str) -> Result<Vec<String>, BotError> {
        let rows = self.transport.read_rows(sheet, 1, self.scan_limit, 1).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect())
    }

    /// Writes `row` into the row whose first cell equals `row[0]`, or into the
    /// first blank row, or after the last populated row.
    pub async fn upsert_row(&self, sheet: &str, row: &[String]) -> Result<(), BotError> {
        let key = row.first().map(String::as_str).unwrap_or_default();
        let column = self.first_column_cells(sheet).await?;
        let slot = column
            .iter()
            .position(|cell| cell == key)
            .or_else(|| column.iter().position(|cell| cell.is_empty()));
        let row_number = slot.map_or(column.len() + 1, |i| i + 1);
        self.transport.write_row(sheet, row_number, row).await?;
        Ok(())
    }

    /// Blanks the row keyed by `key` without shifting its neighbours. Returns
    /// `false` when no row carries the key.
    pub async fn remove_row(&self, sheet: &str, key: &str) -> Result<bool, BotError> {
        let width = self.columns(sheet)?.len();
        let column = self.first_column_cells(sheet).await?;
        let Some(slot) = column.iter().position(|cell| cell == key) else {
            return Ok(false);
        };
        let blanks = vec![String::new(); width];
        self.transport.write_row(sheet, slot + 1, &blanks).await?;
        Ok(true)
    }

    /// Field map of the row keyed by `key`, or an empty map when absent.
    pub async fn get_row(&self, sheet: &str, key: &str) -> Result<HashMap<String, String>, BotError> {
        let columns = self.columns(sheet)?;
        let rows = self
            .transport
            .read_rows(sheet, 2, self.scan_limit, columns.len())
            .await?;
        for row in rows {
            if row.first().map(String::as_str) == Some(key) {
                return Ok(columns
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (name.clone(), row.get(i).cloned().unwrap_or_default()))
                    .collect());
            }
        }
        Ok(HashMap::new())
    }

    /// Every non-blank key in the sheet, header excluded, in sheet order.
    pub async fn first_column(&self, sheet: &str) -> Result<Vec<String>, BotError> {
        let column = self.first_column_cells(sheet).await?;
        Ok(column
            .into_iter()
            .skip(1)
            .filter(|cell| !cell.is_empty())
            .collect())
    }

    /// Creates a new document holding every declared sheet, writes each header
    /// row and opens the document for public reading. Returns the document id.
    pub async fn provision_spreadsheet(&self, document_title: &str) -> Result<String, BotError> {
        let mut document_id = String::new();
        for (i, sheet) in self.schema.titles().enumerate() {
            if i == 0 {
                document_id = self
                    .transport
                    .create_spreadsheet(document_title, sheet)
                    .await?;
            } else {
                self.transport.create_sheet(sheet).await?;
            }
            self.write_header(sheet).await?;
        }
        if !document_id.is_empty() {
            self.transport.grant_public_read().await?;
        }
        Ok(document_id)
    }

    /// Adds one declared sheet to the bound document and writes its header.
    pub async fn provision_sheet(&self, sheet: &str) -> Result<(), BotError> {
        self.transport.create_sheet(sheet).await?;
        self.write_header(sheet).await
    }

    async fn write_header(&self, sheet: &str) -> Result<(), BotError> {
        let columns = self.columns(sheet)?;
        self.transport.write_row(sheet, 1, columns).await?;
        Ok(())
    }
}
