use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{SheetsTransport, TransportError};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_API: &str = "https://www.googleapis.com/drive/v3/files";

/// Thin REST client for one spreadsheet document. The bound document id
/// changes only when `create_spreadsheet` provisions a new one.
pub struct GoogleSheets {
    http: reqwest::Client,
    token: String,
    spreadsheet_id: Mutex<String>,
}

impl GoogleSheets {
    pub fn new(spreadsheet_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            spreadsheet_id: Mutex::new(spreadsheet_id.into()),
        }
    }

    pub fn spreadsheet_id(&self) -> String {
        self.spreadsheet_id.lock().unwrap().clone()
    }

    async fn get_json(&self, url: String) -> Result<Value, TransportError> {
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        check(response).await
    }

    async fn send_json(
        &self,
        request: reqwest::RequestBuilder,
        body: Value,
    ) -> Result<Value, TransportError> {
        let response = request.bearer_auth(&self.token).json(&body).send().await?;
        check(response).await
    }

    fn values_url(&self, range: &str) -> String {
        format!("{SHEETS_API}/{}/values/{range}", self.spreadsheet_id())
    }
}

async fn check(response: reqwest::Response) -> Result<Value, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(TransportError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

// Single-letter column ranges cover every schema this bot declares.
fn column_letter(count: usize) -> char {
    (b'A' + count.saturating_sub(1).min(25) as u8) as char
}

fn values_to_rows(value: &Value) -> Vec<Vec<String>> {
    let Some(rows) = value["values"].as_array() else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| {
            row.as_array()
                .map(|cells| {
                    cells
                        .iter()
                        .map(|cell| cell.as_str().unwrap_or_default().to_string())
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect()
}

#[async_trait]
impl SheetsTransport for GoogleSheets {
    async fn spreadsheet_title(&self) -> Result<String, TransportError> {
        let url = format!(
            "{SHEETS_API}/{}?fields=properties.title",
            self.spreadsheet_id()
        );
        let value = self.get_json(url).await?;
        Ok(value["properties"]["title"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn sheet_titles(&self) -> Result<Vec<String>, TransportError> {
        let url = format!(
            "{SHEETS_API}/{}?fields=sheets.properties.title",
            self.spreadsheet_id()
        );
        let value = self.get_json(url).await?;
        let Some(sheets) = value["sheets"].as_array() else {
            return Ok(Vec::new());
        };
        Ok(sheets
            .iter()
            .filter_map(|sheet| sheet["properties"]["title"].as_str())
            .map(str::to_string)
            .collect())
    }

    async fn read_grid(&self, sheet: &str) -> Result<Vec<Vec<String>>, TransportError> {
        let value = self.get_json(self.values_url(sheet)).await?;
        Ok(values_to_rows(&value))
    }

    async fn read_rows(
        &self,
        sheet: &str,
        first_row: usize,
        last_row: usize,
        columns: usize,
    ) -> Result<Vec<Vec<String>>, TransportError> {
        let range = format!("{sheet}!A{first_row}:{}{last_row}", column_letter(columns));
        let value = self.get_json(self.values_url(&range)).await?;
        Ok(values_to_rows(&value))
    }

    async fn write_row(
        &self,
        sheet: &str,
        row_number: usize,
        cells: &[String],
    ) -> Result<(), TransportError> {
        let range = format!(
            "{sheet}!A{row_number}:{}{row_number}",
            column_letter(cells.len())
        );
        let request = self
            .http
            .put(self.values_url(&range))
            .query(&[("valueInputOption", "USER_ENTERED")]);
        self.send_json(request, json!({ "values": [cells] })).await?;
        Ok(())
    }

    async fn append_row(&self, sheet: &str, cells: &[String]) -> Result<(), TransportError> {
        let url = format!("{}:append", self.values_url(&format!("{sheet}!A1")));
        let request = self.http.post(url).query(&[
            ("valueInputOption", "USER_ENTERED"),
            ("insertDataOption", "INSERT_ROWS"),
        ]);
        self.send_json(request, json!({ "values": [cells] })).await?;
        Ok(())
    }

    async fn create_spreadsheet(
        &self,
        title: &str,
        first_sheet: &str,
    ) -> Result<String, TransportError> {
        let body = json!({
            "properties": { "title": title, "locale": "ru_RU" },
            "sheets": [{ "properties": { "sheetType": "GRID", "title": first_sheet } }],
        });
        let value = self.send_json(self.http.post(SHEETS_API), body).await?;
        let id = value["spreadsheetId"].as_str().unwrap_or_default().to_string();
        *self.spreadsheet_id.lock().unwrap() = id.clone();
        Ok(id)
    }

    async fn create_sheet(&self, title: &str) -> Result<(), TransportError> {
        let url = format!("{SHEETS_API}/{}:batchUpdate", self.spreadsheet_id());
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }],
        });
        self.send_json(self.http.post(url), body).await?;
        Ok(())
    }

    async fn grant_public_read(&self) -> Result<(), TransportError> {
        let url = format!("{DRIVE_API}/{}/permissions", self.spreadsheet_id());
        let body = json!({ "type": "anyone", "role": "reader" });
        self.send_json(self.http.post(url), body).await?;
        Ok(())
    }
}
