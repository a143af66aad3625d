use crate::error::BotError;
use crate::sheets::SheetsTransport;

use super::{Question, Survey};

/// Sheet inside a survey document that holds the question grid.
pub const QUESTION_SHEET: &str = "Тест";

/// Turns a raw cell grid into a survey. The first row names the fields; every
/// later row is zipped against it positionally, keeping populated cells only.
/// Rows that map no populated cell are decorative and dropped; survivors are
/// numbered from 1 in their original relative order.
pub fn normalize(title: &str, grid: &[Vec<String>]) -> Survey {
    let Some((header, rows)) = grid.split_first() else {
        return Survey::new(title, Vec::new());
    };
    let mut questions = Vec::new();
    for row in rows {
        let fields: Vec<(String, String)> = header
            .iter()
            .zip(row.iter())
            .filter(|(_, cell)| !cell.trim().is_empty())
            .map(|(name, cell)| (name.clone(), cell.clone()))
            .collect();
        if fields.is_empty() {
            continue;
        }
        questions.push(Question::new(questions.len() + 1, fields));
    }
    Survey::new(title, questions)
}

/// Reads the document title and the question sheet through the transport and
/// normalizes the result. A failed read or an untitled document is an
/// ingestion failure, never a zero-question survey.
pub async fn ingest(transport: &dyn SheetsTransport, sheet: &str) -> Result<Survey, BotError> {
    let title = transport
        .spreadsheet_title()
        .await
        .map_err(|e| BotError::IngestionFailed(e.to_string()))?;
    if title.is_empty() {
        return Err(BotError::IngestionFailed(
            "spreadsheet has no title".to_string(),
        ));
    }
    let grid = transport
        .read_grid(sheet)
        .await
        .map_err(|e| BotError::IngestionFailed(e.to_string()))?;
    Ok(normalize(&title, &grid))
}
