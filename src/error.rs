use thiserror::Error;

use crate::sheets::TransportError;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("survey ingestion failed: {0}")]
    IngestionFailed(String),

    #[error("survey {0:?} is not cached")]
    SurveyNotFound(String),

    #[error("spreadsheet backend unavailable: {0}")]
    BackingStoreUnavailable(#[from] TransportError),

    #[error("malformed callback payload: {0}")]
    MalformedPayload(String),

    #[error("sheet {0:?} is not declared in the schema")]
    UndeclaredSheet(String),

    #[error("question {index} of survey {survey:?} has no correct answer marked")]
    MissingCorrectAnswer { survey: String, index: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
