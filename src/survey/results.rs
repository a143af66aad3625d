use chrono::Local;

use crate::error::BotError;
use crate::sheets::SheetsTransport;

use super::session::QuizSession;

const RESULTS_SUFFIX: &str = "_results";
const CORRECT: &str = "correct";
const INCORRECT: &str = "incorrect";

pub fn results_sheet_title(survey_name: &str) -> String {
    format!("{survey_name}{RESULTS_SUFFIX}")
}

/// Appends one result row for a finished session into the survey's document,
/// creating the results sheet and its header the first time a result arrives.
/// Transport failures propagate; a lost result row is data loss, so the
/// caller decides what to tell the student.
pub async fn record(
    transport: &dyn SheetsTransport,
    session: &QuizSession,
) -> Result<(), BotError> {
    let title = results_sheet_title(&session.survey_name);

    let existing = transport.sheet_titles().await?;
    if !existing.iter().any(|t| t == &title) {
        transport.create_sheet(&title).await?;
        let mut header = vec!["Student".to_string(), "Time".to_string()];
        header.extend(session.answers.iter().map(|a| a.question.clone()));
        header.push("Score".to_string());
        transport.append_row(&title, &header).await?;
    }

    let mut row = vec![
        session.student.clone(),
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    ];
    row.extend(
        session
            .answers
            .iter()
            .map(|a| if a.is_correct { CORRECT } else { INCORRECT }.to_string()),
    );
    row.push(session.score_summary());
    transport.append_row(&title, &row).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::BotError;
    use crate::sheets::testing::{row, FakeSheets};
    use crate::survey::session::{AnswerRecord, QuizSession};

    fn finished_session(name: &str, verdicts: &[bool]) -> QuizSession {
        let mut session = QuizSession::new("Аня", name);
        for (i, correct) in verdicts.iter().enumerate() {
            session.answers.push(AnswerRecord {
                question: format!("Вопрос {}", i + 1),
                is_correct: *correct,
            });
        }
        session
    }

    #[tokio::test]
    async fn creates_the_results_sheet_and_header_exactly_once() {
        let fake = FakeSheets::new("Алгебра").with_sheet("Тест", Vec::new());
        let session = finished_session("Алгебра", &[true, false]);

        super::record(&fake, &session).await.unwrap();
        super::record(&fake, &session).await.unwrap();

        assert_eq!(fake.sheet_names(), ["Тест", "Алгебра_results"]);
        let rows = fake.rows("Алгебра_results");
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            row(&["Student", "Time", "Вопрос 1", "Вопрос 2", "Score"])
        );
    }

    #[tokio::test]
    async fn result_rows_carry_verdicts_and_the_score() {
        let fake = FakeSheets::new("Алгебра").with_sheet("Тест", Vec::new());
        let session = finished_session("Алгебра", &[false, true]);

        super::record(&fake, &session).await.unwrap();

        let rows = fake.rows("Алгебра_results");
        let result = &rows[1];
        assert_eq!(result[0], "Аня");
        assert_eq!(&result[2..], row(&["incorrect", "correct", "1/2"]));
    }

    #[tokio::test]
    async fn vanished_document_is_a_backing_store_error() {
        let fake = FakeSheets::vanished();
        let session = finished_session("Алгебра", &[true]);

        let err = super::record(&fake, &session).await.unwrap_err();
        assert!(matches!(err, BotError::BackingStoreUnavailable(_)));
    }
}
