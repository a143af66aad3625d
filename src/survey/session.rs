use serde::{Deserialize, Serialize};

use crate::error::BotError;

use super::{Question, Survey};

/// Verdict for one answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub is_correct: bool,
}

/// One student's pass through one survey. Lives inside the dialogue state, so
/// every transition goes through `advance` rather than ambient chat data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizSession {
    pub student: String,
    pub survey_name: String,
    pub answers: Vec<AnswerRecord>,
}

/// What the state machine decided to do next.
#[derive(Debug)]
pub enum Step<'a> {
    Ask {
        question: &'a Question,
        /// 1-based index the answer buttons must carry back.
        reply_index: usize,
    },
    Finished {
        summary: String,
    },
}

impl QuizSession {
    pub fn new(student: impl Into<String>, survey_name: impl Into<String>) -> Self {
        Self {
            student: student.into(),
            survey_name: survey_name.into(),
            answers: Vec::new(),
        }
    }

    /// Scores the answer the payload carries (when it carries one) and picks
    /// the next step. `index` is the payload index: the 1-based number of the
    /// question just answered, or 0 on the bootstrap entry that has nothing
    /// to score. The question shown next is `questions[index]`, so its reply
    /// buttons carry `index + 1`.
    pub fn advance<'a>(
        &mut self,
        survey: &'a Survey,
        index: usize,
        chosen: Option<&str>,
    ) -> Result<Step<'a>, BotError> {
        if let Some(chosen) = chosen {
            let answered = index
                .checked_sub(1)
                .and_then(|i| survey.questions.get(i))
                .ok_or_else(|| {
                    BotError::MalformedPayload(format!(
                        "answer for question {index} of the {}-question survey {:?}",
                        survey.len(),
                        survey.name
                    ))
                })?;
            let correct = answered
                .correct_answer()
                .ok_or_else(|| BotError::MissingCorrectAnswer {
                    survey: survey.name.clone(),
                    index: answered.index,
                })?;
            self.answers.push(AnswerRecord {
                question: answered.prompt().to_string(),
                is_correct: chosen == correct,
            });
        }

        match survey.questions.get(index) {
            Some(question) => Ok(Step::Ask {
                question,
                reply_index: index + 1,
            }),
            None => Ok(Step::Finished {
                summary: self.score_summary(),
            }),
        }
    }

    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct).count()
    }

    pub fn score_summary(&self) -> String {
        format!("{}/{}", self.correct_count(), self.answers.len())
    }
}
