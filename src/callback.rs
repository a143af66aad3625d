use crate::error::BotError;

/// Payload of the ready button.
pub const READY: &str = "ready";
const BEGIN: &str = "survey";
const ANSWER: &str = "question";

/// Parsed form of the semicolon-delimited callback payloads:
/// `ready`, `survey;<name>;<index>` and `question;<name>;<index>;<answer>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Ready,
    Begin { survey: String, index: usize },
    Answer { survey: String, index: usize, chosen: String },
}

impl CallbackAction {
    pub fn parse(data: &str) -> Result<Self, BotError> {
        let malformed = || BotError::MalformedPayload(data.to_string());
        let mut parts = data.split(';');
        let action = parts.next().ok_or_else(malformed)?;
        match action {
            READY => Ok(Self::Ready),
            BEGIN | ANSWER => {
                let survey = parts.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
                let index = parts
                    .next()
                    .and_then(|raw| raw.parse().ok())
                    .ok_or_else(malformed)?;
                if action == BEGIN {
                    Ok(Self::Begin {
                        survey: survey.to_string(),
                        index,
                    })
                } else {
                    let chosen = parts.next().ok_or_else(malformed)?;
                    Ok(Self::Answer {
                        survey: survey.to_string(),
                        index,
                        chosen: chosen.to_string(),
                    })
                }
            }
            _ => Err(malformed()),
        }
    }

    pub fn begin(survey: &str, index: usize) -> String {
        format!("{BEGIN};{survey};{index}")
    }

    pub fn answer(survey: &str, index: usize, chosen: &str) -> String {
        format!("{ANSWER};{survey};{index};{chosen}")
    }
}
