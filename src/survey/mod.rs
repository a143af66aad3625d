pub mod grid;
pub mod results;
pub mod session;
pub mod store;

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Column that holds the question text shown to the student.
pub const PROMPT_FIELD: &str = "Вопрос";
/// Column that holds the correct answer for the row.
pub const CORRECT_FIELD: &str = "правильный";

/// One named, ordered set of questions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Survey {
    pub name: String,
    pub questions: Vec<Question>,
}

impl Survey {
    pub fn new(name: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            name: name.into(),
            questions,
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// One question row: header names zipped to cell values, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Question {
    /// 1-based position within the survey.
    pub index: usize,
    fields: Vec<(String, String)>,
}

impl Question {
    pub fn new(index: usize, fields: Vec<(String, String)>) -> Self {
        Self { index, fields }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name.as_str() == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn prompt(&self) -> &str {
        self.get(PROMPT_FIELD).unwrap_or_default()
    }

    pub fn correct_answer(&self) -> Option<&str> {
        self.get(CORRECT_FIELD)
    }

    /// The selectable answers: every field except the prompt and the
    /// correct-answer marker, in column order.
    pub fn options(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(name, _)| name.as_str() != PROMPT_FIELD && name.as_str() != CORRECT_FIELD)
            .map(|(_, value)| value.as_str())
    }
}

// The cached artifact is an array of {"field": "value"} objects, so questions
// serialize as plain maps; column order must survive the trip, which rules
// out a derived map representation.
impl Serialize for Question {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct QuestionVisitor;

impl<'de> Visitor<'de> for QuestionVisitor {
    type Value = Question;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of question fields to cell values")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = Vec::new();
        while let Some((name, value)) = access.next_entry::<String, String>()? {
            fields.push((name, value));
        }
        Ok(Question { index: 0, fields })
    }
}

impl<'de> Deserialize<'de> for Question {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(QuestionVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> Question {
        Question::new(
            1,
            vec![
                (PROMPT_FIELD.to_string(), "2+2?".to_string()),
                ("вариант 1".to_string(), "3".to_string()),
                ("вариант 2".to_string(), "4".to_string()),
                (CORRECT_FIELD.to_string(), "4".to_string()),
            ],
        )
    }

    #[test]
    fn options_keep_column_order_without_service_fields() {
        let question = question();
        assert_eq!(question.options().collect::<Vec<_>>(), ["3", "4"]);
        assert_eq!(question.prompt(), "2+2?");
        assert_eq!(question.correct_answer(), Some("4"));
    }

    #[test]
    fn question_serializes_as_an_ordered_field_object() {
        let json = serde_json::to_string(&question()).unwrap();
        assert_eq!(
            json,
            r#"{"Вопрос":"2+2?","вариант 1":"3","вариант 2":"4","правильный":"4"}"#
        );

        let back: Question = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fields(), question().fields());
    }
}
