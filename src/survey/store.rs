use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::BotError;

use super::{Question, Survey};

/// File-backed cache of normalized surveys, one JSON artifact per name.
/// Purely a cache in front of ingestion; never talks to the backend itself.
pub struct SurveyStore {
    dir: PathBuf,
}

impl SurveyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Writes the survey's question list, replacing any prior artifact.
    pub fn save(&self, survey: &Survey) -> Result<(), BotError> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(&survey.questions)?;
        fs::write(self.path_for(&survey.name), json)?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Survey, BotError> {
        let raw = match fs::read_to_string(self.path_for(name)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BotError::SurveyNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let mut questions: Vec<Question> = serde_json::from_str(&raw)?;
        for (i, question) in questions.iter_mut().enumerate() {
            question.index = i + 1;
        }
        Ok(Survey::new(name, questions))
    }

    /// Names of every cached survey, sorted.
    pub fn list(&self) -> Result<Vec<String>, BotError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().map(|ext| ext == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
