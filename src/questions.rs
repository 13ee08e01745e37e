//! # Question Bank
//!
//! The ordered list of survey questions. It's read once from a JSON file at startup
//! (a plain array of strings) and shared read-only by every request afterwards.
//! A question is identified only by its position in the list.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Immutable, cheaply clonable list of question texts.
///
/// ## Rust Concepts:
/// - **Arc<[String]>**: Shared ownership of a fixed-size slice. Cloning the bank only
///   bumps a reference count, and there is no way to mutate it after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Arc<[String]>,
}

impl QuestionBank {
    /// Build a bank from question texts. At least one non-blank question is required.
    pub fn new(questions: Vec<String>) -> Result<Self> {
        if questions.is_empty() {
            anyhow::bail!("Question bank must contain at least one question");
        }

        if let Some(position) = questions.iter().position(|q| q.trim().is_empty()) {
            anyhow::bail!("Question {} is blank", position);
        }

        Ok(Self {
            questions: questions.into(),
        })
    }

    /// Parse a JSON array of strings.
    pub fn from_json(json: &str) -> Result<Self> {
        let questions: Vec<String> =
            serde_json::from_str(json).context("Questions must be a JSON array of strings")?;
        Self::new(questions)
    }

    /// Load the bank from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read questions from {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid question file {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.questions.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.questions.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_json_keeps_order() {
        let bank = QuestionBank::from_json(r#"["First?", "Second?", "Third?"]"#).unwrap();

        assert_eq!(bank.len(), 3);
        assert_eq!(bank.get(0), Some("First?"));
        assert_eq!(bank.get(2), Some("Third?"));
        assert_eq!(bank.get(3), None);
    }

    #[test]
    fn test_rejects_empty_and_blank() {
        assert!(QuestionBank::from_json("[]").is_err());
        assert!(QuestionBank::from_json(r#"["ok", "  "]"#).is_err());
        assert!(QuestionBank::from_json(r#"{"q": "not a list"}"#).is_err());
    }

    #[test]
    fn test_load_from_file_is_stable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["How old are you?", "What is your favourite colour?"]"#).unwrap();

        let bank = QuestionBank::load(file.path()).unwrap();
        let shared = bank.clone();

        // Reading the bank again mid-run yields the same ordered sequence
        let first: Vec<&str> = bank.iter().collect();
        let second: Vec<&str> = shared.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["How old are you?", "What is your favourite colour?"]);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(QuestionBank::load("/definitely/not/here/questions.json").is_err());
    }
}
