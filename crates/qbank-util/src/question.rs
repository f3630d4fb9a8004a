//! Question bank data and lookup by composite id.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::UtilError;

/// Display colors for mastery levels 0-5; level 0 has none.
pub const MASTERY_COLORS: [&str; 6] = ["", "#CA5353", "#DA8143", "#CBDA2E", "#BCDC3B", "#81D43A"];

/// Color for a mastery level, `None` for unknown levels.
pub fn mastery_color(level: usize) -> Option<&'static str> {
    MASTERY_COLORS.get(level).copied()
}

/// A section of the question bank.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// A single question. Fields the helpers do not use are kept in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// 1-based index of the correct choice, when given explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<u32>,
    /// Explanation text, which may name the correct choice.
    #[serde(default)]
    pub answer: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Composite question id, `"<section>,<question>"`, optionally `q,`-prefixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuestionId {
    pub section: usize,
    pub question: usize,
}

impl QuestionId {
    pub fn new(section: usize, question: usize) -> Self {
        Self { section, question }
    }

    /// Sub-key form used by the mastery namespace.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.section, self.question)
    }
}

impl FromStr for QuestionId {
    type Err = UtilError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let invalid = || UtilError::InvalidQuestionId(id.to_string());
        let rest = id.strip_prefix("q,").unwrap_or(id);
        let mut parts = rest.split(',');
        let section = parts
            .next()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(invalid)?;
        let question = parts
            .next()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(invalid)?;
        Ok(Self { section, question })
    }
}

/// Look up the question named by `id`.
///
/// Returns `None` when the id does not parse or points outside `sections`.
pub fn question_from_id<'a>(sections: &'a [Section], id: &str) -> Option<&'a Question> {
    let id: QuestionId = id.parse().ok()?;
    sections.get(id.section)?.questions.get(id.question)
}

/// Total number of questions across all sections.
pub fn num_questions(sections: &[Section]) -> usize {
    sections.iter().map(|s| s.questions.len()).sum()
}

static CORRECT_CHOICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([A-Z])\s+is\s+correct|answer\s+is\s+([A-Z])").expect("static")
});

/// The 1-based index of the correct choice.
///
/// Uses `question.correct` when set, otherwise looks for "`X` is correct" or
/// "answer is `X`" (case-insensitive) in the answer text and converts the
/// letter to its position in the alphabet.
pub fn correct_answer(question: &Question) -> Option<u32> {
    if let Some(correct) = question.correct.filter(|c| *c > 0) {
        return Some(correct);
    }
    let caps = CORRECT_CHOICE.captures(&question.answer)?;
    let letter = caps
        .get(1)
        .or_else(|| caps.get(2))?
        .as_str()
        .chars()
        .next()
        .filter(char::is_ascii_alphabetic)?;
    Some(u32::from(letter.to_ascii_uppercase()) - u32::from('A') + 1)
}
