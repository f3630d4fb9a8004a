//! Leaf helpers for the question-bank front end.
//!
//! - [`query`] -- URL query parameters
//! - [`shuffle`] -- in-place Fisher-Yates shuffling
//! - [`question`] -- question lookup by composite id, correct-answer extraction
//! - [`time`] -- elapsed time formatting
//! - [`template`] -- compile-once `{{ path }}` string templates

pub mod error;
pub mod query;
pub mod question;
pub mod shuffle;
pub mod template;
pub mod time;

pub use error::UtilError;
pub use query::{query_vars, QueryVars};
pub use question::{
    correct_answer, mastery_color, num_questions, question_from_id, Question, QuestionId, Section,
    MASTERY_COLORS,
};
pub use shuffle::{shuffle, shuffle_with};
pub use template::{Template, TemplateCache, TemplateSource};
pub use time::{format_elapsed, format_time};
