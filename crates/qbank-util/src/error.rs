use thiserror::Error;

/// Errors produced by the helpers in this crate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UtilError {
    #[error("unterminated expression starting at byte {0}")]
    UnterminatedExpression(usize),

    #[error("empty expression at byte {0}")]
    EmptyExpression(usize),

    #[error("invalid path expression {expr:?}: {reason}")]
    InvalidPath { expr: String, reason: String },

    #[error("invalid question id {0:?}")]
    InvalidQuestionId(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),
}

pub type Result<T> = std::result::Result<T, UtilError>;
