//! Parse errors

use serde::{Deserialize, Serialize};

/// A syntax error with its 1-based source position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    pub message: String,
    pub line: u64,
    pub column: u64,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: u64, column: u64) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}:{} {}", self.line, self.column, self.message)
    }
}

/// Failure of a parse call. No IR is produced alongside an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Syntax error: {}", render(.0))]
    Syntax(Vec<SyntaxError>),
}

impl ParseError {
    /// Error carrying a single syntax error
    pub fn syntax(message: impl Into<String>, line: u64, column: u64) -> Self {
        Self::Syntax(vec![SyntaxError::new(message, line, column)])
    }

    /// All syntax errors carried by this failure
    pub fn errors(&self) -> &[SyntaxError] {
        match self {
            Self::Syntax(errors) => errors,
        }
    }
}

fn render(errors: &[SyntaxError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
