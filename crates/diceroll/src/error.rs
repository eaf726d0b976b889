// ABOUTME: Error types for the diceroll library.
// ABOUTME: Covers expression syntax, evaluation, roller modifiers, and preset file errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unbalanced parentheses in expression")]
    UnbalancedGroup,

    #[error("Evaluation stack holds {0} values at end of expression (expected 1)")]
    StackIntegrity(usize),

    #[error("Invalid die: {0} sides")]
    InvalidDie(u32),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Unknown global modifier '{0}'")]
    UnknownModifier(String),

    #[error("Incompatible modifiers: {0}")]
    IncompatibleModifier(String),

    #[error("Confirmation not applicable: {0}")]
    ConfirmationNotApplicable(String),

    #[error("Expected a single result but the roll produced {0}")]
    MultipleResults(usize),

    #[error("Unsupported preset file version {0}")]
    UnsupportedVersion(u32),

    #[error("Corrupt preset file: {0}")]
    CorruptFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed preset record: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn syntax(msg: impl Into<String>) -> Self {
        Error::Syntax(msg.into())
    }
}
