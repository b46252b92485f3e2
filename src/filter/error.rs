use crate::document::TextError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterParseError {
    #[error("Unterminated quote '{quote_char}' at position {position}")]
    UnterminatedQuote { position: usize, quote_char: char },
    #[error("Invalid escape sequence at position {position}")]
    InvalidEscapeSequence { position: usize },
    #[error("Invalid syntax: {message} at position {position}")]
    InvalidSyntax { message: String, position: usize },
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },
    #[error("Unexpected end of input at position {position}")]
    UnexpectedEndOfInput { position: usize },
    #[error("Invalid arguments for {name}(): {message} at position {position}")]
    InvalidFunctionArguments {
        name: String,
        message: String,
        position: usize,
    },
    #[error("Invalid filter object: {0}")]
    InvalidJson(#[from] TextError),
    /// The store refused the predicate when it was run.
    #[error("Filter rejected by store: {0}")]
    Rejected(String),
}

impl FilterParseError {
    pub fn position(&self) -> Option<usize> {
        match self {
            FilterParseError::UnterminatedQuote { position, .. }
            | FilterParseError::InvalidEscapeSequence { position }
            | FilterParseError::InvalidSyntax { position, .. }
            | FilterParseError::UnexpectedToken { position, .. }
            | FilterParseError::UnexpectedEndOfInput { position }
            | FilterParseError::InvalidFunctionArguments { position, .. } => Some(*position),
            FilterParseError::InvalidJson(_) | FilterParseError::Rejected(_) => None,
        }
    }
}
