use crate::frontend::lexer::LexerError;

/// A parsing error with the source line it was detected on.
///
/// Slate tokens carry no spans of their own, so the parser reports the
/// lexer's current line: good enough to find the offending statement.
#[derive(Debug)]
pub struct ParserError {
    pub message: String,
    pub line: usize,
}

impl ParserError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        ParserError {
            message: message.into(),
            line,
        }
    }
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParserError {}

impl From<LexerError> for ParserError {
    fn from(e: LexerError) -> Self {
        ParserError {
            message: e.message,
            line: e.line,
        }
    }
}
