/// A lexical token of the Slate language.
///
/// Keywords, operators and punctuation all lex as `Id`; the parser tells
/// them apart by spelling. Equality is structural (kind + payload).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer literal.
    Num(i64),

    /// Identifier, keyword, operator or punctuation spelling.
    Id(String),

    /// String literal (escapes already decoded).
    Str(String),

    /// End of a source line; acts as a statement separator.
    Eol,

    /// End of input.
    Eof,
}

impl Token {
    /// Returns true if this token is an `Id` with exactly the given spelling.
    pub fn is_id(&self, text: &str) -> bool {
        matches!(self, Token::Id(s) if s == text)
    }

}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{}", n),
            Token::Id(s) => write!(f, "{}", s),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Eol => write!(f, "\\n"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        assert_eq!(Token::Num(123), Token::Num(123));
        assert_ne!(Token::Num(123), Token::Num(124));
        assert_eq!(Token::Id("abc".to_string()), Token::Id("abc".to_string()));
        assert_ne!(Token::Id("123".to_string()), Token::Num(123));
        assert_eq!(Token::Eof, Token::Eof);
    }

    #[test]
    fn test_is_id() {
        assert!(Token::Id("while".to_string()).is_id("while"));
        assert!(!Token::Id("while".to_string()).is_id("if"));
        assert!(!Token::Num(1).is_id("1"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Token::Num(42).to_string(), "42");
        assert_eq!(Token::Id("+".to_string()).to_string(), "+");
        assert_eq!(Token::Str("hi".to_string()).to_string(), "\"hi\"");
    }
}
