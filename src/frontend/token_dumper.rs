use crate::frontend::token::Token;

/// Pretty-printer for token streams, behind `--tokens`.
pub struct TokenDumper {
    pub color: bool,
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self { color: true }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn dump(&self, tokens: &[Token]) {
        for (i, token) in tokens.iter().enumerate() {
            println!("{}", self.render_one(i, token));
        }
    }

    fn render_one(&self, index: usize, token: &Token) -> String {
        let colr = if self.color { self.color_of(token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };
        format!(
            "[{:04}] {}{:<6} {}{}",
            index,
            colr,
            kind(token),
            text(token),
            reset
        )
    }

    fn color_of(&self, token: &Token) -> &'static str {
        match token {
            Token::Num(_) => Self::YEL,
            Token::Str(_) => Self::GRN,
            Token::Id(_) => Self::CYN,
            Token::Eol | Token::Eof => Self::DIM,
        }
    }
}

fn kind(token: &Token) -> &'static str {
    match token {
        Token::Num(_) => "NUM",
        Token::Str(_) => "STR",
        Token::Id(_) => "ID",
        Token::Eol => "EOL",
        Token::Eof => "EOF",
    }
}

fn text(token: &Token) -> String {
    match token {
        Token::Num(n) => n.to_string(),
        Token::Str(s) => format!("{:?}", s),
        Token::Id(id) => id.clone(),
        Token::Eol => String::new(),
        Token::Eof => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_color() {
        let dumper = TokenDumper::new().no_color();
        assert_eq!(
            dumper.render_one(0, &Token::Num(42)),
            "[0000] NUM    42"
        );
        assert_eq!(
            dumper.render_one(3, &Token::Id("while".to_string())),
            "[0003] ID     while"
        );
        assert_eq!(
            dumper.render_one(7, &Token::Str("a\"b".to_string())),
            "[0007] STR    \"a\\\"b\""
        );
    }
}
