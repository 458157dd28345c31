use std::collections::VecDeque;

use crate::frontend::token::Token;

#[derive(Debug)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

/// Two-character operators, tried before single characters (maximal munch).
const TWO_CHAR_OPS: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];

const SINGLE_CHAR_OPS: &str = "+-*/%<>=!(){}[].,;";

/// Lazy, restartable token stream.
///
/// The source is consumed one line at a time: `peek(n)` and `read()` pull
/// lines into an internal queue only as far as needed, giving the parser
/// its one-token-of-lookahead contract. Every source line contributes an
/// `Eol` token; past the end the stream yields `Eof` indefinitely.
pub struct Lexer {
    lines: Vec<String>,
    next_line: usize,
    queue: VecDeque<Token>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            lines: source.lines().map(|l| l.to_string()).collect(),
            next_line: 0,
            queue: VecDeque::new(),
        }
    }

    /// Line number (1-based) of the most recently scanned line.
    pub fn line(&self) -> usize {
        self.next_line.max(1)
    }

    /// Consumes and returns the next token. Returns `Eof` forever once the
    /// source is exhausted.
    pub fn read(&mut self) -> Result<Token, LexerError> {
        self.fill_queue(1)?;
        Ok(self.queue.pop_front().unwrap_or(Token::Eof))
    }

    /// Returns the token `n` positions ahead without consuming anything.
    pub fn peek(&mut self, n: usize) -> Result<&Token, LexerError> {
        self.fill_queue(n + 1)?;
        Ok(&self.queue[n])
    }

    /// Drains the whole stream, up to and including `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut out = Vec::new();
        loop {
            let token = self.read()?;
            let done = token == Token::Eof;
            out.push(token);
            if done {
                return Ok(out);
            }
        }
    }

    fn fill_queue(&mut self, len: usize) -> Result<(), LexerError> {
        while self.queue.len() < len {
            if self.next_line >= self.lines.len() {
                // Exhausted source pads with Eof, so the stream never runs
                // dry no matter how far `peek` looks or how often `read`
                // pops past the end.
                self.queue.push_back(Token::Eof);
                continue;
            }
            let line = self.lines[self.next_line].clone();
            self.next_line += 1;
            self.scan_line(&line)?;
            self.queue.push_back(Token::Eol);
        }
        Ok(())
    }

    fn scan_line(&mut self, line: &str) -> Result<(), LexerError> {
        let chars: Vec<char> = line.chars().collect();
        let mut pos = 0;

        while pos < chars.len() {
            let ch = chars[pos];

            if ch == ' ' || ch == '\t' || ch == '\r' {
                pos += 1;
                continue;
            }

            // Comment runs to end of line
            if ch == '/' && chars.get(pos + 1) == Some(&'/') {
                break;
            }

            if ch.is_ascii_digit() {
                let start = pos;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
                let text: String = chars[start..pos].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| self.error(format!("number literal out of range: {}", text), start))?;
                self.queue.push_back(Token::Num(value));
                continue;
            }

            if ch.is_ascii_alphabetic() || ch == '_' {
                let start = pos;
                while pos < chars.len()
                    && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_')
                {
                    pos += 1;
                }
                let text: String = chars[start..pos].iter().collect();
                self.queue.push_back(Token::Id(text));
                continue;
            }

            if ch == '"' {
                pos = self.scan_string(&chars, pos)?;
                continue;
            }

            // Operators: two-character spellings win over single characters
            if pos + 1 < chars.len() {
                let two: String = chars[pos..pos + 2].iter().collect();
                if TWO_CHAR_OPS.contains(&two.as_str()) {
                    self.queue.push_back(Token::Id(two));
                    pos += 2;
                    continue;
                }
            }

            if SINGLE_CHAR_OPS.contains(ch) {
                self.queue.push_back(Token::Id(ch.to_string()));
                pos += 1;
                continue;
            }

            return Err(self.error(format!("unexpected character: {:?}", ch), pos));
        }

        Ok(())
    }

    /// Scans a string literal starting at the opening quote; returns the
    /// position just past the closing quote.
    fn scan_string(&mut self, chars: &[char], start: usize) -> Result<usize, LexerError> {
        let mut pos = start + 1;
        let mut text = String::new();

        while pos < chars.len() {
            match chars[pos] {
                '"' => {
                    self.queue.push_back(Token::Str(text));
                    return Ok(pos + 1);
                }
                '\\' => {
                    let escaped = chars.get(pos + 1).copied().ok_or_else(|| {
                        self.error("unexpected end of line in escape sequence".to_string(), pos)
                    })?;
                    match escaped {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        '\\' => text.push('\\'),
                        '"' => text.push('"'),
                        other => {
                            return Err(
                                self.error(format!("unknown escape sequence: \\{}", other), pos)
                            );
                        }
                    }
                    pos += 2;
                }
                ch => {
                    text.push(ch);
                    pos += 1;
                }
            }
        }

        Err(self.error("unterminated string literal".to_string(), start))
    }

    fn error(&self, message: String, col: usize) -> LexerError {
        LexerError {
            message,
            line: self.line(),
            col: col + 1,
        }
    }
}
