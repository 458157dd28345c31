use crate::frontend::lexer::Lexer;
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::Token;
use crate::lang::node::{
    ClassDefExpr, DefExpr, IfExpr, NameRef, Node, PostfixExpr, Segment, WhileExpr,
};

/// Recursive-descent / precedence-climbing parser for Slate.
///
/// The parser drives the lexer's `peek`/`read` stream directly and produces
/// a list of top-level statement nodes. Statements are separated by
/// newlines or `;`. Expression grammar, loosest binding first:
///
/// - `=` (right associative)
/// - `== != < > <= >=`
/// - `+ -`
/// - `* / %`
/// - unary `-`, then postfix chains `a.b(c)[d]`
pub struct Parser {
    lexer: Lexer,
}

/// Binding power and associativity for a binary operator spelling.
fn binop_prec(op: &str) -> Option<(u8, bool)> {
    match op {
        "=" => Some((1, true)),
        "==" | "!=" | "<" | ">" | "<=" | ">=" => Some((2, false)),
        "+" | "-" => Some((3, false)),
        "*" | "/" | "%" => Some((4, false)),
        _ => None,
    }
}

/// Identifier spellings that introduce statements and cannot name values.
const KEYWORDS: [&str; 5] = ["if", "else", "while", "def", "class"];

fn is_plain_name(token: &Token) -> Option<&str> {
    match token {
        Token::Id(s)
            if s.chars()
                .next()
                .map(|c| c.is_ascii_alphabetic() || c == '_')
                .unwrap_or(false)
                && !KEYWORDS.contains(&s.as_str()) =>
        {
            Some(s)
        }
        _ => None,
    }
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        Parser { lexer }
    }

    pub fn from_source(source: &str) -> Self {
        Parser::new(Lexer::new(source))
    }

    /// Parses the whole program: a list of top-level statements.
    pub fn parse(&mut self) -> Result<Vec<Node>, ParserError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators()?;
            if self.at_eof()? {
                return Ok(stmts);
            }
            stmts.push(self.statement()?);
            self.expect_separator()?;
        }
    }

    fn statement(&mut self) -> Result<Node, ParserError> {
        if self.peek_is("if")? {
            return self.if_statement();
        }
        if self.peek_is("while")? {
            return self.while_statement();
        }
        if self.peek_is("def")? {
            return self.def_statement();
        }
        if self.peek_is("class")? {
            return self.class_statement();
        }
        self.expression()
    }

    fn if_statement(&mut self) -> Result<Node, ParserError> {
        self.read()?; // "if"
        let cond = self.expression()?;
        let then = self.block()?;
        let els = if self.peek_is("else")? {
            self.read()?;
            Some(Box::new(self.block()?))
        } else {
            None
        };
        Ok(Node::If(IfExpr {
            cond: Box::new(cond),
            then: Box::new(then),
            els,
        }))
    }

    fn while_statement(&mut self) -> Result<Node, ParserError> {
        self.read()?; // "while"
        let cond = self.expression()?;
        let body = self.block()?;
        Ok(Node::While(WhileExpr {
            cond: Box::new(cond),
            body: Box::new(body),
        }))
    }

    fn def_statement(&mut self) -> Result<Node, ParserError> {
        self.read()?; // "def"
        let name = self.name("function name")?;
        self.expect("(")?;
        let mut params = Vec::new();
        if !self.peek_is(")")? {
            loop {
                params.push(self.name("parameter name")?);
                if self.peek_is(",")? {
                    self.read()?;
                } else {
                    break;
                }
            }
        }
        self.expect(")")?;
        let body = self.block()?;
        Ok(Node::Def(DefExpr {
            name: NameRef::new(name),
            params,
            body: Box::new(body),
            frame_size: -1,
        }))
    }

    fn class_statement(&mut self) -> Result<Node, ParserError> {
        self.read()?; // "class"
        let name = self.name("class name")?;
        let parent = if self.peek_is("extends")? {
            self.read()?;
            Some(NameRef::new(self.name("parent class name")?))
        } else {
            None
        };
        self.expect("{")?;
        let mut members = Vec::new();
        loop {
            self.skip_separators()?;
            if self.peek_is("}")? {
                break;
            }
            if self.at_eof()? {
                return Err(self.error("unexpected end of input in class body"));
            }
            members.push(self.statement()?);
            if !self.peek_is("}")? {
                self.expect_separator()?;
            }
        }
        self.expect("}")?;
        Ok(Node::Class(ClassDefExpr {
            name,
            parent,
            members,
        }))
    }

    fn block(&mut self) -> Result<Node, ParserError> {
        self.expect("{")?;
        let mut stmts = Vec::new();
        loop {
            self.skip_separators()?;
            if self.peek_is("}")? {
                break;
            }
            if self.at_eof()? {
                return Err(self.error("unexpected end of input in block"));
            }
            stmts.push(self.statement()?);
            if !self.peek_is("}")? {
                self.expect_separator()?;
            }
        }
        self.expect("}")?;
        Ok(Node::Block(stmts))
    }

    fn expression(&mut self) -> Result<Node, ParserError> {
        let left = self.unary()?;
        self.binary_rhs(left, 0)
    }

    /// Precedence climbing over `unary` operands.
    fn binary_rhs(&mut self, mut left: Node, min_prec: u8) -> Result<Node, ParserError> {
        while let Some((prec, _)) = self.peek_binop()? {
            if prec < min_prec {
                break;
            }
            let op = match self.read()? {
                Token::Id(s) => s,
                _ => unreachable!("peek_binop only matches Id tokens"),
            };
            let mut right = self.unary()?;
            while let Some((next_prec, right_assoc)) = self.peek_binop()? {
                if next_prec > prec || (right_assoc && next_prec == prec) {
                    let min = if next_prec > prec { prec + 1 } else { prec };
                    right = self.binary_rhs(right, min)?;
                } else {
                    break;
                }
            }
            left = Node::binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Node, ParserError> {
        if self.peek_is("-")? {
            self.read()?;
            let operand = self.unary()?;
            return Ok(Node::Negate(Box::new(operand)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Node, ParserError> {
        let head = self.primary()?;
        let mut segments = Vec::new();
        loop {
            if self.peek_is("(")? {
                self.read()?;
                let mut args = Vec::new();
                if !self.peek_is(")")? {
                    loop {
                        args.push(self.expression()?);
                        if self.peek_is(",")? {
                            self.read()?;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(")")?;
                segments.push(Segment::Call(args));
            } else if self.peek_is("[")? {
                self.read()?;
                let index = self.expression()?;
                self.expect("]")?;
                segments.push(Segment::Index(Box::new(index)));
            } else if self.peek_is(".")? {
                self.read()?;
                let attr = self.name("attribute name")?;
                segments.push(Segment::Attr(attr));
            } else {
                break;
            }
        }
        if segments.is_empty() {
            Ok(head)
        } else {
            Ok(Node::Postfix(PostfixExpr {
                head: Box::new(head),
                segments,
            }))
        }
    }

    fn primary(&mut self) -> Result<Node, ParserError> {
        if self.peek_is("(")? {
            self.read()?;
            let inner = self.expression()?;
            self.expect(")")?;
            return Ok(inner);
        }
        if self.peek_is("[")? {
            self.read()?;
            let mut elems = Vec::new();
            if !self.peek_is("]")? {
                loop {
                    elems.push(self.expression()?);
                    if self.peek_is(",")? {
                        self.read()?;
                    } else {
                        break;
                    }
                }
            }
            self.expect("]")?;
            return Ok(Node::Array(elems));
        }
        match self.lexer.peek(0)? {
            Token::Num(_) => match self.read()? {
                Token::Num(n) => Ok(Node::Number(n)),
                _ => unreachable!(),
            },
            Token::Str(_) => match self.read()? {
                Token::Str(s) => Ok(Node::Str(s)),
                _ => unreachable!(),
            },
            token => {
                if is_plain_name(token).is_some() {
                    match self.read()? {
                        Token::Id(s) => Ok(Node::name(s)),
                        _ => unreachable!(),
                    }
                } else {
                    let found = token.clone();
                    Err(self.error(&format!("expected an expression, found '{}'", found)))
                }
            }
        }
    }

    // Token stream helpers

    fn read(&mut self) -> Result<Token, ParserError> {
        Ok(self.lexer.read()?)
    }

    fn peek_is(&mut self, text: &str) -> Result<bool, ParserError> {
        Ok(self.lexer.peek(0)?.is_id(text))
    }

    fn peek_binop(&mut self) -> Result<Option<(u8, bool)>, ParserError> {
        match self.lexer.peek(0)? {
            Token::Id(s) => Ok(binop_prec(s)),
            _ => Ok(None),
        }
    }

    fn at_eof(&mut self) -> Result<bool, ParserError> {
        Ok(matches!(self.lexer.peek(0)?, Token::Eof))
    }

    fn name(&mut self, what: &str) -> Result<String, ParserError> {
        let token = self.lexer.peek(0)?;
        if is_plain_name(token).is_some() {
            match self.read()? {
                Token::Id(s) => Ok(s),
                _ => unreachable!(),
            }
        } else {
            let found = token.clone();
            Err(self.error(&format!("expected {}, found '{}'", what, found)))
        }
    }

    fn expect(&mut self, text: &str) -> Result<(), ParserError> {
        if self.peek_is(text)? {
            self.read()?;
            Ok(())
        } else {
            let found = self.lexer.peek(0)?.clone();
            Err(self.error(&format!("expected '{}', found '{}'", text, found)))
        }
    }

    /// A statement must end at a newline, a `;`, or the end of input.
    fn expect_separator(&mut self) -> Result<(), ParserError> {
        match self.lexer.peek(0)? {
            Token::Eol | Token::Eof => Ok(()),
            t if t.is_id(";") => Ok(()),
            t => {
                let found = t.clone();
                Err(self.error(&format!("expected end of statement, found '{}'", found)))
            }
        }
    }

    fn skip_separators(&mut self) -> Result<(), ParserError> {
        loop {
            match self.lexer.peek(0)? {
                Token::Eol => {
                    self.read()?;
                }
                t if t.is_id(";") => {
                    self.read()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn error(&self, message: &str) -> ParserError {
        ParserError::new(message, self.lexer.line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Node> {
        Parser::from_source(source).parse().unwrap()
    }

    fn render_first(source: &str) -> String {
        parse(source)[0].to_string()
    }

    #[test]
    fn test_mul_binds_tighter_than_add() {
        assert_eq!(render_first("1 + 2 * 3"), "( 1 + ( 2 * 3 ) )");
        assert_eq!(render_first("1 * 2 + 3"), "( ( 1 * 2 ) + 3 )");
    }

    #[test]
    fn test_parens_override_precedence() {
        assert_eq!(render_first("(1 + 2) * 3"), "( ( 1 + 2 ) * 3 )");
    }

    #[test]
    fn test_comparison_precedence() {
        assert_eq!(render_first("i % 2 == 0"), "( ( i % 2 ) == 0 )");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(
            render_first("a = b = c = x + y"),
            "( a = ( b = ( c = ( x + y ) ) ) )"
        );
    }

    #[test]
    fn test_left_associative_chain() {
        assert_eq!(render_first("1 - 2 - 3"), "( ( 1 - 2 ) - 3 )");
    }

    #[test]
    fn test_unary_negation() {
        assert_eq!(render_first("-x * 2"), "( ( - x ) * 2 )");
    }

    #[test]
    fn test_render_is_stable_under_reparse() {
        // The rendered s-expression is itself valid source; re-parsing it
        // must reproduce the same rendering.
        for source in ["1 + 2 * 3", "a = b = c", "(1 + 2) * (3 - 4)"] {
            let rendered = render_first(source);
            assert_eq!(render_first(&rendered), rendered);
        }
    }

    #[test]
    fn test_if_else_render() {
        assert_eq!(
            render_first("if a < 2 { a } else { b }"),
            "( if ( a < 2 ) ( a ) else ( b ) )"
        );
    }

    #[test]
    fn test_while_render() {
        assert_eq!(
            render_first("while a > 0 { a = a - 1 }"),
            "( while ( a > 0 ) ( ( a = ( a - 1 ) ) ) )"
        );
    }

    #[test]
    fn test_def_render() {
        assert_eq!(
            render_first("def add(a, b) { a + b }"),
            "( def add ( a b ) ( ( a + b ) ) )"
        );
    }

    #[test]
    fn test_class_render() {
        assert_eq!(
            render_first("class Point { x = 0 }"),
            "( class Point ( ( x = 0 ) ) )"
        );
        assert_eq!(
            render_first("class Dot extends Point { }"),
            "( class Dot extends Point ( ) )"
        );
    }

    #[test]
    fn test_postfix_chain() {
        assert_eq!(render_first("a.b(c)[d]"), "( a . b ( c ) [ d ] )");
        assert_eq!(render_first("f()"), "( f ( ) )");
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(render_first("[1, 2, x]"), "( array 1 2 x )");
        assert_eq!(render_first("[]"), "( array )");
    }

    #[test]
    fn test_statements_split_on_semicolon_and_newline() {
        let stmts = parse("a = 1; b = 2\nc = 3");
        assert_eq!(stmts.len(), 3);
    }

    #[test]
    fn test_multiline_block() {
        let stmts = parse("while a > 0 {\n  a = a - 1\n  b = b + 1\n}");
        assert_eq!(stmts.len(), 1);
        assert_eq!(
            stmts[0].to_string(),
            "( while ( a > 0 ) ( ( a = ( a - 1 ) ) ( b = ( b + 1 ) ) ) )"
        );
    }

    #[test]
    fn test_missing_brace_is_an_error() {
        let err = Parser::from_source("while a > 0 { a = a - 1")
            .parse()
            .unwrap_err();
        assert!(err.to_string().contains("unexpected end of input"));
    }

    #[test]
    fn test_params_must_be_identifiers() {
        let err = Parser::from_source("def f(1) { }").parse().unwrap_err();
        assert!(err.to_string().contains("parameter name"));
    }

    #[test]
    fn test_two_statements_on_one_line_rejected() {
        let err = Parser::from_source("a = 1 b = 2").parse().unwrap_err();
        assert!(err.to_string().contains("end of statement"));
    }
}
