use core::fmt;

use types::{Diagnostics, Position, Stage};

/// Largest value a numeric literal may hold; values are single bytes.
pub const MAX_LITERAL: u32 = u8::MAX as u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Print,
    Let,
    Wait,
    Repeat,
    End,
    Halt,
    Ident(String),
    Number(u8),
    Plus,
    Minus,
    Star,
    Equals,
    LParen,
    RParen,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<TokenKind> {
        match word.to_ascii_uppercase().as_str() {
            "PRINT" => Some(TokenKind::Print),
            "LET" => Some(TokenKind::Let),
            "WAIT" => Some(TokenKind::Wait),
            "REPEAT" => Some(TokenKind::Repeat),
            "END" => Some(TokenKind::End),
            "HALT" => Some(TokenKind::Halt),
            _ => None,
        }
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Print
                | TokenKind::Let
                | TokenKind::Wait
                | TokenKind::Repeat
                | TokenKind::End
                | TokenKind::Halt
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Print => f.write_str("PRINT"),
            TokenKind::Let => f.write_str("LET"),
            TokenKind::Wait => f.write_str("WAIT"),
            TokenKind::Repeat => f.write_str("REPEAT"),
            TokenKind::End => f.write_str("END"),
            TokenKind::Halt => f.write_str("HALT"),
            TokenKind::Ident(name) => f.write_str(name),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::Plus => f.write_str("+"),
            TokenKind::Minus => f.write_str("-"),
            TokenKind::Star => f.write_str("*"),
            TokenKind::Equals => f.write_str("="),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
    /// Length in characters, used to point just past the token.
    pub len: u32,
}

impl Token {
    /// Position of the character right after the token.
    pub fn end(&self) -> Position {
        Position::new(self.pos.line, self.pos.column + self.len)
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '+' | '-' | '*' | '=' | '(' | ')' | '#')
}

/// Turns source text into tokens.
///
/// The lexer never fails. Each malformed lexeme produces a `lexer` error
/// diagnostic; the returned token stream stops at the first one, while
/// scanning continues so later independent errors are still reported.
pub struct Lexer<'a> {
    chars: core::iter::Peekable<core::str::Chars<'a>>,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    diagnostics: Diagnostics,
    truncated: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            tokens: Vec::new(),
            diagnostics: Diagnostics::new(),
            truncated: false,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn take_while(&mut self, first: char, pred: impl Fn(char) -> bool) -> String {
        let mut text = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            text.push(c);
            self.bump();
        }
        text
    }

    fn push(&mut self, kind: TokenKind, pos: Position, len: usize) {
        if !self.truncated {
            self.tokens.push(Token {
                kind,
                pos,
                len: len as u32,
            });
        }
    }

    fn fail(&mut self, pos: Position, text: String) {
        self.diagnostics.error(Stage::Lexer, text, Some(pos));
        self.truncated = true;
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Diagnostics) {
        while let Some(c) = self.bump() {
            let pos = Position::new(self.line, self.column - 1);
            match c {
                c if c.is_whitespace() => {}
                '#' => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '+' => self.push(TokenKind::Plus, pos, 1),
                '-' => self.push(TokenKind::Minus, pos, 1),
                '*' => self.push(TokenKind::Star, pos, 1),
                '=' => self.push(TokenKind::Equals, pos, 1),
                '(' => self.push(TokenKind::LParen, pos, 1),
                ')' => self.push(TokenKind::RParen, pos, 1),
                c if c.is_ascii_digit() => {
                    let text = self.take_while(c, |c| c.is_ascii_alphanumeric() || c == '_');
                    match text.parse::<u32>() {
                        Ok(n) if n <= MAX_LITERAL => {
                            self.push(TokenKind::Number(n as u8), pos, text.len())
                        }
                        Ok(_) => self.fail(
                            pos,
                            format!("integer literal `{}` is out of range 0..={}", text, MAX_LITERAL),
                        ),
                        Err(_) if text.bytes().all(|b| b.is_ascii_digit()) => self.fail(
                            pos,
                            format!("integer literal `{}` is out of range 0..={}", text, MAX_LITERAL),
                        ),
                        Err(_) => self.fail(pos, format!("malformed number `{}`", text)),
                    }
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let text = self.take_while(c, |c| c.is_ascii_alphanumeric() || c == '_');
                    let len = text.len();
                    let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Ident(text));
                    self.push(kind, pos, len);
                }
                other => {
                    self.take_while(other, |c| !is_delimiter(c));
                    self.fail(pos, format!("unexpected character `{}`", other));
                }
            }
        }
        (self.tokens, self.diagnostics)
    }
}

/// Convenience wrapper around [`Lexer`].
pub fn tokenize(source: &str) -> (Vec<Token>, Diagnostics) {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diags) = tokenize(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("print Let wAiT repeat END halt"),
            vec![
                TokenKind::Print,
                TokenKind::Let,
                TokenKind::Wait,
                TokenKind::Repeat,
                TokenKind::End,
                TokenKind::Halt
            ]
        );
    }

    #[test]
    fn identifiers_keep_their_case() {
        assert_eq!(
            kinds("LET Count=count_2"),
            vec![
                TokenKind::Let,
                TokenKind::Ident("Count".into()),
                TokenKind::Equals,
                TokenKind::Ident("count_2".into()),
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("PRINT 1 # PRINT 2\nHALT"),
            vec![TokenKind::Print, TokenKind::Number(1), TokenKind::Halt]
        );
    }

    #[test]
    fn positions_are_one_based() {
        let (tokens, _) = tokenize("PRINT\n  (7)");
        assert_eq!(tokens[0].pos, Position::new(1, 1));
        assert_eq!(tokens[0].end(), Position::new(1, 6));
        assert_eq!(tokens[1].pos, Position::new(2, 3));
        assert_eq!(tokens[2].pos, Position::new(2, 4));
    }

    #[test]
    fn literal_bounds() {
        assert_eq!(kinds("255"), vec![TokenKind::Number(255)]);
        let (tokens, diags) = tokenize("256");
        assert!(tokens.is_empty());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn stream_is_truncated_but_scanning_continues() {
        let (tokens, diags) = tokenize("PRINT 1 $x PRINT 2 @ PRINT 999");
        assert_eq!(
            tokens.into_iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Print, TokenKind::Number(1)]
        );
        let texts: Vec<_> = diags.iter().map(|d| d.text.clone()).collect();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("`$`"));
        assert!(texts[1].contains("`@`"));
        assert!(texts[2].contains("999"));
        assert!(diags.iter().all(|d| d.source == Stage::Lexer));
    }
}
