use std::collections::HashSet;

use types::{Diagnostics, Position, Stage};

use crate::ast::{BinOp, Expr, Program, Stmt, StmtKind};
use crate::lexer::{Token, TokenKind};

/// Recursive-descent parser with statement-level error recovery.
///
/// EDUCATIONAL PURPOSE: besides building the AST, the parser is where the
/// front-end checks meaning:
/// - a variable must be assigned with `LET` before it is read
/// - `END` must close a `REPEAT`, and every `REPEAT` needs its `END`
/// - `WAIT` takes a literal tick count
///
/// RECOVERY: after an error the offending token is skipped and parsing
/// resumes at the next statement keyword, so one typo yields one diagnostic
/// instead of a cascade. Keywords are never swallowed as operands.
pub struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    diagnostics: Diagnostics,
    /// Program-level warnings, emitted only if parsing produced no errors.
    warnings: Vec<(String, Position)>,
    defined: HashSet<String>,
    read: HashSet<String>,
    /// Variables in first-assignment order, with the position of that `LET`.
    assigned: Vec<(String, Position)>,
}

/// Marker for an error that has already been reported.
struct Reported;

type PResult<T> = Result<T, Reported>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            cursor: 0,
            diagnostics: Diagnostics::new(),
            warnings: Vec::new(),
            defined: HashSet::new(),
            read: HashSet::new(),
            assigned: Vec::new(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    /// Where the current token starts, or just past the last token at EOF.
    fn here(&self) -> Position {
        match self.peek() {
            Some(t) => t.pos,
            None => self
                .tokens
                .last()
                .map(Token::end)
                .unwrap_or(Position::new(1, 1)),
        }
    }

    fn error(&mut self, pos: Position, text: impl Into<String>) -> Reported {
        self.diagnostics.error(Stage::Parser, text, Some(pos));
        Reported
    }

    /// Skips the offending token (unless it is a keyword) and everything up
    /// to the next keyword.
    fn synchronize(&mut self) {
        if matches!(self.peek_kind(), Some(k) if !k.is_keyword()) {
            self.cursor += 1;
        }
        while matches!(self.peek_kind(), Some(k) if !k.is_keyword()) {
            self.cursor += 1;
        }
    }

    pub fn parse(mut self) -> (Option<Program>, Diagnostics) {
        let mut statements = Vec::new();
        while let Some(token) = self.peek().cloned() {
            if token.kind == TokenKind::End {
                self.error(token.pos, "END without matching REPEAT");
                self.cursor += 1;
                continue;
            }
            match self.statement() {
                Ok(stmt) => statements.push(stmt),
                Err(Reported) => self.synchronize(),
            }
        }
        self.check_reachability(&statements);
        let program = Program { statements };

        if self.diagnostics.has_errors() {
            return (None, self.diagnostics);
        }

        for (text, pos) in std::mem::take(&mut self.warnings) {
            self.diagnostics.warning(Stage::Parser, text, Some(pos));
        }
        if !program.ends_with_halt() {
            let pos = self.here();
            self.diagnostics.warning(
                Stage::Parser,
                "program does not end with HALT; one is appended",
                Some(pos),
            );
        }
        for (name, pos) in &self.assigned {
            if !self.read.contains(name) {
                self.diagnostics.warning(
                    Stage::Parser,
                    format!("variable `{}` is assigned but never read", name),
                    Some(*pos),
                );
            }
        }
        self.diagnostics.info(
            Stage::Parser,
            format!("parsed {} statement(s)", program.statement_count()),
            None,
        );
        (Some(program), self.diagnostics)
    }

    fn statement(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        let Some(token) = self.advance() else {
            return Err(self.error(pos, "expected a statement"));
        };
        let kind = match token.kind {
            TokenKind::Print => StmtKind::Print(self.expr()?),
            TokenKind::Let => self.let_statement()?,
            TokenKind::Wait => self.wait_statement()?,
            TokenKind::Repeat => self.repeat_statement(pos)?,
            TokenKind::Halt => StmtKind::Halt,
            other => {
                // step back so synchronize() skips this token
                self.cursor -= 1;
                return Err(self.error(pos, format!("expected a statement, found `{}`", other)));
            }
        };
        Ok(Stmt { kind, pos })
    }

    fn let_statement(&mut self) -> PResult<StmtKind> {
        let pos = self.here();
        let name = match self.peek_kind() {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => return Err(self.error(pos, "expected a variable name after LET")),
        };
        self.cursor += 1;
        if self.peek_kind() != Some(&TokenKind::Equals) {
            let at = self.here();
            return Err(self.error(at, format!("expected `=` after `{}`", name)));
        }
        self.cursor += 1;
        let value = self.expr()?;
        if self.defined.insert(name.clone()) {
            self.assigned.push((name.clone(), pos));
        }
        Ok(StmtKind::Let { name, value })
    }

    fn wait_statement(&mut self) -> PResult<StmtKind> {
        let pos = self.here();
        match self.peek_kind() {
            Some(TokenKind::Number(n)) => {
                let n = *n;
                self.cursor += 1;
                Ok(StmtKind::Wait(n))
            }
            Some(k) if !k.is_keyword() => {
                Err(self.error(pos, "WAIT operand must be a number literal"))
            }
            _ => Err(self.error(pos, "expected operand")),
        }
    }

    fn repeat_statement(&mut self, pos: Position) -> PResult<StmtKind> {
        let count = self.expr()?;
        let mut body = Vec::new();
        loop {
            match self.peek_kind() {
                None => return Err(self.error(pos, "REPEAT is missing its END")),
                Some(TokenKind::End) => {
                    self.cursor += 1;
                    break;
                }
                Some(_) => match self.statement() {
                    Ok(stmt) => body.push(stmt),
                    Err(Reported) => self.synchronize(),
                },
            }
        }
        Ok(StmtKind::Repeat { count, body })
    }

    fn expr(&mut self) -> PResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.cursor += 1;
            let rhs = self.term()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut lhs = self.factor()?;
        while self.peek_kind() == Some(&TokenKind::Star) {
            self.cursor += 1;
            let rhs = self.factor()?;
            lhs = Expr::binary(BinOp::Mul, lhs, rhs);
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> PResult<Expr> {
        let pos = self.here();
        match self.peek_kind().cloned() {
            Some(TokenKind::Number(n)) => {
                self.cursor += 1;
                Ok(Expr::Number(n))
            }
            Some(TokenKind::Ident(name)) => {
                self.cursor += 1;
                if !self.defined.contains(&name) {
                    return Err(self.error(pos, format!("undefined variable `{}`", name)));
                }
                self.read.insert(name.clone());
                Ok(Expr::Var(name))
            }
            Some(TokenKind::LParen) => {
                self.cursor += 1;
                let inner = self.expr()?;
                if self.peek_kind() != Some(&TokenKind::RParen) {
                    let at = self.here();
                    return Err(self.error(at, "expected `)`"));
                }
                self.cursor += 1;
                Ok(inner)
            }
            // keywords and EOF are left for the statement loop
            _ => Err(self.error(pos, "expected operand")),
        }
    }

    /// Queues a warning for the first statement after a `HALT` in each block.
    fn check_reachability(&mut self, stmts: &[Stmt]) {
        let mut halted = false;
        for stmt in stmts {
            if halted {
                self.warnings
                    .push(("unreachable statement after HALT".to_string(), stmt.pos));
                break;
            }
            match &stmt.kind {
                StmtKind::Halt => halted = true,
                StmtKind::Repeat { body, .. } => self.check_reachability(body),
                _ => {}
            }
        }
    }
}

/// Parses a token stream produced by [`crate::lexer::tokenize`].
pub fn parse(tokens: Vec<Token>) -> (Option<Program>, Diagnostics) {
    Parser::new(tokens).parse()
}
