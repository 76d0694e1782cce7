use core::fmt;

use types::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(u8),
    Var(String),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// True for leaves that code generation can use without a temporary.
    pub fn is_simple(&self) -> bool {
        !matches!(self, Expr::Binary { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    Print(Expr),
    Let { name: String, value: Expr },
    Wait(u8),
    Repeat { count: Expr, body: Vec<Stmt> },
    Halt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    /// Counts statements including those nested in loop bodies.
    pub fn statement_count(&self) -> usize {
        fn count(stmts: &[Stmt]) -> usize {
            stmts
                .iter()
                .map(|s| match &s.kind {
                    StmtKind::Repeat { body, .. } => 1 + count(body),
                    _ => 1,
                })
                .sum()
        }
        count(&self.statements)
    }

    pub fn ends_with_halt(&self) -> bool {
        matches!(self.statements.last(), Some(Stmt { kind: StmtKind::Halt, .. }))
    }
}
