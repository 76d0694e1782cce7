use std::collections::HashMap;

use thiserror::Error;
use types::{ExecutableImage, ImageFormatError, Opcode, WORD_BYTES};

use crate::ast::{BinOp, Expr, Program, Stmt, StmtKind};

/// Largest segment an image may describe: operands are 16-bit.
pub const MAX_SEGMENT: usize = u16::MAX as usize + 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodegenError {
    #[error("no data slot for variable `{0}`")]
    UnknownVariable(String),

    #[error("image needs {0} bytes, more than the 16-bit address space")]
    ImageTooLarge(usize),

    #[error(transparent)]
    Image(#[from] ImageFormatError),
}

/// Operand of an instruction before addresses are known.
#[derive(Debug, Clone, Copy)]
enum Operand {
    None,
    Imm(u16),
    /// Index into the data area, placed after the code.
    Data(usize),
    /// Index of the target instruction.
    Label(usize),
}

/// Data area layout: variables, then expression temporaries, then loop
/// counters.
struct Layout {
    vars: HashMap<String, usize>,
    var_count: usize,
    temp_count: usize,
    counter_count: usize,
}

impl Layout {
    fn of(program: &Program) -> Self {
        let mut layout = Layout {
            vars: HashMap::new(),
            var_count: 0,
            temp_count: 0,
            counter_count: 0,
        };
        layout.scan(&program.statements, 0);
        layout
    }

    fn scan(&mut self, stmts: &[Stmt], loop_depth: usize) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Print(e) => self.note_expr(e),
                StmtKind::Let { name, value } => {
                    self.note_expr(value);
                    if !self.vars.contains_key(name) {
                        self.vars.insert(name.clone(), self.var_count);
                        self.var_count += 1;
                    }
                }
                StmtKind::Repeat { count, body } => {
                    self.note_expr(count);
                    self.counter_count = self.counter_count.max(loop_depth + 1);
                    self.scan(body, loop_depth + 1);
                }
                StmtKind::Wait(_) | StmtKind::Halt => {}
            }
        }
    }

    fn note_expr(&mut self, expr: &Expr) {
        self.temp_count = self.temp_count.max(temps_needed(expr));
    }

    fn var(&self, name: &str) -> Result<usize, CodegenError> {
        self.vars
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnknownVariable(name.to_string()))
    }

    fn temp(&self, depth: usize) -> usize {
        self.var_count + depth
    }

    fn counter(&self, depth: usize) -> usize {
        self.var_count + self.temp_count + depth
    }

    fn data_len(&self) -> usize {
        self.var_count + self.temp_count + self.counter_count
    }
}

/// Temporaries used by [`Generator::expr`] for `expr`.
fn temps_needed(expr: &Expr) -> usize {
    match expr {
        Expr::Number(_) | Expr::Var(_) => 0,
        Expr::Binary { lhs, rhs, .. } if rhs.is_simple() => temps_needed(lhs),
        Expr::Binary { lhs, rhs, .. } => temps_needed(rhs).max(1 + temps_needed(lhs)),
    }
}

/// Translates a parsed [`Program`] into an [`ExecutableImage`].
///
/// EDUCATIONAL PURPOSE: the target is an accumulator machine, so every
/// expression is evaluated into `acc`. Literal and variable right-hand sides
/// use the immediate or memory forms directly (`ADDI 2`, `MUL x`); a compound
/// right-hand side is evaluated first and parked in a temporary slot.
///
/// LOOPS: `REPEAT n ... END` keeps its counter in a data slot chosen by
/// nesting depth and compiles to
/// ```text
///         <n>; STORE cnt
/// top:    LOAD cnt; JZ end
///         <body>
///         LOAD cnt; SUBI 1; STORE cnt; JMP top
/// end:
/// ```
///
/// Generation is deterministic: the same program always yields the same bytes.
pub struct Generator {
    layout: Layout,
    code: Vec<(Opcode, Operand)>,
}

impl Generator {
    fn new(program: &Program) -> Self {
        Self {
            layout: Layout::of(program),
            code: Vec::new(),
        }
    }

    fn emit(&mut self, op: Opcode, operand: Operand) -> usize {
        self.code.push((op, operand));
        self.code.len() - 1
    }

    fn expr(&mut self, expr: &Expr, depth: usize) -> Result<(), CodegenError> {
        match expr {
            Expr::Number(n) => {
                self.emit(Opcode::LoadI, Operand::Imm(*n as u16));
            }
            Expr::Var(name) => {
                let slot = self.layout.var(name)?;
                self.emit(Opcode::Load, Operand::Data(slot));
            }
            Expr::Binary { op, lhs, rhs } => match rhs.as_ref() {
                Expr::Number(n) => {
                    self.expr(lhs, depth)?;
                    self.emit(immediate_form(*op), Operand::Imm(*n as u16));
                }
                Expr::Var(name) => {
                    self.expr(lhs, depth)?;
                    let slot = self.layout.var(name)?;
                    self.emit(memory_form(*op), Operand::Data(slot));
                }
                compound => {
                    let tmp = self.layout.temp(depth);
                    self.expr(compound, depth)?;
                    self.emit(Opcode::Store, Operand::Data(tmp));
                    self.expr(lhs, depth + 1)?;
                    self.emit(memory_form(*op), Operand::Data(tmp));
                }
            },
        }
        Ok(())
    }

    fn block(&mut self, stmts: &[Stmt], loop_depth: usize) -> Result<(), CodegenError> {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Print(e) => {
                    self.expr(e, 0)?;
                    self.emit(Opcode::Print, Operand::None);
                }
                StmtKind::Let { name, value } => {
                    self.expr(value, 0)?;
                    let slot = self.layout.var(name)?;
                    self.emit(Opcode::Store, Operand::Data(slot));
                }
                StmtKind::Wait(ticks) => {
                    self.emit(Opcode::Wait, Operand::Imm(*ticks as u16));
                }
                StmtKind::Halt => {
                    self.emit(Opcode::Halt, Operand::None);
                }
                StmtKind::Repeat { count, body } => {
                    let counter = Operand::Data(self.layout.counter(loop_depth));
                    self.expr(count, 0)?;
                    self.emit(Opcode::Store, counter);
                    let top = self.emit(Opcode::Load, counter);
                    let exit = self.emit(Opcode::Jz, Operand::None);
                    self.block(body, loop_depth + 1)?;
                    self.emit(Opcode::Load, counter);
                    self.emit(Opcode::SubI, Operand::Imm(1));
                    self.emit(Opcode::Store, counter);
                    self.emit(Opcode::Jmp, Operand::Label(top));
                    let end = self.code.len();
                    self.code[exit].1 = Operand::Label(end);
                }
            }
        }
        Ok(())
    }

    /// Resolves labels and data slots into segment-relative addresses.
    fn finish(self) -> Result<ExecutableImage, CodegenError> {
        let code_len = self.code.len() * WORD_BYTES;
        let data_len = self.layout.data_len();
        let total = code_len + data_len;
        if total > MAX_SEGMENT {
            return Err(CodegenError::ImageTooLarge(total));
        }

        let mut bytes = Vec::with_capacity(code_len);
        for (op, operand) in &self.code {
            let value = match *operand {
                Operand::None => 0,
                Operand::Imm(v) => v as usize,
                Operand::Data(slot) => code_len + slot,
                Operand::Label(idx) => idx * WORD_BYTES,
            };
            // total <= MAX_SEGMENT, so every address fits
            bytes.extend_from_slice(&op.encode(value as u16));
        }
        Ok(ExecutableImage::new(bytes, data_len as u16)?)
    }
}

fn immediate_form(op: BinOp) -> Opcode {
    match op {
        BinOp::Add => Opcode::AddI,
        BinOp::Sub => Opcode::SubI,
        BinOp::Mul => Opcode::MulI,
    }
}

fn memory_form(op: BinOp) -> Opcode {
    match op {
        BinOp::Add => Opcode::Add,
        BinOp::Sub => Opcode::Sub,
        BinOp::Mul => Opcode::Mul,
    }
}

/// Generates the image for a program the parser accepted. A final `HALT` is
/// appended when the program does not end with one.
pub fn generate(program: &Program) -> Result<ExecutableImage, CodegenError> {
    let mut gen = Generator::new(program);
    gen.block(&program.statements, 0)?;
    if !program.ends_with_halt() {
        gen.emit(Opcode::Halt, Operand::None);
    }
    gen.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::Position;

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt {
            kind,
            pos: Position::new(1, 1),
        }
    }

    fn words(image: &ExecutableImage) -> Vec<[u8; 3]> {
        image.words().collect()
    }

    #[test]
    fn print_literal_then_halt() {
        let program = Program {
            statements: vec![stmt(StmtKind::Print(Expr::Number(1)))],
        };
        let image = generate(&program).unwrap();
        assert_eq!(
            words(&image),
            vec![
                Opcode::LoadI.encode(1),
                Opcode::Print.encode(0),
                Opcode::Halt.encode(0)
            ]
        );
        assert_eq!(image.data_len(), 0);
    }

    #[test]
    fn compound_rhs_goes_through_temporary() {
        // LET a = 2; PRINT a - (a * 3)
        let program = Program {
            statements: vec![
                stmt(StmtKind::Let {
                    name: "a".into(),
                    value: Expr::Number(2),
                }),
                stmt(StmtKind::Print(Expr::binary(
                    BinOp::Sub,
                    Expr::Var("a".into()),
                    Expr::binary(BinOp::Mul, Expr::Var("a".into()), Expr::Number(3)),
                ))),
                stmt(StmtKind::Halt),
            ],
        };
        let image = generate(&program).unwrap();
        // 9 words = 27 bytes of code; a at 27, tmp0 at 28
        assert_eq!(image.data_len(), 2);
        assert_eq!(
            words(&image),
            vec![
                Opcode::LoadI.encode(2),
                Opcode::Store.encode(27),
                Opcode::Load.encode(27),
                Opcode::MulI.encode(3),
                Opcode::Store.encode(28),
                Opcode::Load.encode(27),
                Opcode::Sub.encode(28),
                Opcode::Print.encode(0),
                Opcode::Halt.encode(0),
            ]
        );
    }

    #[test]
    fn repeat_uses_counter_slot_and_back_jump() {
        let program = Program {
            statements: vec![
                stmt(StmtKind::Repeat {
                    count: Expr::Number(2),
                    body: vec![stmt(StmtKind::Wait(1))],
                }),
                stmt(StmtKind::Halt),
            ],
        };
        let image = generate(&program).unwrap();
        // 10 words = 30 bytes; counter at 30
        assert_eq!(
            words(&image),
            vec![
                Opcode::LoadI.encode(2),
                Opcode::Store.encode(30),
                Opcode::Load.encode(30),
                Opcode::Jz.encode(27),
                Opcode::Wait.encode(1),
                Opcode::Load.encode(30),
                Opcode::SubI.encode(1),
                Opcode::Store.encode(30),
                Opcode::Jmp.encode(6),
                Opcode::Halt.encode(0),
            ]
        );
        assert_eq!(image.data_len(), 1);
    }

    #[test]
    fn unknown_variable_is_an_internal_error() {
        let program = Program {
            statements: vec![stmt(StmtKind::Print(Expr::Var("ghost".into())))],
        };
        assert_eq!(
            generate(&program),
            Err(CodegenError::UnknownVariable("ghost".into()))
        );
    }

    #[test]
    fn oversized_image_is_rejected() {
        let program = Program {
            statements: vec![stmt(StmtKind::Print(Expr::Number(0))); 22_000],
        };
        assert!(matches!(
            generate(&program),
            Err(CodegenError::ImageTooLarge(_))
        ));
    }

    #[test]
    fn temporaries_for_nested_rhs() {
        let leaf = || Expr::Number(1);
        let nested = Expr::binary(
            BinOp::Add,
            leaf(),
            Expr::binary(BinOp::Add, leaf(), Expr::binary(BinOp::Mul, leaf(), leaf())),
        );
        assert_eq!(temps_needed(&nested), 1);
        let deep = Expr::binary(
            BinOp::Add,
            Expr::binary(BinOp::Add, leaf(), Expr::binary(BinOp::Mul, leaf(), leaf())),
            Expr::binary(BinOp::Mul, leaf(), leaf()),
        );
        assert_eq!(temps_needed(&deep), 2);
    }
}
