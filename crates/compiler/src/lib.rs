//! Front-end for the toy language: source text in, executable image out.

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;

pub use ast::{BinOp, Expr, Program, Stmt, StmtKind};
pub use codegen::{generate, CodegenError};
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use parser::{parse, Parser};

use types::{Diagnostics, ExecutableImage, Stage};

/// Everything a compilation produced. `image` is `None` whenever
/// `diagnostics` holds an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub diagnostics: Diagnostics,
    pub image: Option<ExecutableImage>,
}

impl CompileOutput {
    pub fn succeeded(&self) -> bool {
        self.image.is_some()
    }
}

/// Runs lexer, parser and code generator, stopping at the first stage that
/// reports an error.
pub fn compile(source: &str) -> CompileOutput {
    let (tokens, mut diagnostics) = tokenize(source);
    if diagnostics.has_errors() {
        log::debug!("lexing failed with {} error(s)", diagnostics.error_count());
        return CompileOutput { diagnostics, image: None };
    }

    let (program, parse_diags) = parse(tokens);
    diagnostics.extend(parse_diags);
    let Some(program) = program else {
        log::debug!("parsing failed with {} error(s)", diagnostics.error_count());
        return CompileOutput { diagnostics, image: None };
    };

    let image = match generate(&program) {
        Ok(image) => image,
        Err(e) => {
            diagnostics.error(Stage::Loader, e.to_string(), None);
            return CompileOutput { diagnostics, image: None };
        }
    };
    log::debug!(
        "compiled {} word(s), {} data byte(s)",
        image.word_count(),
        image.data_len()
    );
    CompileOutput {
        diagnostics,
        image: Some(image),
    }
}
