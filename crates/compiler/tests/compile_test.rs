use compiler::compile;
use types::{Opcode, Severity, Stage};

#[test]
fn same_source_same_bytes() {
    let source = "
        # nested loops and temporaries
        LET a = 3
        LET b = a * (a + 1)
        REPEAT a
            REPEAT 2
                PRINT b - (a * 2)
            END
            WAIT 1
        END
        HALT
    ";
    let first = compile(source);
    let second = compile(source);
    assert!(first.succeeded(), "{:?}", first.diagnostics);
    assert_eq!(first.image, second.image);
    assert_eq!(
        first.image.as_ref().map(|i| i.to_bytes()),
        second.image.as_ref().map(|i| i.to_bytes())
    );
}

#[test]
fn print_without_operand_yields_one_parser_error() {
    let out = compile("PRINT");
    assert!(out.image.is_none());
    let errors: Vec<_> = out.diagnostics.iter().filter(|d| d.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source, Stage::Parser);
    assert_eq!(errors[0].text, "expected operand");
}

#[test]
fn lexer_errors_stop_before_parsing() {
    let out = compile("PRINT $ PRINT 300 PRINT");
    assert!(out.image.is_none());
    assert_eq!(out.diagnostics.by_stage(Stage::Lexer).count(), 2);
    assert_eq!(out.diagnostics.by_stage(Stage::Parser).count(), 0);
}

#[test]
fn missing_halt_is_appended_with_warning() {
    let out = compile("PRINT 1 PRINT 2");
    let image = out.image.expect("compiles");
    assert_eq!(image.words().last(), Some(Opcode::Halt.encode(0)));
    assert!(out
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Warning && d.text.contains("HALT")));
}

#[test]
fn successful_compile_reports_statement_count() {
    let out = compile("PRINT 1 PRINT 2 HALT");
    let infos: Vec<_> = out
        .diagnostics
        .by_stage(Stage::Parser)
        .filter(|d| d.severity == Severity::Info)
        .map(|d| d.text.as_str())
        .collect();
    assert_eq!(infos, vec!["parsed 3 statement(s)"]);
    assert!(!out.diagnostics.has_errors());
}

#[test]
fn oversized_program_becomes_loader_error() {
    let source = "PRINT 0\n".repeat(11_000);
    let out = compile(&source);
    assert!(out.image.is_none());
    let loader: Vec<_> = out.diagnostics.by_stage(Stage::Loader).collect();
    assert_eq!(loader.len(), 1);
    assert!(loader[0].is_error());
}
