//! End-to-end tests for the preprocess pipeline: comment scan, directive
//! blocks, branch resolution, output assembly.
//!
//! Byte-exactness note: directive comment spans end before the line
//! terminator, so the newline following a removed marker survives in the
//! output, exactly as the slice arithmetic dictates.

use jspp_common::diagnostics::codes;
use jspp_parser::{DirectiveKind, PreprocessError, Preprocessor, PreprocessorOptions};
use serde_json::json;

fn engine(vars: &[(&str, serde_json::Value)]) -> Preprocessor {
    let mut options = PreprocessorOptions::default();
    for (name, value) in vars {
        options.variables.insert((*name).to_string(), value.clone());
    }
    Preprocessor::new(options)
}

fn default_engine() -> Preprocessor {
    engine(&[("DEBUG", json!(true)), ("VAL", json!(7))])
}

// ---------------------------------------------------------------------
// No-op behavior
// ---------------------------------------------------------------------

#[test]
fn source_without_directives_is_unchanged() {
    let src = "const a = 1; // plain comment\n/* block */\nconst b = 2;\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    assert_eq!(result.output, None);
    assert!(result.diagnostics.is_empty());
}

#[test]
fn empty_source_is_unchanged() {
    let result = default_engine().preprocess("").expect("should succeed");
    assert_eq!(result.output, None);
}

#[test]
fn orphaned_directive_warns_and_leaves_source_unchanged() {
    let src = "a();\n// #if true\nb();\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    assert_eq!(result.output, None);
    assert_eq!(result.diagnostics.len(), 1);
    let warning = &result.diagnostics[0];
    assert_eq!(warning.code, codes::ORPHANED_DIRECTIVE);
    assert!(warning.message_text.contains("orphaned '#if'"));
    // The warning points at the directive comment.
    assert_eq!(warning.start, 5);
}

// ---------------------------------------------------------------------
// Basic retention and removal
// ---------------------------------------------------------------------

#[test]
fn always_true_round_trips_the_body() {
    let src = "// #if true\nconst a = 1;\n// #endif\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    assert_eq!(result.output.as_deref(), Some("\nconst a = 1;\n\n"));
}

#[test]
fn always_false_drops_markers_and_body() {
    let src = "head();\n// #if false\ngone();\n// #endif\ntail();\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    assert_eq!(result.output.as_deref(), Some("head();\n\ntail();\n"));
}

#[test]
fn crlf_newlines_survive() {
    let src = "// #if true\r\ncode\r\n// #endif\r\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    assert_eq!(result.output.as_deref(), Some("\r\ncode\r\n\r\n"));
}

#[test]
fn decorated_directive_comments_are_recognized() {
    let src = "//** #if true\nx();\n// #endif\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    assert_eq!(result.output.as_deref(), Some("\nx();\n\n"));
}

// ---------------------------------------------------------------------
// Chains
// ---------------------------------------------------------------------

#[test]
fn chain_selects_exactly_the_first_true_branch() {
    let src = "// #if DEBUG\na();\n// #elif VAL > 10\nb();\n// #else\nc();\n// #endif\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    let output = result.output.expect("should transform");
    assert!(output.contains("a();"), "branch A must survive: {output:?}");
    assert!(!output.contains("b();"), "branch B must be dropped");
    assert!(!output.contains("c();"), "branch C must be dropped");
}

#[test]
fn elif_branch_wins_when_if_is_false() {
    let src = "// #if !DEBUG\na();\n// #elif VAL > 5\nb();\n// #else\nc();\n// #endif\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    let output = result.output.expect("should transform");
    assert!(!output.contains("a();"));
    assert!(output.contains("b();"));
    assert!(!output.contains("c();"));
}

#[test]
fn else_branch_wins_when_nothing_matched() {
    let src = "// #if !DEBUG\na();\n// #elif VAL > 10\nb();\n// #else\nc();\n// #endif\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    let output = result.output.expect("should transform");
    assert!(!output.contains("a();"));
    assert!(!output.contains("b();"));
    assert!(output.contains("c();"));
}

#[test]
fn later_true_elif_is_moot_once_a_branch_matched() {
    // Both #elif operands are true; only the first survives.
    let src = "// #if false\na();\n// #elif true\nb();\n// #elif true\nc();\n// #endif\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    let output = result.output.expect("should transform");
    assert!(!output.contains("a();"));
    assert!(output.contains("b();"));
    assert!(!output.contains("c();"));
}

#[test]
fn sibling_chains_are_independent() {
    let src = "// #if true\na();\n// #endif\n// #if false\nb();\n// #endif\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    let output = result.output.expect("should transform");
    assert!(output.contains("a();"));
    assert!(!output.contains("b();"));
}

// ---------------------------------------------------------------------
// Nesting
// ---------------------------------------------------------------------

#[test]
fn nested_branches_resolve_recursively() {
    let src = "// #if true\nkeep1\n// #if false\ngone\n// #endif\nkeep2\n// #endif\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    assert_eq!(result.output.as_deref(), Some("\nkeep1\n\nkeep2\n\n"));
}

#[test]
fn nested_true_inside_true_keeps_inner_body() {
    let src = "// #if true\nouter1\n// #if VAL > 5\ninner\n// #endif\nouter2\n// #endif\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    let output = result.output.expect("should transform");
    assert!(output.contains("outer1"));
    assert!(output.contains("inner"));
    assert!(output.contains("outer2"));
}

#[test]
fn false_branch_drops_nested_directives_wholesale() {
    let src = "before\n// #if false\nx\n// #if true\ny\n// #endif\nz\n// #endif\nafter\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    let output = result.output.expect("should transform");
    assert!(output.contains("before"));
    assert!(output.contains("after"));
    assert!(!output.contains('y'), "nested body must go with the outer branch");
    assert!(!output.contains('x'));
    assert!(!output.contains('z'));
}

#[test]
fn nested_chain_inside_else_branch() {
    let src = "// #if false\na\n// #else\n// #if VAL > 5\nb\n// #else\nc\n// #endif\n// #endif\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    let output = result.output.expect("should transform");
    assert!(!output.contains('a'));
    assert!(output.contains('b'));
    assert!(!output.contains('c'));
}

// ---------------------------------------------------------------------
// Directives that are not directives
// ---------------------------------------------------------------------

#[test]
fn directive_text_inside_strings_is_ignored() {
    let src = "const s = \"// #if true\";\nconst t = `// #endif`;\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    assert_eq!(result.output, None);
}

#[test]
fn block_comment_directives_are_ignored() {
    let src = "/* #if true */\ncode();\n/* #endif */\n";
    let result = default_engine().preprocess(src).expect("should succeed");
    assert_eq!(result.output, None);
}

#[test]
fn ifdef_is_not_a_directive() {
    let src = "// #ifdef DEBUG\ncode();\n// #endif\n";
    // The #ifdef is ignored, leaving a lone #endif => orphan warning.
    let result = default_engine().preprocess(src).expect("should succeed");
    assert_eq!(result.output, None);
    assert_eq!(result.diagnostics.len(), 1);
    assert!(result.diagnostics[0].message_text.contains("'#endif'"));
}

// ---------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------

#[test]
fn bare_endif_is_unmatched_and_reports_position() {
    let src = "x();\n// #endif\n// #endif\n";
    let err = default_engine().preprocess(src).unwrap_err();
    match err {
        PreprocessError::Unmatched { kind, span } => {
            assert_eq!(kind, DirectiveKind::Endif);
            assert_eq!(span.start, 5);
            assert_eq!(span.end, 14);
        }
        other => panic!("expected Unmatched, got {other:?}"),
    }
}

#[test]
fn unmatched_error_message_names_the_directive() {
    let src = "x();\n// #endif\n// #endif\n";
    let err = default_engine().preprocess(src).unwrap_err();
    assert_eq!(err.to_string(), "Unmatched '#endif' at 5:14");
}

#[test]
fn elif_after_else_is_a_syntax_error_before_evaluation() {
    // The #elif operand would raise an expression error if evaluated;
    // the chain-shape check must fire first.
    let src = "// #if false\na\n// #else\nb\n// #elif NO_SUCH_VAR\nc\n// #endif\n";
    let err = default_engine().preprocess(src).unwrap_err();
    assert!(matches!(err, PreprocessError::ElseOrElifAfterElse { .. }));
    assert_eq!(
        err.to_string(),
        "SyntaxError: Cannot have #else or #elif after #else"
    );
}

#[test]
fn else_after_else_is_a_syntax_error() {
    let src = "// #if true\na\n// #else\nb\n// #else\nc\n// #endif\n";
    let err = default_engine().preprocess(src).unwrap_err();
    assert!(matches!(err, PreprocessError::ElseOrElifAfterElse { .. }));
}

#[test]
fn unclosed_chains_report_every_open_directive() {
    let src = "// #if true\nx\n// #if false\ny\n";
    let err = default_engine().preprocess(src).unwrap_err();
    match &err {
        PreprocessError::Unclosed { open } => {
            assert_eq!(open.len(), 2);
            assert!(open.iter().all(|(kind, _)| *kind == DirectiveKind::If));
        }
        other => panic!("expected Unclosed, got {other:?}"),
    }
    assert!(err.to_string().starts_with("Unclosed directive blocks found:"));
}

#[test]
fn else_with_operand_is_an_unexpected_directive() {
    let src = "// #if true\nx\n// #else DEBUG\ny\n// #endif\n";
    let err = default_engine().preprocess(src).unwrap_err();
    assert!(matches!(
        err,
        PreprocessError::UnexpectedDirective {
            kind: DirectiveKind::Else,
            ..
        }
    ));
}

#[test]
fn expression_failure_names_the_expression_and_cause() {
    let src = "// #if UNKNOWN_VAR\nx\n// #endif\n";
    let err = default_engine().preprocess(src).unwrap_err();
    match &err {
        PreprocessError::Expr { expr, .. } => assert_eq!(expr, "UNKNOWN_VAR"),
        other => panic!("expected Expr, got {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "\"UNKNOWN_VAR\" with error UNKNOWN_VAR is not defined"
    );
}

#[test]
fn empty_if_operand_is_an_expression_error() {
    let src = "// #if\nx\n// #endif\n";
    let err = default_engine().preprocess(src).unwrap_err();
    assert!(matches!(err, PreprocessError::Expr { .. }));
}

#[test]
fn error_codes_are_stable() {
    let unmatched = default_engine()
        .preprocess("// #endif\n// #endif\n")
        .unwrap_err();
    assert_eq!(unmatched.code(), codes::UNMATCHED_DIRECTIVE);

    let expr = default_engine()
        .preprocess("// #if NOPE\n// #endif\n")
        .unwrap_err();
    assert_eq!(expr.code(), codes::EXPRESSION_ERROR);
}

// ---------------------------------------------------------------------
// Engine construction
// ---------------------------------------------------------------------

#[test]
fn engine_is_reusable_across_sources() {
    let pp = default_engine();
    let first = pp.preprocess("// #if DEBUG\na\n// #endif\n").expect("ok");
    let second = pp.preprocess("no directives here\n").expect("ok");
    assert!(first.output.is_some());
    assert_eq!(second.output, None);
}

#[test]
fn engine_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Preprocessor>();
}

#[test]
fn variables_of_every_json_type_bind() {
    let pp = engine(&[
        ("S", json!("text")),
        ("N", json!(2.5)),
        ("B", json!(false)),
        ("NIL", json!(null)),
        ("ARR", json!([1])),
    ]);
    let src = "// #if S == 'text' && N > 2 && !B && NIL == null && ARR\nx\n// #endif\n";
    let result = pp.preprocess(src).expect("should succeed");
    assert!(result.output.expect("transformed").contains('x'));
}
