//! Directive resolution and source-slicing engine for the jspp preprocessor.
//!
//! `// #if EXPR` / `// #elif EXPR` / `// #else` / `// #endif` line comments
//! mark regions of a JavaScript/TypeScript file that are kept or removed
//! based on expressions evaluated against a fixed variable table:
//!
//! ```
//! use jspp_parser::{Preprocessor, PreprocessorOptions};
//!
//! let mut options = PreprocessorOptions::default();
//! options
//!     .variables
//!     .insert("DEBUG".to_string(), serde_json::json!(true));
//! let pp = Preprocessor::new(options);
//!
//! let source = "// #if DEBUG\nlog('on');\n// #endif\n";
//! let result = pp.preprocess(source).unwrap();
//! assert_eq!(result.output.as_deref(), Some("\nlog('on');\n\n"));
//! ```
//!
//! One call processes one source string start to finish; the engine keeps no
//! state across calls beyond the immutable variable table, so a single
//! `Preprocessor` can be shared across threads.

pub mod branch;
mod compile;
pub mod directive;
pub mod eval;

pub use branch::{BranchArena, BranchForest, BranchId, BranchNode, Condition};
pub use directive::{DirectiveBlock, DirectiveKind};
pub use eval::EvalError;

use jspp_common::{ByteSpan, Diagnostic};
use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Fatal conditions raised from one `preprocess` call. No partial output is
/// ever returned alongside one of these.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("SyntaxError: Cannot have #else or #elif after #else")]
    ElseOrElifAfterElse { span: ByteSpan },

    #[error("Unexpected directive '{kind} {operand}' at {span}")]
    UnexpectedDirective {
        kind: DirectiveKind,
        operand: String,
        span: ByteSpan,
    },

    #[error("Unmatched '{kind}' at {span}")]
    Unmatched { kind: DirectiveKind, span: ByteSpan },

    #[error("Unclosed directive blocks found: {}", format_open_list(.open))]
    Unclosed { open: Vec<(DirectiveKind, ByteSpan)> },

    #[error("\"{expr}\" with error {source}")]
    Expr {
        expr: String,
        #[source]
        source: EvalError,
    },
}

impl PreprocessError {
    /// Stable diagnostic code for this error.
    pub fn code(&self) -> u32 {
        use jspp_common::diagnostics::codes;
        match self {
            PreprocessError::ElseOrElifAfterElse { .. } => codes::SYNTAX_AFTER_ELSE,
            PreprocessError::UnexpectedDirective { .. } => codes::UNEXPECTED_DIRECTIVE,
            PreprocessError::Unmatched { .. } => codes::UNMATCHED_DIRECTIVE,
            PreprocessError::Unclosed { .. } => codes::UNCLOSED_BLOCKS,
            PreprocessError::Expr { .. } => codes::EXPRESSION_ERROR,
        }
    }

    /// Span of the offending directive, when there is a single one.
    pub fn span(&self) -> Option<ByteSpan> {
        match self {
            PreprocessError::ElseOrElifAfterElse { span }
            | PreprocessError::UnexpectedDirective { span, .. }
            | PreprocessError::Unmatched { span, .. } => Some(*span),
            PreprocessError::Unclosed { open } => open.first().map(|(_, span)| *span),
            PreprocessError::Expr { .. } => None,
        }
    }
}

fn format_open_list(open: &[(DirectiveKind, ByteSpan)]) -> String {
    let parts: Vec<String> = open
        .iter()
        .map(|(kind, span)| format!("'{kind}' at {span}"))
        .collect();
    parts.join(", ")
}

/// Engine configuration, fixed for the lifetime of one `Preprocessor`.
#[derive(Clone, Debug, Default)]
pub struct PreprocessorOptions {
    /// Variable bindings visible to `#if`/`#elif` expressions. These names
    /// are the only identifiers that resolve during evaluation.
    pub variables: FxHashMap<String, JsonValue>,
}

/// Result of one `preprocess` call.
#[derive(Clone, Debug, PartialEq)]
pub struct Preprocessed {
    /// The transformed text, or `None` when the source contained no usable
    /// directives and should be used unchanged.
    pub output: Option<String>,
    /// Non-fatal findings, currently only the orphaned-directive warning.
    pub diagnostics: Vec<Diagnostic>,
}

/// The conditional-compilation engine.
#[derive(Clone, Debug)]
pub struct Preprocessor {
    variables: FxHashMap<String, JsonValue>,
}

impl Preprocessor {
    pub fn new(options: PreprocessorOptions) -> Preprocessor {
        Preprocessor {
            variables: options.variables,
        }
    }

    /// Transform one source string.
    ///
    /// `Ok` with `output: None` means "unchanged, no directives found", so
    /// callers can skip rewriting the file. Fatal conditions propagate as
    /// `PreprocessError`; nothing is swallowed and no partial output exists.
    pub fn preprocess(&self, source: &str) -> Result<Preprocessed, PreprocessError> {
        let _span = tracing::trace_span!("preprocess", source_len = source.len()).entered();
        let mut diagnostics = Vec::new();

        let raws = self.collect_directives(source)?;
        if raws.is_empty() {
            return Ok(Preprocessed {
                output: None,
                diagnostics,
            });
        }

        let blocks = directive::build_blocks(&raws, &self.variables)?;
        tracing::trace!(blocks = blocks.len(), "built directive blocks");

        let forest = branch::resolve(&blocks, &mut diagnostics)?;
        if forest.roots.is_empty() {
            // Orphaned directive: warned, file left untouched.
            return Ok(Preprocessed {
                output: None,
                diagnostics,
            });
        }

        let output = compile::compile(source, &forest);
        tracing::trace!(
            roots = forest.roots.len(),
            output_len = output.len(),
            "compiled output"
        );
        Ok(Preprocessed {
            output: Some(output),
            diagnostics,
        })
    }

    /// Scan comments and keep the ones that parse as directives, in source
    /// order. Only single-line comments can carry directives.
    fn collect_directives(
        &self,
        source: &str,
    ) -> Result<Vec<directive::RawDirective>, PreprocessError> {
        let mut raws = Vec::new();
        for comment in jspp_scanner::comment_ranges(source) {
            if comment.multi_line {
                continue;
            }
            if let Some(raw) = directive::parse_raw(comment.inner_text(source), comment.span)? {
                raws.push(raw);
            }
        }
        Ok(raws)
    }
}
