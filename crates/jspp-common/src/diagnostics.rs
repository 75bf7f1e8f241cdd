//! Structured diagnostics.
//!
//! The engine reports non-fatal conditions (and the CLI renders fatal ones)
//! as `Diagnostic` values rather than writing to ambient output streams, so
//! callers can assert on them directly.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Warning,
    Error,
    Message,
}

/// Stable diagnostic codes.
pub mod codes {
    /// A single directive with no matching partner; the file is left untouched.
    pub const ORPHANED_DIRECTIVE: u32 = 1001;
    /// `#else`/`#elif` following `#else` in the same chain.
    pub const SYNTAX_AFTER_ELSE: u32 = 2001;
    /// A directive keyword combined with an operand it does not accept.
    pub const UNEXPECTED_DIRECTIVE: u32 = 2002;
    /// `#elif`/`#else`/`#endif` with no open chain.
    pub const UNMATCHED_DIRECTIVE: u32 = 2003;
    /// One or more chains still open at end of file.
    pub const UNCLOSED_BLOCKS: u32 = 2004;
    /// Expression evaluation failed.
    pub const EXPRESSION_ERROR: u32 = 2005;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: u32,
    /// Byte offset of the offending token, 0 for whole-file diagnostics.
    pub start: u32,
    pub length: u32,
    pub message_text: String,
}

impl Diagnostic {
    pub fn warning(code: u32, start: u32, length: u32, message: impl Into<String>) -> Self {
        Self {
            category: DiagnosticCategory::Warning,
            code,
            start,
            length,
            message_text: message.into(),
        }
    }

    pub fn error(code: u32, start: u32, length: u32, message: impl Into<String>) -> Self {
        Self {
            category: DiagnosticCategory::Error,
            code,
            start,
            length,
            message_text: message.into(),
        }
    }
}
