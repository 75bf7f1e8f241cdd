//! Common types and utilities for the jspp preprocessor.
//!
//! This crate provides foundational types used across all jspp crates:
//! - Source spans (`ByteSpan`)
//! - Structured diagnostics (`Diagnostic`, `DiagnosticCategory`)

// Span - Source location tracking (byte offsets)
pub mod span;
pub use span::ByteSpan;

// Structured diagnostics returned alongside transformation results
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory};
