//! Comment scanner for the jspp preprocessor.
//!
//! This crate provides the lexical analysis phase:
//! - `CommentRange` - A comment token with its source span
//! - `comment_ranges` - Extract every comment from a JS/TS source string

pub mod comments;
pub use comments::{CommentRange, comment_ranges};
