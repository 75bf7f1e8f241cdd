//! CLI crate for the jspp preprocessor.
//!
//! The binary lives in `src/bin/jspp.rs`; argument parsing and the file
//! processing driver are exposed here so integration tests can drive them
//! without spawning a process.

pub mod args;
pub mod driver;
