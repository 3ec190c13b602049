//! Top-level execution modes selected by the binary.

pub mod parallel;
pub mod parser;
pub mod repl;
pub mod serial;
