//! boltline: a command-line client for Bolt-speaking graph databases.
//!
//! The library splits into an input pipeline (tokenizer, classifier,
//! statement source), a hand-written Bolt client, and the batched-parallel
//! import engine that drives both. The binary in `src/bin` wires them to
//! flags and stdin.
#![forbid(unsafe_code)]

pub mod bolt;
pub mod config;
pub mod error;
pub mod import;
pub mod input;
pub mod logging;
pub mod mode;
pub mod output;

pub use crate::bolt::{BoltSession, ClientSession, Connector, QueryData, SessionFactory, SessionStatus, Value};
pub use crate::config::{BoltConfig, CsvOptions, ImportMode, ImportOptions, OutputFormat, OutputOptions};
pub use crate::error::{ClientError, Result};
pub use crate::import::{BatchRunner, ImportSummary};
pub use crate::input::{Query, QueryInfo, StatementSource};
