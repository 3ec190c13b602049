//! Turning a line-oriented text stream into classified statements.

pub mod classifier;
pub mod source;
pub mod tokenizer;

pub use classifier::{classify, QueryInfo};
pub use source::{Query, StatementSource};
pub use tokenizer::LineTokenizer;
