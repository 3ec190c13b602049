use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failure: {0}")]
    Connect(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("bad session: {0}")]
    SessionBad(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("batch {0} failed after {1} attempts")]
    RetriesExhausted(usize, u64),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("console error: {0}")]
    Console(String),
}

impl ClientError {
    /// Errors that leave the current session unusable rather than just
    /// failing the query that triggered them.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            ClientError::Connect(_)
                | ClientError::Io(_)
                | ClientError::SessionBad(_)
                | ClientError::Protocol(_)
        )
    }
}
