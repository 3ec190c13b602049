//! Hand-written client for the Bolt wire protocol.

pub mod message;
pub mod packstream;
pub mod session;
pub mod value;

pub use session::{BoltSession, QueryData, SessionStatus};
pub use value::Value;

use crate::config::BoltConfig;
use crate::error::Result;

/// The operations the import engine and the execution modes need from a
/// server session. `BoltSession` is the production implementation; tests
/// substitute in-memory fakes.
pub trait ClientSession: Send {
    /// Runs one statement and pulls its full result. Outside an explicit
    /// transaction the server auto-commits; inside one, the statement joins
    /// the transaction and a failure aborts it.
    fn execute(&mut self, query: &str) -> Result<QueryData>;
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    /// Aborts the open transaction; must be a no-op when none is open,
    /// such as after a failure that already took the transaction down.
    fn rollback(&mut self) -> Result<()>;
    fn status(&self) -> SessionStatus;
}

/// Opens authenticated sessions. Used once per worker slot at startup and
/// again whenever a slot's session is observed `Bad`.
pub trait SessionFactory: Send + Sync {
    type Session: ClientSession + 'static;
    fn open(&self) -> Result<Self::Session>;
}

impl ClientSession for BoltSession {
    fn execute(&mut self, query: &str) -> Result<QueryData> {
        self.run(query)
    }

    fn begin(&mut self) -> Result<()> {
        BoltSession::begin(self)
    }

    fn commit(&mut self) -> Result<()> {
        BoltSession::commit(self)
    }

    fn rollback(&mut self) -> Result<()> {
        BoltSession::rollback(self)
    }

    fn status(&self) -> SessionStatus {
        BoltSession::status(self)
    }
}

/// Connection factory bound to one server address and credential set.
#[derive(Debug, Clone)]
pub struct Connector {
    config: BoltConfig,
}

impl Connector {
    pub fn new(config: BoltConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BoltConfig {
        &self.config
    }
}

impl SessionFactory for Connector {
    type Session = BoltSession;

    fn open(&self) -> Result<BoltSession> {
        BoltSession::connect(&self.config)
    }
}
