//! A live connection to the server: handshake, auth and the query surface
//! the rest of the client is built on.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, warn};

use crate::bolt::message::{
    encode_begin, encode_commit, encode_goodbye, encode_hello, encode_pull_all, encode_reset,
    encode_rollback, encode_run, parse_response, read_message, write_message, Response,
};
use crate::bolt::value::Value;
use crate::config::BoltConfig;
use crate::error::{ClientError, Result};

const HANDSHAKE_MAGIC: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];
/// Proposed protocol versions, newest first, encoded `[0, 0, minor, major]`.
const HANDSHAKE_VERSIONS: [[u8; 4]; 4] = [[0, 0, 4, 4], [0, 0, 3, 4], [0, 0, 2, 4], [0, 0, 1, 4]];

/// Observable health of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Good,
    Bad,
}

/// Result set of one executed statement.
#[derive(Debug, Clone, Default)]
pub struct QueryData {
    pub header: Vec<String>,
    pub records: Vec<Vec<Value>>,
    pub wall_time: Duration,
    pub stats: Option<BTreeMap<String, i64>>,
    pub notification: Option<BTreeMap<String, String>>,
    pub execution_info: Option<BTreeMap<String, f64>>,
}

enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.read(buf),
            Transport::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.write(buf),
            Transport::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Transport::Plain(stream) => stream.flush(),
            Transport::Tls(stream) => stream.flush(),
        }
    }
}

/// One authenticated connection. The session tracks its own health: any
/// transport or protocol error flips it to `Bad` and it never recovers in
/// place; the owner is expected to open a replacement.
pub struct BoltSession {
    transport: Transport,
    status: SessionStatus,
    version: (u8, u8),
    in_transaction: bool,
}

impl BoltSession {
    pub fn connect(config: &BoltConfig) -> Result<Self> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port))
            .map_err(|e| ClientError::Connect(format!("{}: {e}", config.address())))?;
        tcp.set_nodelay(true).ok();
        let transport = if config.use_ssl {
            // Encryption without certificate verification, the behavior of
            // the `require` SSL mode this client is paired with.
            let connector = TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|e| ClientError::Connect(format!("TLS setup failed: {e}")))?;
            let stream = connector
                .connect(&config.host, tcp)
                .map_err(|e| ClientError::Connect(format!("TLS handshake failed: {e}")))?;
            Transport::Tls(Box::new(stream))
        } else {
            Transport::Plain(tcp)
        };
        let mut session = Self {
            transport,
            status: SessionStatus::Good,
            version: (0, 0),
            in_transaction: false,
        };
        session.handshake(config)?;
        Ok(session)
    }

    fn handshake(&mut self, config: &BoltConfig) -> Result<()> {
        let mut proposal = Vec::with_capacity(20);
        proposal.extend_from_slice(&HANDSHAKE_MAGIC);
        for version in HANDSHAKE_VERSIONS {
            proposal.extend_from_slice(&version);
        }
        self.transport.write_all(&proposal)?;
        self.transport.flush()?;
        let mut chosen = [0u8; 4];
        self.transport.read_exact(&mut chosen)?;
        if chosen == [0, 0, 0, 0] {
            self.status = SessionStatus::Bad;
            return Err(ClientError::Connect(
                "server rejected every proposed protocol version".into(),
            ));
        }
        self.version = (chosen[3], chosen[2]);
        debug!(major = chosen[3], minor = chosen[2], "bolt.handshake.agreed");

        let user_agent = format!("boltline/{}", env!("CARGO_PKG_VERSION"));
        let hello = encode_hello(&user_agent, &config.username, &config.password);
        match self.request(&hello)? {
            Response::Success(_) => Ok(()),
            Response::Failure { code, message } => {
                self.status = SessionStatus::Bad;
                Err(ClientError::Connect(format!("{code}: {message}")))
            }
            other => {
                self.status = SessionStatus::Bad;
                Err(ClientError::Protocol(format!(
                    "unexpected reply to HELLO: {other:?}"
                )))
            }
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn protocol_version(&self) -> (u8, u8) {
        self.version
    }

    fn send(&mut self, payload: &[u8]) -> Result<()> {
        write_message(&mut self.transport, payload).map_err(|e| {
            self.status = SessionStatus::Bad;
            ClientError::Io(e)
        })
    }

    fn receive(&mut self) -> Result<Response> {
        let payload = read_message(&mut self.transport).map_err(|e| {
            self.status = SessionStatus::Bad;
            e
        })?;
        parse_response(&payload).map_err(|e| {
            self.status = SessionStatus::Bad;
            e
        })
    }

    fn request(&mut self, payload: &[u8]) -> Result<Response> {
        self.send(payload)?;
        self.receive()
    }

    /// Clears server-side failure state after a FAILURE reply, aborting any
    /// open transaction with it. Leaves the session `Bad` when even the
    /// reset is refused.
    fn reset(&mut self) -> Result<()> {
        self.in_transaction = false;
        match self.request(&encode_reset())? {
            Response::Success(_) => Ok(()),
            other => {
                self.status = SessionStatus::Bad;
                Err(ClientError::SessionBad(format!(
                    "reset refused: {other:?}"
                )))
            }
        }
    }

    fn query_failure(&mut self, code: String, message: String) -> ClientError {
        if let Err(err) = self.reset() {
            warn!(error = %err, "bolt.session.reset_failed");
        }
        ClientError::Query(format!("{code}: {message}"))
    }

    /// Runs one statement and pulls the whole result. Inside an explicit
    /// transaction this runs within that transaction; otherwise the server
    /// auto-commits. A FAILURE reply aborts any open transaction
    /// server-side; the session itself stays usable after a reset.
    pub fn run(&mut self, query: &str) -> Result<QueryData> {
        let started = Instant::now();
        self.send(&encode_run(query))?;
        self.send(&encode_pull_all())?;

        let header = match self.receive()? {
            Response::Success(metadata) => field_names(&metadata),
            Response::Failure { code, message } => {
                // The pipelined PULL is answered with IGNORED; consume it.
                let _ = self.receive()?;
                return Err(self.query_failure(code, message));
            }
            other => {
                self.status = SessionStatus::Bad;
                return Err(ClientError::Protocol(format!(
                    "unexpected reply to RUN: {other:?}"
                )));
            }
        };

        let mut records = Vec::new();
        loop {
            match self.receive()? {
                Response::Record(row) => records.push(row),
                Response::Success(summary) => {
                    let mut data = QueryData {
                        header,
                        records,
                        wall_time: started.elapsed(),
                        ..QueryData::default()
                    };
                    collect_summary(&summary, &mut data);
                    return Ok(data);
                }
                Response::Failure { code, message } => {
                    return Err(self.query_failure(code, message));
                }
                Response::Ignored => {
                    self.status = SessionStatus::Bad;
                    return Err(ClientError::Protocol(
                        "server ignored a PULL outside of failure state".into(),
                    ));
                }
            }
        }
    }

    pub fn begin(&mut self) -> Result<()> {
        self.tx_control(&encode_begin(), "BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    /// Whether commit succeeds or fails, no transaction is open afterwards;
    /// a failed commit is cleared with a reset, which aborts it.
    pub fn commit(&mut self) -> Result<()> {
        let result = self.tx_control(&encode_commit(), "COMMIT");
        self.in_transaction = false;
        result
    }

    /// Aborts the open transaction. A no-op when none is open, which is
    /// the common case after a statement FAILURE: the reset that cleared
    /// the failure state has already taken the transaction down with it.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        let result = self.tx_control(&encode_rollback(), "ROLLBACK");
        self.in_transaction = false;
        result
    }

    fn tx_control(&mut self, payload: &[u8], what: &str) -> Result<()> {
        match self.request(payload)? {
            Response::Success(_) => Ok(()),
            Response::Failure { code, message } => Err(self.query_failure(code, message)),
            other => {
                self.status = SessionStatus::Bad;
                Err(ClientError::Protocol(format!(
                    "unexpected reply to {what}: {other:?}"
                )))
            }
        }
    }
}

impl Drop for BoltSession {
    fn drop(&mut self) {
        if self.status == SessionStatus::Good {
            let _ = write_message(&mut self.transport, &encode_goodbye());
        }
    }
}

fn field_names(metadata: &BTreeMap<String, Value>) -> Vec<String> {
    match metadata.get("fields") {
        Some(Value::List(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn collect_summary(summary: &BTreeMap<String, Value>, data: &mut QueryData) {
    if let Some(Value::Map(stats)) = summary.get("stats") {
        let collected: BTreeMap<String, i64> = stats
            .iter()
            .filter_map(|(key, value)| value.as_i64().map(|v| (key.clone(), v)))
            .collect();
        if !collected.is_empty() {
            data.stats = Some(collected);
        }
    }
    if let Some(Value::List(notifications)) = summary.get("notifications") {
        if let Some(Value::Map(first)) = notifications.first() {
            let collected: BTreeMap<String, String> = first
                .iter()
                .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
                .collect();
            if !collected.is_empty() {
                data.notification = Some(collected);
            }
        }
    }
    let timings: BTreeMap<String, f64> = summary
        .iter()
        .filter_map(|(key, value)| value.as_f64().map(|v| (key.clone(), v)))
        .collect();
    if !timings.is_empty() {
        data.execution_info = Some(timings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_fall_back_to_display_for_odd_headers() {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "fields".to_string(),
            Value::List(vec![Value::from("n"), Value::Integer(2)]),
        );
        assert_eq!(field_names(&metadata), vec!["n".to_string(), "2".into()]);
    }

    #[test]
    fn summary_collection_picks_stats_and_notifications() {
        let mut stats = BTreeMap::new();
        stats.insert("nodes-created".to_string(), Value::Integer(5));
        let mut note = BTreeMap::new();
        note.insert("title".to_string(), Value::from("hint"));
        let mut summary = BTreeMap::new();
        summary.insert("stats".to_string(), Value::Map(stats));
        summary.insert(
            "notifications".to_string(),
            Value::List(vec![Value::Map(note)]),
        );
        summary.insert("plan_execution_time".to_string(), Value::Float(0.25));
        let mut data = QueryData::default();
        collect_summary(&summary, &mut data);
        assert_eq!(data.stats.unwrap()["nodes-created"], 5);
        assert_eq!(data.notification.unwrap()["title"], "hint");
        assert_eq!(data.execution_info.unwrap()["plan_execution_time"], 0.25);
    }
}
