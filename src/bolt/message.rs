//! Request/response messages and the chunked transport framing.
//!
//! Every message is one PackStream structure. On the wire a message is
//! split into chunks, each prefixed with a 16-bit big-endian size, and
//! terminated by a zero-size chunk.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::bolt::packstream::{
    encode_map_header, encode_string, encode_struct_header, encode_value, Decoder,
};
use crate::bolt::value::Value;
use crate::error::{ClientError, Result};

pub const MSG_HELLO: u8 = 0x01;
pub const MSG_GOODBYE: u8 = 0x02;
pub const MSG_RESET: u8 = 0x0F;
pub const MSG_RUN: u8 = 0x10;
pub const MSG_BEGIN: u8 = 0x11;
pub const MSG_COMMIT: u8 = 0x12;
pub const MSG_ROLLBACK: u8 = 0x13;
pub const MSG_PULL: u8 = 0x3F;
pub const MSG_SUCCESS: u8 = 0x70;
pub const MSG_RECORD: u8 = 0x71;
pub const MSG_IGNORED: u8 = 0x7E;
pub const MSG_FAILURE: u8 = 0x7F;

const MAX_CHUNK: usize = 0xFFFF;

/// One server reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(BTreeMap<String, Value>),
    Record(Vec<Value>),
    Ignored,
    Failure { code: String, message: String },
}

/// Writes one already-encoded message as a chunked transfer.
pub fn write_message(stream: &mut impl Write, payload: &[u8]) -> std::io::Result<()> {
    for chunk in payload.chunks(MAX_CHUNK) {
        stream.write_all(&(chunk.len() as u16).to_be_bytes())?;
        stream.write_all(chunk)?;
    }
    stream.write_all(&[0, 0])?;
    stream.flush()
}

/// Reads one complete message payload, joining chunks until the zero-size
/// terminator.
pub fn read_message(stream: &mut impl Read) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    loop {
        let mut header = [0u8; 2];
        stream.read_exact(&mut header)?;
        let size = u16::from_be_bytes(header) as usize;
        if size == 0 {
            if payload.is_empty() {
                // A no-op chunk between messages; keep reading.
                continue;
            }
            return Ok(payload);
        }
        let start = payload.len();
        payload.resize(start + size, 0);
        stream.read_exact(&mut payload[start..])?;
    }
}

pub fn parse_response(payload: &[u8]) -> Result<Response> {
    let mut decoder = Decoder::new(payload);
    let (tag, fields) = decoder.decode_struct_header()?;
    match tag {
        MSG_SUCCESS => {
            let metadata = if fields > 0 {
                decoder.decode_map_field()?
            } else {
                BTreeMap::new()
            };
            Ok(Response::Success(metadata))
        }
        MSG_RECORD => Ok(Response::Record(decoder.decode_list_field()?)),
        MSG_IGNORED => Ok(Response::Ignored),
        MSG_FAILURE => {
            let metadata = decoder.decode_map_field()?;
            let code = metadata
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let message = metadata
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no failure details provided")
                .to_string();
            Ok(Response::Failure { code, message })
        }
        _ => Err(ClientError::Protocol(format!(
            "unexpected message tag 0x{tag:02X}"
        ))),
    }
}

pub fn encode_hello(user_agent: &str, username: &str, password: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_struct_header(&mut buf, MSG_HELLO, 1);
    encode_map_header(&mut buf, 4);
    encode_string(&mut buf, "user_agent");
    encode_string(&mut buf, user_agent);
    encode_string(&mut buf, "scheme");
    encode_string(&mut buf, if username.is_empty() { "none" } else { "basic" });
    encode_string(&mut buf, "principal");
    encode_string(&mut buf, username);
    encode_string(&mut buf, "credentials");
    encode_string(&mut buf, password);
    buf
}

pub fn encode_run(query: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_struct_header(&mut buf, MSG_RUN, 3);
    encode_string(&mut buf, query);
    encode_map_header(&mut buf, 0); // parameters
    encode_map_header(&mut buf, 0); // extra
    buf
}

/// PULL with `n: -1`, requesting the whole result stream.
pub fn encode_pull_all() -> Vec<u8> {
    let mut buf = Vec::new();
    encode_struct_header(&mut buf, MSG_PULL, 1);
    encode_map_header(&mut buf, 1);
    encode_string(&mut buf, "n");
    encode_value(&mut buf, &Value::Integer(-1));
    buf
}

pub fn encode_begin() -> Vec<u8> {
    let mut buf = Vec::new();
    encode_struct_header(&mut buf, MSG_BEGIN, 1);
    encode_map_header(&mut buf, 0);
    buf
}

pub fn encode_commit() -> Vec<u8> {
    let mut buf = Vec::new();
    encode_struct_header(&mut buf, MSG_COMMIT, 0);
    buf
}

pub fn encode_rollback() -> Vec<u8> {
    let mut buf = Vec::new();
    encode_struct_header(&mut buf, MSG_ROLLBACK, 0);
    buf
}

pub fn encode_reset() -> Vec<u8> {
    let mut buf = Vec::new();
    encode_struct_header(&mut buf, MSG_RESET, 0);
    buf
}

pub fn encode_goodbye() -> Vec<u8> {
    let mut buf = Vec::new();
    encode_struct_header(&mut buf, MSG_GOODBYE, 0);
    buf
}
