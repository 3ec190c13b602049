//! PackStream codec, the value serialization layer of the wire protocol.
//!
//! Encoding always emits the smallest representation; decoding accepts any
//! representation. Structures are decoded into the typed graph values the
//! server is known to send and rejected otherwise.

use std::collections::BTreeMap;

use crate::bolt::value::{
    Date, Duration, LocalDateTime, LocalTime, Node, Path, Relationship, UnboundRelationship,
    Value,
};
use crate::error::{ClientError, Result};

pub const MARKER_NULL: u8 = 0xC0;
pub const MARKER_FLOAT: u8 = 0xC1;
pub const MARKER_FALSE: u8 = 0xC2;
pub const MARKER_TRUE: u8 = 0xC3;
pub const MARKER_INT_8: u8 = 0xC8;
pub const MARKER_INT_16: u8 = 0xC9;
pub const MARKER_INT_32: u8 = 0xCA;
pub const MARKER_INT_64: u8 = 0xCB;
pub const MARKER_BYTES_8: u8 = 0xCC;
pub const MARKER_BYTES_16: u8 = 0xCD;
pub const MARKER_BYTES_32: u8 = 0xCE;
pub const MARKER_TINY_STRING: u8 = 0x80;
pub const MARKER_STRING_8: u8 = 0xD0;
pub const MARKER_STRING_16: u8 = 0xD1;
pub const MARKER_STRING_32: u8 = 0xD2;
pub const MARKER_TINY_LIST: u8 = 0x90;
pub const MARKER_LIST_8: u8 = 0xD4;
pub const MARKER_LIST_16: u8 = 0xD5;
pub const MARKER_LIST_32: u8 = 0xD6;
pub const MARKER_TINY_MAP: u8 = 0xA0;
pub const MARKER_MAP_8: u8 = 0xD8;
pub const MARKER_MAP_16: u8 = 0xD9;
pub const MARKER_MAP_32: u8 = 0xDA;
pub const MARKER_TINY_STRUCT: u8 = 0xB0;

pub const STRUCT_NODE: u8 = 0x4E;
pub const STRUCT_RELATIONSHIP: u8 = 0x52;
pub const STRUCT_UNBOUND_RELATIONSHIP: u8 = 0x72;
pub const STRUCT_PATH: u8 = 0x50;
pub const STRUCT_DATE: u8 = 0x44;
pub const STRUCT_LOCAL_TIME: u8 = 0x74;
pub const STRUCT_LOCAL_DATE_TIME: u8 = 0x64;
pub const STRUCT_DURATION: u8 = 0x45;

pub fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(MARKER_NULL),
        Value::Bool(true) => buf.push(MARKER_TRUE),
        Value::Bool(false) => buf.push(MARKER_FALSE),
        Value::Integer(i) => encode_int(buf, *i),
        Value::Float(x) => {
            buf.push(MARKER_FLOAT);
            buf.extend_from_slice(&x.to_be_bytes());
        }
        Value::String(s) => encode_string(buf, s),
        Value::Bytes(bytes) => encode_bytes(buf, bytes),
        Value::List(items) => {
            encode_list_header(buf, items.len());
            for item in items {
                encode_value(buf, item);
            }
        }
        Value::Map(map) => {
            encode_map_header(buf, map.len());
            for (key, item) in map {
                encode_string(buf, key);
                encode_value(buf, item);
            }
        }
        // The client never sends graph entities back to the server.
        Value::Node(_)
        | Value::Relationship(_)
        | Value::UnboundRelationship(_)
        | Value::Path(_) => buf.push(MARKER_NULL),
        Value::Date(d) => {
            encode_struct_header(buf, STRUCT_DATE, 1);
            encode_int(buf, d.days);
        }
        Value::LocalTime(t) => {
            encode_struct_header(buf, STRUCT_LOCAL_TIME, 1);
            encode_int(buf, t.nanoseconds);
        }
        Value::LocalDateTime(dt) => {
            encode_struct_header(buf, STRUCT_LOCAL_DATE_TIME, 2);
            encode_int(buf, dt.seconds);
            encode_int(buf, dt.nanoseconds);
        }
        Value::Duration(dur) => {
            encode_struct_header(buf, STRUCT_DURATION, 4);
            encode_int(buf, dur.months);
            encode_int(buf, dur.days);
            encode_int(buf, dur.seconds);
            encode_int(buf, dur.nanoseconds);
        }
    }
}

pub fn encode_int(buf: &mut Vec<u8>, i: i64) {
    if (-16..=127).contains(&i) {
        buf.push(i as u8);
    } else if i8::try_from(i).is_ok() {
        buf.push(MARKER_INT_8);
        buf.push(i as u8);
    } else if i16::try_from(i).is_ok() {
        buf.push(MARKER_INT_16);
        buf.extend_from_slice(&(i as i16).to_be_bytes());
    } else if i32::try_from(i).is_ok() {
        buf.push(MARKER_INT_32);
        buf.extend_from_slice(&(i as i32).to_be_bytes());
    } else {
        buf.push(MARKER_INT_64);
        buf.extend_from_slice(&i.to_be_bytes());
    }
}

pub fn encode_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    match bytes.len() {
        n if n <= 15 => buf.push(MARKER_TINY_STRING | n as u8),
        n if n <= u8::MAX as usize => {
            buf.push(MARKER_STRING_8);
            buf.push(n as u8);
        }
        n if n <= u16::MAX as usize => {
            buf.push(MARKER_STRING_16);
            buf.extend_from_slice(&(n as u16).to_be_bytes());
        }
        n => {
            buf.push(MARKER_STRING_32);
            buf.extend_from_slice(&(n as u32).to_be_bytes());
        }
    }
    buf.extend_from_slice(bytes);
}

pub fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    match bytes.len() {
        n if n <= u8::MAX as usize => {
            buf.push(MARKER_BYTES_8);
            buf.push(n as u8);
        }
        n if n <= u16::MAX as usize => {
            buf.push(MARKER_BYTES_16);
            buf.extend_from_slice(&(n as u16).to_be_bytes());
        }
        n => {
            buf.push(MARKER_BYTES_32);
            buf.extend_from_slice(&(n as u32).to_be_bytes());
        }
    }
    buf.extend_from_slice(bytes);
}

pub fn encode_list_header(buf: &mut Vec<u8>, len: usize) {
    match len {
        n if n <= 15 => buf.push(MARKER_TINY_LIST | n as u8),
        n if n <= u8::MAX as usize => {
            buf.push(MARKER_LIST_8);
            buf.push(n as u8);
        }
        n if n <= u16::MAX as usize => {
            buf.push(MARKER_LIST_16);
            buf.extend_from_slice(&(n as u16).to_be_bytes());
        }
        n => {
            buf.push(MARKER_LIST_32);
            buf.extend_from_slice(&(n as u32).to_be_bytes());
        }
    }
}

pub fn encode_map_header(buf: &mut Vec<u8>, len: usize) {
    match len {
        n if n <= 15 => buf.push(MARKER_TINY_MAP | n as u8),
        n if n <= u8::MAX as usize => {
            buf.push(MARKER_MAP_8);
            buf.push(n as u8);
        }
        n if n <= u16::MAX as usize => {
            buf.push(MARKER_MAP_16);
            buf.extend_from_slice(&(n as u16).to_be_bytes());
        }
        n => {
            buf.push(MARKER_MAP_32);
            buf.extend_from_slice(&(n as u32).to_be_bytes());
        }
    }
}

/// Messages are tiny structures: a field count in the marker nibble plus a
/// one-byte tag.
pub fn encode_struct_header(buf: &mut Vec<u8>, tag: u8, fields: u8) {
    debug_assert!(fields <= 15);
    buf.push(MARKER_TINY_STRUCT | fields);
    buf.push(tag);
}

/// Cursor-style decoder over one complete message payload.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(ClientError::Protocol("truncated message payload".into()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(i64::from_be_bytes(raw))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(f64::from_be_bytes(raw))
    }

    fn read_string_body(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ClientError::Protocol("string field is not valid UTF-8".into()))
    }

    /// Decodes one value of any type.
    pub fn decode_value(&mut self) -> Result<Value> {
        let marker = self.read_u8()?;
        match marker {
            0x00..=0x7F => Ok(Value::Integer(marker as i64)),
            0xF0..=0xFF => Ok(Value::Integer(marker as i8 as i64)),
            MARKER_NULL => Ok(Value::Null),
            MARKER_TRUE => Ok(Value::Bool(true)),
            MARKER_FALSE => Ok(Value::Bool(false)),
            MARKER_FLOAT => Ok(Value::Float(self.read_f64()?)),
            MARKER_INT_8 => Ok(Value::Integer(self.read_u8()? as i8 as i64)),
            MARKER_INT_16 => Ok(Value::Integer(self.read_u16()? as i16 as i64)),
            MARKER_INT_32 => Ok(Value::Integer(self.read_u32()? as i32 as i64)),
            MARKER_INT_64 => Ok(Value::Integer(self.read_i64()?)),
            MARKER_BYTES_8 => {
                let len = self.read_u8()? as usize;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            MARKER_BYTES_16 => {
                let len = self.read_u16()? as usize;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            MARKER_BYTES_32 => {
                let len = self.read_u32()? as usize;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            m if m & 0xF0 == MARKER_TINY_STRING => {
                let len = (m & 0x0F) as usize;
                Ok(Value::String(self.read_string_body(len)?))
            }
            MARKER_STRING_8 => {
                let len = self.read_u8()? as usize;
                Ok(Value::String(self.read_string_body(len)?))
            }
            MARKER_STRING_16 => {
                let len = self.read_u16()? as usize;
                Ok(Value::String(self.read_string_body(len)?))
            }
            MARKER_STRING_32 => {
                let len = self.read_u32()? as usize;
                Ok(Value::String(self.read_string_body(len)?))
            }
            m if m & 0xF0 == MARKER_TINY_LIST => self.decode_list((m & 0x0F) as usize),
            MARKER_LIST_8 => {
                let len = self.read_u8()? as usize;
                self.decode_list(len)
            }
            MARKER_LIST_16 => {
                let len = self.read_u16()? as usize;
                self.decode_list(len)
            }
            MARKER_LIST_32 => {
                let len = self.read_u32()? as usize;
                self.decode_list(len)
            }
            m if m & 0xF0 == MARKER_TINY_MAP => self.decode_map((m & 0x0F) as usize),
            MARKER_MAP_8 => {
                let len = self.read_u8()? as usize;
                self.decode_map(len)
            }
            MARKER_MAP_16 => {
                let len = self.read_u16()? as usize;
                self.decode_map(len)
            }
            MARKER_MAP_32 => {
                let len = self.read_u32()? as usize;
                self.decode_map(len)
            }
            m if m & 0xF0 == MARKER_TINY_STRUCT => {
                let fields = (m & 0x0F) as usize;
                let tag = self.read_u8()?;
                self.decode_struct(tag, fields)
            }
            m => Err(ClientError::Protocol(format!(
                "unsupported value marker 0x{m:02X}"
            ))),
        }
    }

    fn decode_list(&mut self, len: usize) -> Result<Value> {
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.decode_value()?);
        }
        Ok(Value::List(items))
    }

    fn decode_map(&mut self, len: usize) -> Result<Value> {
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let key = match self.decode_value()? {
                Value::String(s) => s,
                other => {
                    return Err(ClientError::Protocol(format!(
                        "map key must be a string, got {other:?}"
                    )))
                }
            };
            map.insert(key, self.decode_value()?);
        }
        Ok(Value::Map(map))
    }

    /// Opens a structure and returns its field count and tag. Used by the
    /// message layer, which owns the top-level structure of a response.
    pub fn decode_struct_header(&mut self) -> Result<(u8, usize)> {
        let marker = self.read_u8()?;
        if marker & 0xF0 != MARKER_TINY_STRUCT {
            return Err(ClientError::Protocol(format!(
                "expected structure, got marker 0x{marker:02X}"
            )));
        }
        let fields = (marker & 0x0F) as usize;
        let tag = self.read_u8()?;
        Ok((tag, fields))
    }

    fn expect_fields(tag: u8, fields: usize, expected: usize) -> Result<()> {
        if fields != expected {
            return Err(ClientError::Protocol(format!(
                "structure 0x{tag:02X} has {fields} fields, expected {expected}"
            )));
        }
        Ok(())
    }

    fn decode_struct(&mut self, tag: u8, fields: usize) -> Result<Value> {
        match tag {
            STRUCT_NODE => {
                Self::expect_fields(tag, fields, 3)?;
                Ok(Value::Node(self.decode_node()?))
            }
            STRUCT_RELATIONSHIP => {
                Self::expect_fields(tag, fields, 5)?;
                let id = self.decode_i64_field()?;
                let start_id = self.decode_i64_field()?;
                let end_id = self.decode_i64_field()?;
                let type_name = self.decode_string_field()?;
                let properties = self.decode_map_field()?;
                Ok(Value::Relationship(Relationship {
                    id,
                    start_id,
                    end_id,
                    type_name,
                    properties,
                }))
            }
            STRUCT_UNBOUND_RELATIONSHIP => {
                Self::expect_fields(tag, fields, 3)?;
                Ok(Value::UnboundRelationship(self.decode_unbound()?))
            }
            STRUCT_PATH => {
                Self::expect_fields(tag, fields, 3)?;
                let nodes = match self.decode_value()? {
                    Value::List(items) => items
                        .into_iter()
                        .map(|item| match item {
                            Value::Node(node) => Ok(node),
                            _ => Err(ClientError::Protocol("path nodes must be nodes".into())),
                        })
                        .collect::<Result<Vec<_>>>()?,
                    _ => return Err(ClientError::Protocol("path nodes must be a list".into())),
                };
                let relationships = match self.decode_value()? {
                    Value::List(items) => items
                        .into_iter()
                        .map(|item| match item {
                            Value::UnboundRelationship(rel) => Ok(rel),
                            _ => Err(ClientError::Protocol(
                                "path relationships must be unbound relationships".into(),
                            )),
                        })
                        .collect::<Result<Vec<_>>>()?,
                    _ => {
                        return Err(ClientError::Protocol(
                            "path relationships must be a list".into(),
                        ))
                    }
                };
                let indices = match self.decode_value()? {
                    Value::List(items) => items
                        .into_iter()
                        .map(|item| {
                            item.as_i64().ok_or_else(|| {
                                ClientError::Protocol("path indices must be integers".into())
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                    _ => return Err(ClientError::Protocol("path indices must be a list".into())),
                };
                Ok(Value::Path(Path {
                    nodes,
                    relationships,
                    indices,
                }))
            }
            STRUCT_DATE => {
                Self::expect_fields(tag, fields, 1)?;
                Ok(Value::Date(Date {
                    days: self.decode_i64_field()?,
                }))
            }
            STRUCT_LOCAL_TIME => {
                Self::expect_fields(tag, fields, 1)?;
                Ok(Value::LocalTime(LocalTime {
                    nanoseconds: self.decode_i64_field()?,
                }))
            }
            STRUCT_LOCAL_DATE_TIME => {
                Self::expect_fields(tag, fields, 2)?;
                Ok(Value::LocalDateTime(LocalDateTime {
                    seconds: self.decode_i64_field()?,
                    nanoseconds: self.decode_i64_field()?,
                }))
            }
            STRUCT_DURATION => {
                Self::expect_fields(tag, fields, 4)?;
                Ok(Value::Duration(Duration {
                    months: self.decode_i64_field()?,
                    days: self.decode_i64_field()?,
                    seconds: self.decode_i64_field()?,
                    nanoseconds: self.decode_i64_field()?,
                }))
            }
            _ => Err(ClientError::Protocol(format!(
                "unsupported structure tag 0x{tag:02X}"
            ))),
        }
    }

    fn decode_node(&mut self) -> Result<Node> {
        let id = self.decode_i64_field()?;
        let labels = match self.decode_value()? {
            Value::List(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    _ => Err(ClientError::Protocol("node labels must be strings".into())),
                })
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(ClientError::Protocol("node labels must be a list".into())),
        };
        let properties = self.decode_map_field()?;
        Ok(Node {
            id,
            labels,
            properties,
        })
    }

    fn decode_unbound(&mut self) -> Result<UnboundRelationship> {
        let id = self.decode_i64_field()?;
        let type_name = self.decode_string_field()?;
        let properties = self.decode_map_field()?;
        Ok(UnboundRelationship {
            id,
            type_name,
            properties,
        })
    }

    fn decode_i64_field(&mut self) -> Result<i64> {
        self.decode_value()?
            .as_i64()
            .ok_or_else(|| ClientError::Protocol("expected an integer field".into()))
    }

    fn decode_string_field(&mut self) -> Result<String> {
        match self.decode_value()? {
            Value::String(s) => Ok(s),
            _ => Err(ClientError::Protocol("expected a string field".into())),
        }
    }

    pub fn decode_map_field(&mut self) -> Result<BTreeMap<String, Value>> {
        match self.decode_value()? {
            Value::Map(map) => Ok(map),
            _ => Err(ClientError::Protocol("expected a map field".into())),
        }
    }

    pub fn decode_list_field(&mut self) -> Result<Vec<Value>> {
        match self.decode_value()? {
            Value::List(items) => Ok(items),
            _ => Err(ClientError::Protocol("expected a list field".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Value) -> Value {
        let mut buf = Vec::new();
        encode_value(&mut buf, &value);
        let mut decoder = Decoder::new(&buf);
        let decoded = decoder.decode_value().unwrap();
        assert!(decoder.is_exhausted());
        decoded
    }

    #[test]
    fn integer_boundaries() {
        for i in [
            0i64,
            1,
            -1,
            -16,
            -17,
            127,
            128,
            -128,
            -129,
            32_767,
            32_768,
            -32_768,
            2_147_483_647,
            2_147_483_648,
            i64::MAX,
            i64::MIN,
        ] {
            assert_eq!(round_trip(Value::Integer(i)), Value::Integer(i), "{i}");
        }
    }

    #[test]
    fn tiny_int_encoding_is_one_byte() {
        let mut buf = Vec::new();
        encode_int(&mut buf, 42);
        assert_eq!(buf, vec![42]);
        buf.clear();
        encode_int(&mut buf, -1);
        assert_eq!(buf, vec![0xFF]);
    }

    #[test]
    fn strings_and_lists_and_maps() {
        assert_eq!(round_trip(Value::from("hello")), Value::from("hello"));
        let long = "x".repeat(300);
        assert_eq!(
            round_trip(Value::String(long.clone())),
            Value::String(long)
        );
        let list = Value::List(vec![Value::Integer(1), Value::from("a"), Value::Null]);
        assert_eq!(round_trip(list.clone()), list);
        let mut map = BTreeMap::new();
        map.insert("n".to_string(), Value::Integer(-200));
        map.insert("ok".to_string(), Value::Bool(true));
        let map = Value::Map(map);
        assert_eq!(round_trip(map.clone()), map);
    }

    #[test]
    fn float_round_trip() {
        assert_eq!(round_trip(Value::Float(2.5)), Value::Float(2.5));
    }

    #[test]
    fn node_structure_decodes() {
        // B3 4E <id> <labels> <properties>
        let mut buf = vec![MARKER_TINY_STRUCT | 3, STRUCT_NODE];
        encode_int(&mut buf, 7);
        encode_list_header(&mut buf, 1);
        encode_string(&mut buf, "Person");
        encode_map_header(&mut buf, 1);
        encode_string(&mut buf, "name");
        encode_string(&mut buf, "Ada");
        let mut decoder = Decoder::new(&buf);
        let Value::Node(node) = decoder.decode_value().unwrap() else {
            panic!("expected a node");
        };
        assert_eq!(node.id, 7);
        assert_eq!(node.labels, vec!["Person"]);
        assert_eq!(node.properties["name"], Value::from("Ada"));
    }

    #[test]
    fn temporal_structures_round_trip() {
        let date = Value::Date(Date { days: 19_358 });
        assert_eq!(round_trip(date.clone()), date);
        let dt = Value::LocalDateTime(LocalDateTime {
            seconds: 1_700_000_000,
            nanoseconds: 42,
        });
        assert_eq!(round_trip(dt.clone()), dt);
    }

    #[test]
    fn truncated_payload_is_a_protocol_error() {
        let mut buf = Vec::new();
        encode_string(&mut buf, "hello");
        buf.truncate(buf.len() - 2);
        let mut decoder = Decoder::new(&buf);
        assert!(matches!(
            decoder.decode_value(),
            Err(ClientError::Protocol(_))
        ));
    }
}
