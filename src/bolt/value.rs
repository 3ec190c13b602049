//! Value model for the wire protocol, plus terminal pretty-printing.

use std::collections::BTreeMap;
use std::fmt;

/// A value carried by the wire protocol in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Node(Node),
    Relationship(Relationship),
    UnboundRelationship(UnboundRelationship),
    Path(Path),
    Date(Date),
    LocalTime(LocalTime),
    LocalDateTime(LocalDateTime),
    Duration(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: i64,
    pub start_id: i64,
    pub end_id: i64,
    pub type_name: String,
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnboundRelationship {
    pub id: i64,
    pub type_name: String,
    pub properties: BTreeMap<String, Value>,
}

/// An alternating node/relationship sequence. `indices` come in pairs of
/// (relationship, node) references into the two lists; a negative
/// relationship index means the relationship is traversed in reverse.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub relationships: Vec<UnboundRelationship>,
    pub indices: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    /// Days since the Unix epoch, possibly negative.
    pub days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    /// Nanoseconds since midnight.
    pub nanoseconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDateTime {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Nanoseconds within the second.
    pub nanoseconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanoseconds: i64,
}

/// Escapes a string into a double-quoted literal.
pub fn escape(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + 2);
    out.push('"');
    for c in src.chars() {
        match c {
            '\\' | '\'' | '"' => {
                out.push('\\');
                out.push(c);
            }
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn write_map(f: &mut fmt::Formatter<'_>, map: &BTreeMap<String, Value>) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{key}: {value}")?;
    }
    write!(f, "}}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{}", escape(s)),
            Value::Bytes(bytes) => {
                for (i, byte) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => write_map(f, map),
            Value::Node(node) => write!(f, "{node}"),
            Value::Relationship(rel) => write!(f, "{rel}"),
            Value::UnboundRelationship(rel) => write!(f, "{rel}"),
            Value::Path(path) => write!(f, "{path}"),
            Value::Date(date) => write!(f, "{date}"),
            Value::LocalTime(time) => write!(f, "{time}"),
            Value::LocalDateTime(dt) => write!(f, "{dt}"),
            Value::Duration(dur) => write!(f, "{dur}"),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for label in &self.labels {
            write!(f, ":{label}")?;
        }
        if !self.labels.is_empty() && !self.properties.is_empty() {
            write!(f, " ")?;
        }
        if !self.properties.is_empty() {
            write_map(f, &self.properties)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[:{}", self.type_name)?;
        if !self.properties.is_empty() {
            write!(f, " ")?;
            write_map(f, &self.properties)?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for UnboundRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[:{}", self.type_name)?;
        if !self.properties.is_empty() {
            write!(f, " ")?;
            write_map(f, &self.properties)?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nodes[0])?;
        for step in self.indices.chunks(2) {
            let (rel_index, node_index) = (step[0], step[1]);
            let reversed = rel_index < 0;
            let rel = &self.relationships[(rel_index.unsigned_abs() as usize) - 1];
            let node = &self.nodes[node_index as usize];
            if reversed {
                write!(f, "<-{rel}-{node}")?;
            } else {
                write!(f, "-{rel}->{node}")?;
            }
        }
        Ok(())
    }
}

/// Gregorian calendar date from a day count relative to 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if month <= 2 { year + 1 } else { year }, month, day)
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (year, month, day) = civil_from_days(self.days);
        write!(f, "{year:04}-{month:02}-{day:02}")
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.nanoseconds;
        let hours = total / 3_600_000_000_000;
        let minutes = total % 3_600_000_000_000 / 60_000_000_000;
        let seconds = total % 60_000_000_000 / 1_000_000_000;
        let nanos = total % 1_000_000_000;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}.{nanos:09}")
    }
}

impl fmt::Display for LocalDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = self.seconds.div_euclid(86_400);
        let seconds_of_day = self.seconds.rem_euclid(86_400);
        let date = Date { days };
        let time = LocalTime {
            nanoseconds: seconds_of_day * 1_000_000_000 + self.nanoseconds,
        };
        write!(f, "{date} {time}")
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Months are ignored, matching the server's duration semantics.
        let micros = self.seconds * 1_000_000 + self.nanoseconds / 1_000;
        write!(f, "P")?;
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        if micros == 0 {
            return Ok(());
        }
        write!(f, "T")?;
        let hours = micros / 3_600_000_000;
        let minutes = micros % 3_600_000_000 / 60_000_000;
        let seconds = micros % 60_000_000 / 1_000_000;
        let sub = micros % 1_000_000;
        if hours != 0 {
            write!(f, "{hours}H")?;
        }
        if minutes != 0 {
            write!(f, "{minutes}M")?;
        }
        if seconds == 0 && sub == 0 {
            return Ok(());
        }
        if seconds == 0 && micros < 0 {
            write!(f, "-")?;
        }
        write!(f, "{seconds}")?;
        if sub != 0 {
            write!(f, ".{:06}", sub.abs())?;
        }
        write!(f, "S")
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Raw text for CSV output: strings stay unescaped, everything else
    /// uses the display form.
    pub fn csv_field(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn node_display_with_labels_and_properties() {
        let node = Node {
            id: 1,
            labels: vec!["Person".into(), "Admin".into()],
            properties: props(&[("name", Value::from("Ada"))]),
        };
        assert_eq!(node.to_string(), "(:Person:Admin {name: \"Ada\"})");
    }

    #[test]
    fn node_display_without_properties() {
        let node = Node {
            id: 1,
            labels: vec!["L".into()],
            properties: BTreeMap::new(),
        };
        assert_eq!(node.to_string(), "(:L)");
    }

    #[test]
    fn string_display_is_escaped() {
        assert_eq!(Value::from("a\"b\n").to_string(), "\"a\\\"b\\n\"");
    }

    #[test]
    fn date_display() {
        assert_eq!(Date { days: 0 }.to_string(), "1970-01-01");
        assert_eq!(Date { days: 19_358 }.to_string(), "2023-01-01");
        assert_eq!(Date { days: -1 }.to_string(), "1969-12-31");
    }

    #[test]
    fn local_time_display() {
        let t = LocalTime {
            nanoseconds: (12 * 3600 + 34 * 60 + 56) * 1_000_000_000 + 789,
        };
        assert_eq!(t.to_string(), "12:34:56.000000789");
    }

    #[test]
    fn duration_display() {
        let d = Duration {
            months: 0,
            days: 2,
            seconds: 3 * 3600 + 4 * 60 + 5,
            nanoseconds: 500_000_000,
        };
        assert_eq!(d.to_string(), "P2DT3H4M5.500000S");
        let zero = Duration {
            months: 0,
            days: 0,
            seconds: 0,
            nanoseconds: 0,
        };
        assert_eq!(zero.to_string(), "P");
    }

    #[test]
    fn path_display_follows_direction() {
        let a = Node {
            id: 1,
            labels: vec!["A".into()],
            properties: BTreeMap::new(),
        };
        let b = Node {
            id: 2,
            labels: vec!["B".into()],
            properties: BTreeMap::new(),
        };
        let rel = UnboundRelationship {
            id: 3,
            type_name: "R".into(),
            properties: BTreeMap::new(),
        };
        let path = Path {
            nodes: vec![a, b],
            relationships: vec![rel],
            indices: vec![1, 1],
        };
        assert_eq!(path.to_string(), "(:A)-[:R]->(:B)");
    }
}
