//! Values stored in a session.

use std::collections::BTreeMap;
use std::fmt;

/// Decoded session attributes, keyed by attribute name.
pub type SessionData = BTreeMap<String, SessionValue>;

/// Key of an entry in a [`SessionValue::Array`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArrayKey {
    /// Integer key
    Int(i64),
    /// String key
    String(String),
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{i}"),
            ArrayKey::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ArrayKey {
    fn from(value: i64) -> Self {
        ArrayKey::Int(value)
    }
}

impl From<&str> for ArrayKey {
    fn from(value: &str) -> Self {
        ArrayKey::String(value.to_string())
    }
}

/// A value in the self-describing session encoding.
///
/// Arrays are ordered lists of key/value pairs, so both list-like and
/// map-like arrays keep their original order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionValue {
    /// `N;`
    Null,
    /// `b:0;` / `b:1;`
    Bool(bool),
    /// `i:<digits>;`
    Int(i64),
    /// `d:<number>;`
    Float(f64),
    /// `s:<len>:"<bytes>";`
    String(String),
    /// `a:<count>:{<key><value>...}`
    Array(Vec<(ArrayKey, SessionValue)>),
}

impl SessionValue {
    /// Looks up `key` when this value is an array.
    pub fn get(&self, key: impl Into<ArrayKey>) -> Option<&SessionValue> {
        let key = key.into();
        match self {
            SessionValue::Array(entries) => entries
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// The string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SessionValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer content, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SessionValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Appends the encoded form of this value to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            SessionValue::Null => out.extend_from_slice(b"N;"),
            SessionValue::Bool(b) => {
                out.extend_from_slice(if *b { b"b:1;" } else { b"b:0;" });
            }
            SessionValue::Int(i) => out.extend_from_slice(format!("i:{i};").as_bytes()),
            SessionValue::Float(f) => {
                let number = if f.is_nan() {
                    "NAN".to_string()
                } else if f.is_infinite() {
                    if *f > 0.0 { "INF" } else { "-INF" }.to_string()
                } else {
                    f.to_string()
                };
                out.extend_from_slice(format!("d:{number};").as_bytes());
            }
            SessionValue::String(s) => encode_string(s, out),
            SessionValue::Array(entries) => {
                out.extend_from_slice(format!("a:{}:{{", entries.len()).as_bytes());
                for (key, value) in entries {
                    match key {
                        ArrayKey::Int(i) => out.extend_from_slice(format!("i:{i};").as_bytes()),
                        ArrayKey::String(s) => encode_string(s, out),
                    }
                    value.encode_into(out);
                }
                out.push(b'}');
            }
        }
    }

    /// The encoded form of this value.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }
}

fn encode_string(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("s:{}:\"", s.len()).as_bytes());
    out.extend_from_slice(s.as_bytes());
    out.extend_from_slice(b"\";");
}

impl From<bool> for SessionValue {
    fn from(value: bool) -> Self {
        SessionValue::Bool(value)
    }
}

impl From<i64> for SessionValue {
    fn from(value: i64) -> Self {
        SessionValue::Int(value)
    }
}

impl From<f64> for SessionValue {
    fn from(value: f64) -> Self {
        SessionValue::Float(value)
    }
}

impl From<&str> for SessionValue {
    fn from(value: &str) -> Self {
        SessionValue::String(value.to_string())
    }
}

impl From<String> for SessionValue {
    fn from(value: String) -> Self {
        SessionValue::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars() {
        assert_eq!(SessionValue::Null.encode(), b"N;");
        assert_eq!(SessionValue::Bool(true).encode(), b"b:1;");
        assert_eq!(SessionValue::Int(-42).encode(), b"i:-42;");
        assert_eq!(SessionValue::Float(1.5).encode(), b"d:1.5;");
        assert_eq!(SessionValue::Float(f64::NEG_INFINITY).encode(), b"d:-INF;");
    }

    #[test]
    fn string_length_counts_bytes() {
        assert_eq!(SessionValue::from("héllo").encode(), "s:6:\"héllo\";".as_bytes());
    }

    #[test]
    fn encodes_nested_arrays() {
        let value = SessionValue::Array(vec![
            (ArrayKey::Int(0), SessionValue::from("a")),
            (
                ArrayKey::from("inner"),
                SessionValue::Array(vec![(ArrayKey::Int(0), SessionValue::Null)]),
            ),
        ]);
        assert_eq!(
            value.encode(),
            b"a:2:{i:0;s:1:\"a\";s:5:\"inner\";a:1:{i:0;N;}}".to_vec()
        );
        assert_eq!(
            value.get("inner").and_then(|inner| inner.get(0)),
            Some(&SessionValue::Null)
        );
    }
}
