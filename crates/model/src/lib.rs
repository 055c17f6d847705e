//! Core wire-level model for searchql.
//!
//! This crate defines the fundamental types shared by the query builder and
//! the connection backends:
//! - `Value`: a scalar or sequence value flowing into filters and out of
//!   result rows
//! - `Row`: a single result row, keyed by column name

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single result row, keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// A scalar or sequence value.
///
/// Used both for filter values fed into the query builder and for result
/// cells coming back from the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent/NULL cell
    Null,
    /// Boolean (rendered as `0`/`1` on the wire)
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// String
    Str(String),
    /// Ordered sequence, as used by `IN` and `BETWEEN`
    List(Vec<Value>),
}

impl Value {
    /// Coerce to an integer where a sensible conversion exists.
    ///
    /// Strings are parsed, floats truncated. Sequences and NULL do not
    /// coerce.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Null | Value::List(_) => None,
        }
    }

    /// True for sequence values.
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Convert a JSON value coming off the wire.
    ///
    /// Numbers map to `Int` when they fit an `i64`, `Float` otherwise.
    /// Objects have no column-cell equivalent and collapse to their JSON
    /// text.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(_) => Value::Str(json.to_string()),
        }
    }
}

/// Plain text rendering, without any dialect quoting.
///
/// This is what meta parsing and display output use; the query compiler
/// applies its own quoting rules instead.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(7), Value::Int(7));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from("abc"), Value::Str("abc".to_string()));
        assert_eq!(
            Value::from([1, 2, 3]),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert!(Value::from(vec!["a", "b"]).is_list());
    }

    #[test]
    fn test_as_i64_coercion() {
        assert_eq!(Value::Int(42).as_i64(), Some(42));
        assert_eq!(Value::Str(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(Value::Float(3.9).as_i64(), Some(3));
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::Null.as_i64(), None);
        assert_eq!(Value::List(vec![]).as_i64(), None);
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({
            "id": 3,
            "weight": 1.5,
            "title": "hello",
            "tags": [1, 2],
            "missing": null
        });
        assert_eq!(Value::from_json(&json["id"]), Value::Int(3));
        assert_eq!(Value::from_json(&json["weight"]), Value::Float(1.5));
        assert_eq!(Value::from_json(&json["title"]), Value::Str("hello".into()));
        assert_eq!(
            Value::from_json(&json["tags"]),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(Value::from_json(&json["missing"]), Value::Null);
    }

    #[test]
    fn test_display_is_unquoted() {
        assert_eq!(Value::Str("o'brien".into()).to_string(), "o'brien");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Bool(false).to_string(), "0");
    }
}
