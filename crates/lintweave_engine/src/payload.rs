//! Engine-side record tree.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value};

/// A live callable embedded in an engine payload.
///
/// Callables cannot cross a worker boundary. Equality is identity of the
/// underlying closure.
#[derive(Clone)]
pub struct Callable(Arc<dyn Fn(&Payload) -> Payload + Send + Sync>);

impl Callable {
    pub fn new(f: impl Fn(&Payload) -> Payload + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, arg: &Payload) -> Payload {
        (self.0)(arg)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<callable>")
    }
}

/// A diagnostic record as an engine produces it.
///
/// Mirrors the JSON data model with two extra variants: `Callable` for live
/// functions and `Removed`, the marker `Envelope` leaves where it stripped one.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Payload>),
    Object(BTreeMap<String, Payload>),
    Callable(Callable),
    Removed,
}

impl Payload {
    /// Builds an object payload from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Payload)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn callable(f: impl Fn(&Payload) -> Payload + Send + Sync + 'static) -> Self {
        Self::Callable(Callable::new(f))
    }

    /// Returns the field `key` when this is an object.
    pub fn get(&self, key: &str) -> Option<&Payload> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Payload::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Payload::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Payload {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<u64> for Payload {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i64> for Payload {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl<T: Into<Payload>> From<Vec<T>> for Payload {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_preserves_structure() {
        let payload = Payload::from(json!({"file": "a.ts", "count": 2, "tags": ["x", null]}));

        assert_eq!(payload.get("file").and_then(Payload::as_str), Some("a.ts"));
        assert_eq!(payload.get("count"), Some(&Payload::from(2u64)));
        assert_eq!(
            payload.get("tags"),
            Some(&Payload::Array(vec![Payload::string("x"), Payload::Null]))
        );
    }

    #[test]
    fn test_callable_equality_is_identity() {
        let f = Callable::new(|p| p.clone());
        let same = f.clone();
        let other = Callable::new(|p| p.clone());

        assert_eq!(f, same);
        assert_ne!(f, other);
    }

    #[test]
    fn test_callable_call() {
        let double = Callable::new(|p| match p {
            Payload::Number(n) => Payload::from(n.as_u64().unwrap_or(0) * 2),
            _ => Payload::Null,
        });
        assert_eq!(double.call(&Payload::from(21u64)), Payload::from(42u64));
    }
}
