//! Closed value variant for track payloads.
//!
//! Payloads stay intentionally loose (string/number/bool/list/map) but the
//! variant is closed so serialization and shared-key extraction never meet an
//! unrepresentable value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A track payload: ordered map of keys to loosely-typed values.
pub type Payload = BTreeMap<String, TrackValue>;

/// One payload value.
///
/// Integers and floats are split so millisecond timestamps survive
/// round-trips exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<TrackValue>),
    Map(Payload),
}

impl TrackValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; numeric strings are accepted since persisted payloads
    /// historically carry timestamps as strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for TrackValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for TrackValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for TrackValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for TrackValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for TrackValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<TrackValue>> for TrackValue {
    fn from(value: Vec<TrackValue>) -> Self {
        Self::List(value)
    }
}

impl From<Payload> for TrackValue {
    fn from(value: Payload) -> Self {
        Self::Map(value)
    }
}

/// Merge `src` into `dst`, later writer (src) winning on key collision.
pub fn merge(dst: &mut Payload, src: Payload) {
    for (key, value) in src {
        dst.insert(key, value);
    }
}

/// Build a [`Payload`] literal.
#[macro_export]
macro_rules! payload {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::Payload::new();
        $(map.insert($key.to_string(), $crate::TrackValue::from($value));)*
        map
    }};
}
