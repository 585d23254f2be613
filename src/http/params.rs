//! Typed request parameters.
//!
//! Parameters are an insertion-ordered map from name to a closed scalar
//! value. Non-scalar values are rejected when the value is built, so the
//! serializer never has to fail.

use crate::base::neterror::RequestError;
use serde::Serialize;
use std::fmt;

/// A scalar parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::String(s) => f.write_str(s),
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Integer(i)
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        ParamValue::Integer(i64::from(i))
    }
}

impl From<u32> for ParamValue {
    fn from(i: u32) -> Self {
        ParamValue::Integer(i64::from(i))
    }
}

impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        ParamValue::Float(x)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl TryFrom<serde_json::Value> for ParamValue {
    type Error = RequestError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::String(s) => Ok(ParamValue::String(s)),
            Value::Bool(b) => Ok(ParamValue::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ParamValue::Integer(i))
                } else if let Some(x) = n.as_f64() {
                    Ok(ParamValue::Float(x))
                } else {
                    Err(RequestError::InvalidParam(n.to_string()))
                }
            }
            other => Err(RequestError::InvalidParam(format!(
                "non-scalar value {other}"
            ))),
        }
    }
}

/// Insertion-ordered request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter, keeping the original position on replace.
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let key = key.into();
        let value = value.into();
        if let Some((_, v)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            *v = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Chaining form of [`Params::insert`].
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        self.insert(key, value);
        self
    }

    /// Build from a JSON object, rejecting nested or null values.
    pub fn from_json(value: serde_json::Value) -> Result<Self, RequestError> {
        let serde_json::Value::Object(map) = value else {
            return Err(RequestError::InvalidParam(
                "parameters must be a JSON object".to_string(),
            ));
        };
        let mut params = Params::new();
        for (key, value) in map {
            let value = ParamValue::try_from(value)
                .map_err(|_| RequestError::InvalidParam(format!("{key} is not a scalar")))?;
            params.insert(key, value);
        }
        Ok(params)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Pairs ordered by key, then by rendered value.
    pub fn sorted(&self) -> Vec<(&str, &ParamValue)> {
        let mut pairs: Vec<_> = self.iter().collect();
        pairs.sort_by(|(ka, va), (kb, vb)| {
            ka.cmp(kb)
                .then_with(|| va.to_string().cmp(&vb.to_string()))
        });
        pairs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}
