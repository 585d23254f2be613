//! Parameter encoding and response decoding.
//!
//! Pure functions only: query/body strings from [`Params`], and a JSON value
//! tree from raw response bytes.

use crate::base::neterror::RequestError;
use crate::http::params::Params;
use bytes::Bytes;
use serde_json::{Map, Value};
use url::form_urlencoded::byte_serialize;
use url::Url;

/// Encode params as `k=v` pairs joined with `&`, in insertion order.
///
/// Keys and values are form-urlencoded.
pub fn encode_params(params: &Params) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let key: String = byte_serialize(key.as_bytes()).collect();
            let value: String = byte_serialize(value.to_string().as_bytes()).collect();
            format!("{key}={value}")
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Encode params as a JSON object body.
pub fn params_to_json(params: &Params) -> Bytes {
    let object: Map<String, Value> = params
        .iter()
        .map(|(key, value)| {
            let value = serde_json::to_value(value).unwrap_or(Value::Null);
            (key.to_string(), value)
        })
        .collect();
    Bytes::from(Value::Object(object).to_string())
}

/// Append encoded params to `base`, joining with `?` or `&` as appropriate.
pub fn url(base: &Url, params: &Params) -> Url {
    let query = encode_params(params);
    if query.is_empty() {
        return base.clone();
    }

    let mut url = base.clone();
    let merged = match base.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
        _ => query,
    };
    url.set_query(Some(&merged));
    url
}

/// Parse a response body into a value tree.
///
/// An empty body decodes to `Null`. Any other parse failure is an error.
pub fn decode(bytes: &[u8], remove_null: bool) -> Result<Value, RequestError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| RequestError::Deserialization(e.to_string()))?;

    Ok(if remove_null { remove_nulls(value) } else { value })
}

/// Recursively drop null entries from objects and arrays.
pub fn remove_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, remove_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(remove_nulls)
                .collect(),
        ),
        other => other,
    }
}
