use crate::base::neterror::RequestError;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::str::FromStr;

/// A header map that strictly preserves insertion order.
///
/// Caller-supplied request headers are collected here and applied on top of
/// the headers the worker derives from the content type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedHeaderMap {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl OrderedHeaderMap {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Insert or replace a header. Names compare case-insensitively.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), RequestError> {
        let name_header =
            HeaderName::from_str(name).map_err(|_| RequestError::InvalidHeader(name.to_string()))?;
        let value_header = HeaderValue::from_str(value)
            .map_err(|_| RequestError::InvalidHeader(format!("{name}: {value:?}")))?;

        // HeaderName is already lowercase, so equality is case-insensitive.
        if let Some((_, v)) = self.headers.iter_mut().find(|(n, _)| *n == name_header) {
            *v = value_header;
        } else {
            self.headers.push((name_header, value_header));
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.headers.iter().map(|(n, v)| (n, v))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Insert every entry of `other`, replacing same-named headers in place.
    pub fn merge(&mut self, other: &OrderedHeaderMap) {
        for (name, value) in other.iter() {
            match self.headers.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = value.clone(),
                None => self.headers.push((name.clone(), value.clone())),
            }
        }
    }

    /// Overwrite matching entries of `map` with these headers, in order.
    pub fn apply_to(&self, map: &mut HeaderMap) {
        for (name, value) in &self.headers {
            map.insert(name.clone(), value.clone());
        }
    }
}
