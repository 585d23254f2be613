//! HTTP response as returned by a transport.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// A fully received HTTP response.
///
/// Transports collect the body before handing the response back, so the
/// worker can classify, decode and cache without further I/O.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Shorthand for a response without headers.
    pub fn with_body(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a reference to the body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_body() {
        let resp = HttpResponse::with_body(201, "created");
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert!(resp.is_success());
        assert_eq!(resp.body(), &Bytes::from("created"));
    }

    #[test]
    fn test_non_success() {
        let resp = HttpResponse::with_body(404, Bytes::new());
        assert!(!resp.is_success());
        assert!(resp.headers().is_empty());
    }
}
