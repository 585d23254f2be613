use bytes::Bytes;
use thiserror::Error;

/// Transport-level failures: no usable HTTP response was received.
///
/// Codes follow Chromium's `net_error_list.h` where a matching entry exists.
/// Errors that have no Chromium counterpart live at -10000 and below.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Internet disconnected")]
    InternetDisconnected,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Connection timed out")]
    ConnectionTimedOut,

    // TLS Errors
    #[error("SSL protocol error")]
    SslProtocolError,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Empty response")]
    EmptyResponse,
    #[error("Response body could not be read")]
    HttpBodyError,
    #[error("HTTP/2 protocol error")]
    Http2ProtocolError,

    // Custom errors (no Chromium equivalent)
    #[error("Request aborted")]
    Aborted,

    #[error("Unknown network error ({0})")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::NameNotResolved => -105,
            NetError::InternetDisconnected => -106,
            NetError::SslProtocolError => -107,
            NetError::AddressUnreachable => -109,
            NetError::ConnectionTimedOut => -118,

            NetError::InvalidUrl => -300,
            NetError::UnknownUrlScheme => -302,
            NetError::InvalidResponse => -320,
            NetError::EmptyResponse => -324,
            NetError::Http2ProtocolError => -337,

            NetError::HttpBodyError => -10000,
            NetError::Aborted => -10001,

            NetError::Unknown(code) => *code,
        }
    }

    /// Map an I/O error kind onto the closest transport error.
    pub fn from_io_kind(kind: std::io::ErrorKind) -> Self {
        use std::io::ErrorKind;

        match kind {
            ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            ErrorKind::ConnectionReset => NetError::ConnectionReset,
            ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            ErrorKind::NotConnected | ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => {
                NetError::ConnectionClosed
            }
            ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            ErrorKind::AddrNotAvailable => NetError::AddressUnreachable,
            _ => NetError::ConnectionFailed,
        }
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -106 => NetError::InternetDisconnected,
            -107 => NetError::SslProtocolError,
            -109 => NetError::AddressUnreachable,
            -118 => NetError::ConnectionTimedOut,

            -300 => NetError::InvalidUrl,
            -302 => NetError::UnknownUrlScheme,
            -320 => NetError::InvalidResponse,
            -324 => NetError::EmptyResponse,
            -337 => NetError::Http2ProtocolError,

            -10000 => NetError::HttpBodyError,
            -10001 => NetError::Aborted,
            _ => NetError::Unknown(code),
        }
    }
}

/// Errors reported to a request's failure callback.
///
/// Every variant reaches the caller through `on_failure` only; nothing in the
/// dispatch path returns or panics with one of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    /// The request target did not parse as an absolute URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A header name or value was rejected before the request was queued.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A parameter value was not a scalar.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// The transport failed before a response was received.
    #[error("network error: {0}")]
    Network(#[from] NetError),

    /// A response arrived with a non-2xx status.
    #[error("HTTP {code}")]
    HttpStatus { code: u16, body: Bytes },

    /// A 2xx response body could not be parsed.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A file named for upload could not be read.
    #[error("upload file unreadable: {0}")]
    FileRead(String),

    /// `send` was called with no Tokio runtime to run the request on.
    #[error("no Tokio runtime available")]
    NoRuntime,
}

impl RequestError {
    /// Returns true for a non-2xx response.
    pub fn is_status(&self) -> bool {
        matches!(self, RequestError::HttpStatus { .. })
    }

    /// The HTTP status code, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RequestError::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Failures inside a cache store. Never surfaced to request callbacks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache entry too large ({size} bytes, limit {limit})")]
    TooLarge { size: usize, limit: usize },
}
