//! Ergonomic error context helpers.
//!
//! Converts errors raised by the HTTP stack into [`NetError`] codes, logging
//! the original error with the target it was raised for.

use crate::base::neterror::NetError;
use std::error::Error as StdError;
use std::io;

/// Extension trait for attaching a request target to transport failures.
pub trait TransportResultExt<T> {
    /// Map the error to a [`NetError`], logging it against `target`.
    ///
    /// # Example
    /// ```ignore
    /// use netdispatch::base::context::TransportResultExt;
    ///
    /// let resp = client.request(req).await.network_context(url.as_str())?;
    /// ```
    fn network_context(self, target: &str) -> Result<T, NetError>;
}

impl<T, E> TransportResultExt<T> for Result<T, E>
where
    E: StdError + 'static,
{
    fn network_context(self, target: &str) -> Result<T, NetError> {
        self.map_err(|e| {
            let net = classify(&e);
            tracing::debug!(target_url = %target, error = %e, code = net.as_i32(), "transport error");
            net
        })
    }
}

/// Walk an error's source chain looking for something we can classify.
pub fn classify(err: &(dyn StdError + 'static)) -> NetError {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return NetError::from_io_kind(io_err.kind());
        }
        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() {
                return NetError::EmptyResponse;
            }
            if hyper_err.is_parse() {
                return NetError::InvalidResponse;
            }
            if hyper_err.is_canceled() {
                return NetError::ConnectionAborted;
            }
            if hyper_err.is_timeout() {
                return NetError::ConnectionTimedOut;
            }
        }
        current = e.source();
    }
    NetError::ConnectionFailed
}
