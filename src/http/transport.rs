//! Transport boundary.
//!
//! A [`Transport`] performs exactly one HTTP exchange: it sends a
//! [`WireRequest`] and returns the fully received [`HttpResponse`], or a
//! [`NetError`] when no response was received. Retries, redirects policy and
//! timeouts belong to the transport, not to the dispatcher.

use crate::base::context::TransportResultExt;
use crate::base::neterror::NetError;
use crate::http::requestbody::{ProgressBody, RequestBody};
use crate::http::response::HttpResponse;
use crate::http::tls;
use http::{HeaderMap, Method, Request};
use http_body_util::BodyExt;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

/// A request as it goes on the wire.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Alias for the `Future` type returned by a transport.
pub type Executing = Pin<Box<dyn Future<Output = Result<HttpResponse, NetError>> + Send>>;

/// Executes HTTP exchanges. Implementations must be thread-safe.
///
/// # Design Notes
///
/// - Uses `&self` so one transport can serve every queue slot.
/// - Returns boxed futures for trait object compatibility.
/// - Dropping the returned future must abort the exchange.
pub trait Transport: Send + Sync {
    /// Send `request`, reporting body upload progress to `progress`.
    fn execute(&self, request: WireRequest, progress: ProgressSink) -> Executing;
}

/// Blanket implementation for Arc-wrapped transports.
impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: WireRequest, progress: ProgressSink) -> Executing {
        (**self).execute(request, progress)
    }
}

type ProgressFn = dyn Fn(u64, u64) + Send + Sync;

/// Receives `(sent, total)` byte counts during body upload.
///
/// Reports that would move the count backwards are dropped, so observers
/// only ever see non-decreasing values.
#[derive(Clone, Default)]
pub struct ProgressSink {
    inner: Option<Arc<ProgressInner>>,
}

struct ProgressInner {
    callback: Box<ProgressFn>,
    high_water: AtomicU64,
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink")
            .field("active", &self.inner.is_some())
            .finish()
    }
}

impl ProgressSink {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        Self {
            inner: Some(Arc::new(ProgressInner {
                callback: Box::new(callback),
                high_water: AtomicU64::new(0),
            })),
        }
    }

    /// A sink that ignores every report.
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn report(&self, sent: u64, total: u64) {
        let Some(inner) = &self.inner else {
            return;
        };
        let previous = inner.high_water.fetch_max(sent, Ordering::AcqRel);
        if sent >= previous {
            (inner.callback)(sent, total);
        }
    }
}

/// Default transport built on hyper.
///
/// `http` targets go through a pooled client on [`HttpConnector`]. `https`
/// targets get a fresh BoringSSL connection per exchange, verified against
/// the system trust roots. Other schemes fail with
/// [`NetError::UnknownUrlScheme`].
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, ProgressBody>,
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

impl HyperTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client }
    }
}

impl Transport for HyperTransport {
    fn execute(&self, request: WireRequest, progress: ProgressSink) -> Executing {
        let client = self.client.clone();
        Box::pin(async move {
            let WireRequest {
                method,
                url,
                headers,
                body,
            } = request;

            let https = match url.scheme() {
                "http" => false,
                "https" => true,
                other => {
                    tracing::debug!(url = %url, scheme = other, "scheme not supported by HyperTransport");
                    return Err(NetError::UnknownUrlScheme);
                }
            };

            let mut req = Request::builder()
                .method(method)
                .uri(url.as_str())
                .body(body.into_progress_body(progress))
                .map_err(|_| NetError::InvalidUrl)?;
            *req.headers_mut() = headers;

            let resp = if https {
                tls::send(&url, req).await?
            } else {
                client.request(req).await.network_context(url.as_str())?
            };

            let (parts, incoming) = resp.into_parts();
            let body = incoming
                .collect()
                .await
                .network_context(url.as_str())
                .map_err(|_| NetError::HttpBodyError)?
                .to_bytes();

            tracing::debug!(url = %url, status = parts.status.as_u16(), bytes = body.len(), "response received");
            Ok(HttpResponse::new(parts.status, parts.headers, body))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_is_non_decreasing() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            ProgressSink::new(move |sent, total| seen.lock().unwrap().push((sent, total)))
        };

        sink.report(10, 100);
        sink.report(5, 100);
        sink.report(10, 100);
        sink.report(100, 100);

        assert_eq!(*seen.lock().unwrap(), vec![(10, 100), (10, 100), (100, 100)]);
    }

    #[test]
    fn test_noop_sink() {
        let sink = ProgressSink::noop();
        sink.report(1, 1);
        assert_eq!(format!("{sink:?}"), "ProgressSink { active: false }");
    }

    fn get(url: &str) -> WireRequest {
        WireRequest {
            method: Method::GET,
            url: Url::parse(url).unwrap(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    #[tokio::test]
    async fn test_hyper_transport_rejects_unknown_scheme() {
        let err = HyperTransport::new()
            .execute(get("ftp://example.com/file"), ProgressSink::noop())
            .await
            .unwrap_err();
        assert_eq!(err, NetError::UnknownUrlScheme);
    }

    #[tokio::test]
    async fn test_hyper_transport_dials_https() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HyperTransport::new()
            .execute(get(&format!("https://{addr}/")), ProgressSink::noop())
            .await
            .unwrap_err();
        assert_eq!(err, NetError::ConnectionRefused);
    }
}
