//! HTTPS exchanges over BoringSSL.
//!
//! Each exchange opens its own connection: DNS, TCP, TLS handshake with the
//! system trust roots, then one HTTP/1.1 request.

use crate::base::context::TransportResultExt;
use crate::base::neterror::NetError;
use crate::http::requestbody::ProgressBody;
use boring::ssl::{SslConnector, SslMethod};
use http::header::{HeaderValue, HOST};
use http::{Request, Response};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio_boring::SslStream;
use url::{Position, Url};

/// ALPN list offered during the handshake. Only HTTP/1.1 is spoken here.
const ALPN_HTTP1: &[u8] = b"\x08http/1.1";

/// Resolve and connect to `url`'s host, then complete a TLS handshake.
pub(crate) async fn connect(url: &Url) -> Result<SslStream<TcpStream>, NetError> {
    let host = url.host_str().ok_or(NetError::InvalidUrl)?;
    let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;

    let addrs = tokio::net::lookup_host(format!("{host}:{port}"))
        .await
        .map_err(|_| NetError::NameNotResolved)?;

    let mut last = NetError::NameNotResolved;
    let mut stream = None;
    for addr in addrs {
        match TcpStream::connect(addr).await.network_context(url.as_str()) {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(e) => last = e,
        }
    }
    let stream = stream.ok_or(last)?;

    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;
    builder
        .set_alpn_protos(ALPN_HTTP1)
        .map_err(|_| NetError::SslProtocolError)?;
    let config = builder
        .build()
        .configure()
        .map_err(|_| NetError::SslProtocolError)?;

    // IPv6 literals come back bracketed from `host_str`.
    let domain = host.trim_start_matches('[').trim_end_matches(']');
    tokio_boring::connect(config, domain, stream)
        .await
        .map_err(|e| {
            tracing::debug!(url = %url, error = %e, "TLS handshake failed");
            NetError::SslProtocolError
        })
}

/// Send `req` to `url` over a fresh TLS connection.
///
/// The request target is rewritten to origin form and `Host` is filled in
/// when the caller did not set one.
pub(crate) async fn send(
    url: &Url,
    mut req: Request<ProgressBody>,
) -> Result<Response<Incoming>, NetError> {
    let origin = &url[Position::BeforePath..];
    *req.uri_mut() = origin.parse().map_err(|_| NetError::InvalidUrl)?;
    if !req.headers().contains_key(HOST) {
        let authority = &url[Position::BeforeHost..Position::AfterPort];
        let value = HeaderValue::from_str(authority).map_err(|_| NetError::InvalidUrl)?;
        req.headers_mut().insert(HOST, value);
    }

    let tls = connect(url).await?;
    let (mut sender, conn) = http1::handshake(TokioIo::new(tls))
        .await
        .network_context(url.as_str())?;

    let target = url.to_string();
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(url = %target, error = %e, "TLS connection closed with error");
        }
    });

    sender.send_request(req).await.network_context(url.as_str())
}
