//! Tests for `HyperTransport` against a loopback HTTP/1.1 server.

use bytes::Bytes;
use netdispatch::base::neterror::{NetError, RequestError};
use netdispatch::http::transport::{HyperTransport, ProgressSink, Transport, WireRequest};
use netdispatch::http::RequestBody;
use netdispatch::{CacheKey, Params, RequestManager};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use url::Url;

/// What the server saw: request head and body.
#[derive(Debug)]
struct Captured {
    head: String,
    body: Vec<u8>,
}

async fn read_request(socket: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8(buf[..header_end].to_vec()).unwrap();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        body.extend_from_slice(&chunk[..n]);
    }
    Captured { head, body }
}

/// Serve `responses` one connection at a time, reporting each request.
async fn serve(responses: Vec<&'static str>) -> (SocketAddr, mpsc::UnboundedReceiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for response in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let captured = read_request(&mut socket).await;
            let _ = tx.send(captured);
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
    });
    (addr, rx)
}

fn json_response(status: &str, body: &str) -> &'static str {
    Box::leak(
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .into_boxed_str(),
    )
}

// === Raw transport ===

#[tokio::test]
async fn test_get_round_trip() {
    let (addr, mut seen) = serve(vec![json_response("200 OK", r#"{"ok":true}"#)]).await;
    let transport = HyperTransport::new();

    let mut headers = http::HeaderMap::new();
    headers.insert("x-trace", http::HeaderValue::from_static("abc"));
    let request = WireRequest {
        method: http::Method::GET,
        url: Url::parse(&format!("http://{addr}/status?verbose=1")).unwrap(),
        headers,
        body: RequestBody::Empty,
    };

    let response = transport
        .execute(request, ProgressSink::noop())
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), &Bytes::from(r#"{"ok":true}"#));
    assert_eq!(response.headers()["content-type"], "application/json");

    let captured = seen.recv().await.unwrap();
    assert!(captured.head.starts_with("GET /status?verbose=1 HTTP/1.1\r\n"));
    assert!(captured.head.to_ascii_lowercase().contains("x-trace: abc"));
}

#[tokio::test]
async fn test_post_body_streams_with_progress() {
    let (addr, mut seen) = serve(vec![json_response("201 Created", "{}")]).await;
    let transport = HyperTransport::new();

    let payload = Bytes::from(vec![b'z'; 40 * 1024]);
    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let progress = progress.clone();
        ProgressSink::new(move |sent, total| progress.lock().unwrap().push((sent, total)))
    };

    let request = WireRequest {
        method: http::Method::POST,
        url: Url::parse(&format!("http://{addr}/blob")).unwrap(),
        headers: http::HeaderMap::new(),
        body: RequestBody::Bytes(payload.clone()),
    };
    let response = transport.execute(request, sink).await.unwrap();
    assert_eq!(response.status(), 201);

    let captured = seen.recv().await.unwrap();
    assert_eq!(captured.body, payload.to_vec());

    let progress = progress.lock().unwrap().clone();
    let total = payload.len() as u64;
    assert_eq!(progress.first(), Some(&(16 * 1024, total)));
    assert_eq!(progress.last(), Some(&(total, total)));
    assert!(progress.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let request = WireRequest {
        method: http::Method::GET,
        url: Url::parse(&format!("http://{addr}/")).unwrap(),
        headers: http::HeaderMap::new(),
        body: RequestBody::Empty,
    };
    let err = HyperTransport::new()
        .execute(request, ProgressSink::noop())
        .await
        .unwrap_err();
    assert_ne!(err, NetError::UnknownUrlScheme);
    assert!(err.as_i32() < 0);
}

// === Through the manager ===

#[tokio::test]
async fn test_manager_get_then_cached() {
    let body = r#"{"user":{"id":1,"email":null}}"#;
    let (addr, mut seen) = serve(vec![json_response("200 OK", body), json_response("200 OK", body)]).await;
    let manager = RequestManager::new();
    let url = format!("http://{addr}/users/1");

    let (tx, rx) = oneshot::channel();
    manager
        .get(&url)
        .param("expand", "profile")
        .on_success(move |v| {
            let _ = tx.send(v);
        })
        .send();
    let first = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, json!({"user": {"id": 1}}));

    let captured = seen.recv().await.unwrap();
    assert!(captured.head.starts_with("GET /users/1?expand=profile HTTP/1.1"));

    let key = CacheKey::new(
        "GET",
        &Url::parse(&url).unwrap(),
        &Params::new().with("expand", "profile"),
    );
    assert_eq!(manager.cache().lookup(&key), Some(Bytes::from(body)));

    let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let (tx, rx) = oneshot::channel::<Value>();
    let (c, s) = (order.clone(), order.clone());
    manager
        .get(&url)
        .param("expand", "profile")
        .on_cached(move |_| c.lock().unwrap().push("cached"))
        .on_success(move |v| {
            s.lock().unwrap().push("success");
            let _ = tx.send(v);
        })
        .send();
    tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["cached", "success"]);
}

#[tokio::test]
async fn test_manager_delete_404() {
    let (addr, _seen) = serve(vec![json_response("404 Not Found", r#"{"error":"gone"}"#)]).await;
    let manager = RequestManager::new();

    let (tx, rx) = oneshot::channel();
    manager
        .delete(format!("http://{addr}/items/3"))
        .on_success(|_| panic!("404 must not succeed"))
        .on_failure(move |e| {
            let _ = tx.send(e);
        })
        .send();

    let err = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        err,
        RequestError::HttpStatus {
            code: 404,
            body: Bytes::from(r#"{"error":"gone"}"#),
        }
    );
}

#[tokio::test]
async fn test_manager_https_attempts_tls_handshake() {
    // A plain-text server: the TLS handshake must be attempted and rejected.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}")
            .await;
        let _ = socket.shutdown().await;
    });

    let manager = RequestManager::new();
    let (tx, rx) = oneshot::channel();
    manager
        .get(format!("https://{addr}/items"))
        .on_failure(move |e| {
            let _ = tx.send(e);
        })
        .send();
    let err = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(err, RequestError::Network(NetError::SslProtocolError));
}
