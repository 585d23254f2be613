//! Request worker: the unit of work scheduled by the execution queue.
//!
//! A worker owns one [`RequestDescriptor`] and drives it through
//! `Queued → Running → {Succeeded, Failed, Cancelled}`:
//!
//! 1. For GET, a cached body (if any) is decoded and handed to `cached`
//!    before the network call. The network call still happens.
//! 2. Files named by path are read, then the wire request is executed on
//!    the transport. An unreadable file fails the request.
//! 3. The outcome is classified; 2xx GET bodies are written to the cache
//!    before `success` runs.
//!
//! Exactly one of `success`/`failure` fires unless the work is cancelled,
//! in which case nothing fires.

use crate::base::loadstate::{AtomicWorkState, WorkState};
use crate::base::neterror::RequestError;
use crate::dispatch::request::RequestDescriptor;
use crate::http::httpcache::ResponseCache;
use crate::http::response::HttpResponse;
use crate::http::serializer;
use crate::http::transport::{ProgressSink, Transport};
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub type SuccessFn = Box<dyn FnOnce(Value) + Send>;
pub type FailureFn = Box<dyn FnOnce(RequestError) + Send>;
pub type CachedFn = Box<dyn FnOnce(Value) + Send>;
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Identifier of a queued request, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkId(u64);

impl WorkId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        WorkId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The four callback slots of one request.
#[derive(Default)]
pub struct Callbacks {
    pub success: Option<SuccessFn>,
    pub failure: Option<FailureFn>,
    pub cached: Option<CachedFn>,
    pub progress: Option<ProgressFn>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("success", &self.success.is_some())
            .field("failure", &self.failure.is_some())
            .field("cached", &self.cached.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// State shared between a worker and the handles that observe it.
#[derive(Debug)]
pub struct WorkControl {
    id: WorkId,
    state: AtomicWorkState,
    abort: AbortHandle,
    registration: Mutex<Option<AbortRegistration>>,
}

impl WorkControl {
    pub fn new(id: WorkId) -> Arc<Self> {
        let (abort, registration) = AbortHandle::new_pair();
        Arc::new(Self {
            id,
            state: AtomicWorkState::default(),
            abort,
            registration: Mutex::new(Some(registration)),
        })
    }

    pub fn id(&self) -> WorkId {
        self.id
    }

    pub fn state(&self) -> WorkState {
        self.state.load()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    pub(crate) fn transition(&self, next: WorkState) -> bool {
        self.state.transition(next)
    }

    /// Cancel the work. Returns false if it had already finished.
    pub fn cancel(&self) -> bool {
        if self.state.transition(WorkState::Cancelled) {
            self.abort.abort();
            true
        } else {
            false
        }
    }

    fn take_registration(&self) -> Option<AbortRegistration> {
        self.registration
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

/// One scheduled HTTP exchange plus its callbacks.
pub struct RequestWorker {
    request: RequestDescriptor,
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    remove_null: bool,
    callbacks: Callbacks,
    control: Arc<WorkControl>,
}

impl fmt::Debug for RequestWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestWorker")
            .field("id", &self.control.id)
            .field("method", &self.request.method())
            .field("url", &self.request.url().as_str())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

impl RequestWorker {
    pub fn new(
        request: RequestDescriptor,
        transport: Arc<dyn Transport>,
        cache: ResponseCache,
        callbacks: Callbacks,
    ) -> Self {
        Self {
            request,
            transport,
            cache,
            remove_null: true,
            callbacks,
            control: WorkControl::new(WorkId::next()),
        }
    }

    /// Keep or strip nulls when decoding response bodies (default: strip).
    pub fn remove_null(mut self, remove_null: bool) -> Self {
        self.remove_null = remove_null;
        self
    }

    pub fn id(&self) -> WorkId {
        self.control.id
    }

    pub fn control(&self) -> Arc<WorkControl> {
        self.control.clone()
    }

    /// Wrap the run future so cancellation aborts it at its next poll.
    pub fn into_future(self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let control = self.control.clone();
        let registration = control.take_registration();
        async move {
            match registration {
                Some(registration) => {
                    if Abortable::new(self.run(), registration).await.is_err() {
                        tracing::debug!(id = %control.id, "request aborted");
                    }
                }
                None => self.run().await,
            }
        }
    }

    /// Drive the request to completion.
    pub async fn run(mut self) {
        let control = self.control.clone();
        if !control.transition(WorkState::Running) {
            tracing::debug!(id = %control.id, "skipping cancelled request");
            return;
        }

        let method = self.request.method();
        let url = self.request.url().clone();
        tracing::debug!(id = %control.id, method = %method, url = %url, "request started");

        let cache_key = self.request.cache_key();
        if let (Some(key), Some(cached)) = (&cache_key, self.callbacks.cached.take()) {
            if let Some(bytes) = self.cache.lookup(key) {
                match serializer::decode(&bytes, self.remove_null) {
                    Ok(value) if !control.is_cancelled() => {
                        tracing::debug!(id = %control.id, key = %key, "serving cached response");
                        cached(value);
                    }
                    Ok(_) => return,
                    Err(e) => {
                        tracing::debug!(id = %control.id, key = %key, error = %e, "cached body did not decode");
                    }
                }
            }
        }

        let progress = match self.callbacks.progress.take() {
            Some(callback) => {
                let control = control.clone();
                ProgressSink::new(move |sent, total| {
                    if !control.is_cancelled() {
                        callback(sent, total);
                    }
                })
            }
            None => ProgressSink::noop(),
        };

        let outcome = match self.request.read_files().await {
            Ok(()) => {
                let wire = self.request.to_wire();
                match self.transport.execute(wire, progress).await {
                    Ok(response) => {
                        classify(&response, self.remove_null).map(|value| (value, response))
                    }
                    Err(e) => Err(RequestError::Network(e)),
                }
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok((value, response)) => {
                if let Some(key) = cache_key {
                    self.cache.store(key, response.into_body());
                }
                if control.transition(WorkState::Succeeded) {
                    tracing::debug!(id = %control.id, url = %url, "request succeeded");
                    if let Some(success) = self.callbacks.success.take() {
                        success(value);
                    }
                }
            }
            Err(e) => {
                if control.transition(WorkState::Failed) {
                    tracing::debug!(id = %control.id, url = %url, error = %e, "request failed");
                    if let Some(failure) = self.callbacks.failure.take() {
                        failure(e);
                    }
                }
            }
        }
    }
}

/// Classify a received response: non-2xx is a status error, 2xx must decode.
pub fn classify(response: &HttpResponse, remove_null: bool) -> Result<Value, RequestError> {
    if !response.is_success() {
        return Err(RequestError::HttpStatus {
            code: response.status().as_u16(),
            body: response.body().clone(),
        });
    }
    serializer::decode(response.body(), remove_null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::neterror::NetError;
    use crate::dispatch::request::{ContentType, RequestMethod};
    use crate::http::httpcache::MemoryStore;
    use crate::http::transport::{Executing, WireRequest};
    use bytes::Bytes;
    use serde_json::json;
    use url::Url;

    struct Canned(Result<HttpResponse, NetError>);

    impl Transport for Canned {
        fn execute(&self, _request: WireRequest, _progress: ProgressSink) -> Executing {
            let result = self.0.clone();
            Box::pin(async move { result })
        }
    }

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Log {
        fn push(&self, s: impl Into<String>) {
            self.0.lock().unwrap().push(s.into());
        }
        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn callbacks(log: &Arc<Log>) -> Callbacks {
        let (s, f, c) = (log.clone(), log.clone(), log.clone());
        Callbacks {
            success: Some(Box::new(move |v| s.push(format!("success:{v}")))),
            failure: Some(Box::new(move |e| f.push(format!("failure:{e}")))),
            cached: Some(Box::new(move |v| c.push(format!("cached:{v}")))),
            progress: None,
        }
    }

    fn get(url: &str) -> RequestDescriptor {
        RequestDescriptor::new(RequestMethod::Get, Url::parse(url).unwrap())
    }

    #[test]
    fn test_classify() {
        let ok = HttpResponse::with_body(200, r#"{"a":1,"b":null}"#);
        assert_eq!(classify(&ok, true).unwrap(), json!({"a": 1}));

        let err = classify(&HttpResponse::with_body(500, "oops"), true).unwrap_err();
        assert_eq!(err.status_code(), Some(500));

        let err = classify(&HttpResponse::with_body(200, "<html>"), true).unwrap_err();
        assert!(matches!(err, RequestError::Deserialization(_)));
    }

    #[tokio::test]
    async fn test_success_writes_cache_then_calls_success() {
        let cache = ResponseCache::new(Arc::new(MemoryStore::new()));
        let log = Arc::new(Log::default());
        let transport = Arc::new(Canned(Ok(HttpResponse::with_body(200, r#"{"v":1}"#))));

        let request = get("https://x.com/a");
        let key = request.cache_key().unwrap();
        RequestWorker::new(request, transport, cache.clone(), callbacks(&log))
            .run()
            .await;

        assert_eq!(log.entries(), vec![r#"success:{"v":1}"#]);
        assert_eq!(cache.lookup(&key), Some(Bytes::from(r#"{"v":1}"#)));
    }

    #[tokio::test]
    async fn test_cached_fires_before_terminal() {
        let cache = ResponseCache::new(Arc::new(MemoryStore::new()));
        let request = get("https://x.com/a");
        cache.store(request.cache_key().unwrap(), Bytes::from(r#"{"old":true}"#));

        let log = Arc::new(Log::default());
        let transport = Arc::new(Canned(Err(NetError::ConnectionRefused)));
        RequestWorker::new(request, transport, cache, callbacks(&log))
            .run()
            .await;

        assert_eq!(
            log.entries(),
            vec![
                r#"cached:{"old":true}"#.to_string(),
                "failure:network error: Connection refused".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_post_never_touches_cache() {
        let cache = ResponseCache::new(Arc::new(MemoryStore::new()));
        let url = Url::parse("https://x.com/a").unwrap();
        let post = RequestDescriptor::new(RequestMethod::Post(ContentType::Json), url.clone());
        cache.store(get("https://x.com/a").cache_key().unwrap(), Bytes::from("1"));

        let log = Arc::new(Log::default());
        let transport = Arc::new(Canned(Ok(HttpResponse::with_body(200, "2"))));
        RequestWorker::new(post, transport, cache, callbacks(&log))
            .run()
            .await;

        assert_eq!(log.entries(), vec!["success:2"]);
    }

    #[tokio::test]
    async fn test_failed_response_does_not_overwrite_cache() {
        let cache = ResponseCache::new(Arc::new(MemoryStore::new()));
        let request = get("https://x.com/a");
        let key = request.cache_key().unwrap();
        cache.store(key.clone(), Bytes::from("1"));

        let log = Arc::new(Log::default());
        let transport = Arc::new(Canned(Ok(HttpResponse::with_body(503, "down"))));
        RequestWorker::new(request, transport, cache.clone(), callbacks(&log))
            .run()
            .await;

        assert_eq!(cache.lookup(&key), Some(Bytes::from("1")));
        assert_eq!(log.entries(), vec!["cached:1", "failure:HTTP 503"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_run_is_silent() {
        let log = Arc::new(Log::default());
        let transport = Arc::new(Canned(Ok(HttpResponse::with_body(200, "1"))));
        let worker = RequestWorker::new(
            get("https://x.com/a"),
            transport,
            ResponseCache::default(),
            callbacks(&log),
        );
        let control = worker.control();
        assert!(control.cancel());
        worker.into_future().await;

        assert!(log.entries().is_empty());
        assert_eq!(control.state(), WorkState::Cancelled);
        assert!(!control.cancel());
    }
}
