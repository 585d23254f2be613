//! Request manager with builder pattern.
//!
//! Provides the public call surface: pick a method, attach headers, params
//! and callbacks, then `send()`. Sending never blocks; the request is queued
//! and its outcome arrives through the callbacks.
//!
//! # Example
//!
//! ```rust,ignore
//! use netdispatch::RequestManager;
//!
//! let manager = RequestManager::builder().max_concurrent(4).build()?;
//!
//! manager
//!     .get("http://example.com/items")
//!     .param("page", 2)
//!     .on_cached(|items| println!("stale: {items}"))
//!     .on_success(|items| println!("fresh: {items}"))
//!     .on_failure(|err| eprintln!("failed: {err}"))
//!     .send();
//! ```

use crate::base::loadstate::WorkState;
use crate::base::neterror::RequestError;
use crate::dispatch::queue::{ExecutionQueue, DEFAULT_MAX_CONCURRENT};
use crate::dispatch::request::{ContentType, RequestDescriptor, RequestMethod, UPLOAD_FIELD};
use crate::dispatch::worker::{Callbacks, FailureFn, RequestWorker, WorkControl, WorkId};
use crate::http::httpcache::{CacheStore, ResponseCache};
use crate::http::multipart::FilePart;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::params::{ParamValue, Params};
use crate::http::transport::{HyperTransport, Transport};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use url::Url;

/// Manager settings that can be loaded from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Requests allowed in flight at once.
    pub max_concurrent: usize,
    /// Strip nulls from decoded response bodies.
    pub remove_null: bool,
    /// Headers sent with every request. Per-request headers win.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            remove_null: true,
            default_headers: BTreeMap::new(),
        }
    }
}

struct ManagerInner {
    queue: ExecutionQueue,
    cache: ResponseCache,
    transport: Arc<dyn Transport>,
    remove_null: bool,
    default_headers: OrderedHeaderMap,
}

/// Entry point for issuing requests.
///
/// Each manager owns one execution queue and one response cache. Clones share
/// both; separately built managers are independent.
#[derive(Clone)]
pub struct RequestManager {
    inner: Arc<ManagerInner>,
}

impl Default for RequestManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestManager")
            .field("queue", &self.inner.queue)
            .field("cache", &self.inner.cache)
            .field("remove_null", &self.inner.remove_null)
            .field("default_headers", &self.inner.default_headers.len())
            .finish_non_exhaustive()
    }
}

impl RequestManager {
    /// Create a manager with default settings and [`HyperTransport`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                queue: ExecutionQueue::default(),
                cache: ResponseCache::default(),
                transport: Arc::new(HyperTransport::new()),
                remove_null: true,
                default_headers: OrderedHeaderMap::new(),
            }),
        }
    }

    /// Create a new manager builder.
    pub fn builder() -> RequestManagerBuilder {
        RequestManagerBuilder::default()
    }

    /// A lazily created process-wide manager with default settings.
    ///
    /// Nothing in this crate uses it implicitly.
    pub fn shared() -> &'static RequestManager {
        static SHARED: OnceLock<RequestManager> = OnceLock::new();
        SHARED.get_or_init(RequestManager::new)
    }

    /// Start building a GET request.
    pub fn get<U: AsRef<str>>(&self, url: U) -> RequestBuilder<kind::Get> {
        self.request(RequestMethod::Get, url)
    }

    /// Start building a POST request with the given body encoding.
    pub fn post<U: AsRef<str>>(&self, url: U, content_type: ContentType) -> RequestBuilder<kind::Post> {
        self.request(RequestMethod::Post(content_type), url)
    }

    /// Start building a DELETE request.
    pub fn delete<U: AsRef<str>>(&self, url: U) -> RequestBuilder<kind::Delete> {
        self.request(RequestMethod::Delete, url)
    }

    /// Start building a multipart upload of `data`.
    pub fn upload<U, B>(&self, url: U, data: B) -> RequestBuilder<kind::Upload>
    where
        U: AsRef<str>,
        B: Into<Bytes>,
    {
        let mut builder = self.request(RequestMethod::Upload, url);
        builder.body = Some(data.into());
        builder
    }

    /// Start building a multipart upload of the file at `path`.
    ///
    /// The file is read when the request runs; the part is named after the
    /// path's last component. A read error goes to `on_failure`.
    pub fn upload_file<U, P>(&self, url: U, path: P) -> RequestBuilder<kind::Upload>
    where
        U: AsRef<str>,
        P: AsRef<Path>,
    {
        self.request(RequestMethod::Upload, url).file_path(path)
    }

    /// The response cache, for removing or clearing entries.
    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// Requests currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.inner.queue.in_flight()
    }

    /// Requests waiting for a slot.
    pub fn pending(&self) -> usize {
        self.inner.queue.pending()
    }

    fn request<K, U: AsRef<str>>(&self, method: RequestMethod, url: U) -> RequestBuilder<K> {
        RequestBuilder {
            manager: self.clone(),
            method,
            url: url.as_ref().to_string(),
            headers: OrderedHeaderMap::new(),
            params: Params::new(),
            body: None,
            file_name: None,
            files: Vec::new(),
            file_paths: Vec::new(),
            callbacks: Callbacks::default(),
            error: None,
            _kind: PhantomData,
        }
    }
}

/// Builder for creating a [`RequestManager`].
pub struct RequestManagerBuilder {
    config: ManagerConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn CacheStore>>,
}

impl Default for RequestManagerBuilder {
    fn default() -> Self {
        Self {
            config: ManagerConfig::default(),
            transport: None,
            store: None,
        }
    }
}

impl fmt::Debug for RequestManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestManagerBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("custom_store", &self.store.is_some())
            .finish()
    }
}

impl RequestManagerBuilder {
    /// Replace all settings with `config`.
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of requests in flight.
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.config.max_concurrent = max;
        self
    }

    /// Keep or strip nulls in decoded bodies.
    pub fn remove_null(mut self, remove_null: bool) -> Self {
        self.config.remove_null = remove_null;
        self
    }

    /// Add a header sent with every request.
    pub fn default_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.config.default_headers.insert(name.into(), value.into());
        self
    }

    /// Use a custom transport instead of [`HyperTransport`].
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a custom cache store instead of the in-memory default.
    pub fn cache_store<S: CacheStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Build the manager. Fails if a default header is invalid.
    pub fn build(self) -> Result<RequestManager, RequestError> {
        let ManagerConfig {
            mut max_concurrent,
            remove_null,
            default_headers,
        } = self.config;

        if max_concurrent == 0 {
            tracing::warn!("max_concurrent of 0 would stall every request; using 1");
            max_concurrent = 1;
        }

        let mut headers = OrderedHeaderMap::new();
        for (name, value) in &default_headers {
            headers.insert(name, value)?;
        }

        let cache = match self.store {
            Some(store) => ResponseCache::new(store),
            None => ResponseCache::default(),
        };
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HyperTransport::new()));

        tracing::debug!(max_concurrent, remove_null, "request manager built");
        Ok(RequestManager {
            inner: Arc::new(ManagerInner {
                queue: ExecutionQueue::new(max_concurrent),
                cache,
                transport,
                remove_null,
                default_headers: headers,
            }),
        })
    }
}

/// Marker types selecting which builder methods are available.
pub mod kind {
    /// GET: may register `on_cached`.
    #[derive(Debug)]
    pub enum Get {}
    /// POST: may carry a raw body and report upload progress.
    #[derive(Debug)]
    pub enum Post {}
    #[derive(Debug)]
    pub enum Delete {}
    /// UPLOAD: multipart POST of caller data.
    #[derive(Debug)]
    pub enum Upload {}
}

/// Builder for a single request.
#[must_use = "requests are not queued until `send` is called"]
pub struct RequestBuilder<K> {
    manager: RequestManager,
    method: RequestMethod,
    url: String,
    headers: OrderedHeaderMap,
    params: Params,
    body: Option<Bytes>,
    file_name: Option<String>,
    files: Vec<FilePart>,
    file_paths: Vec<PathBuf>,
    callbacks: Callbacks,
    error: Option<RequestError>,
    _kind: PhantomData<K>,
}

impl<K> fmt::Debug for RequestBuilder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

impl<K> RequestBuilder<K> {
    /// Keep the first builder error; it is reported at `send`.
    fn defer(&mut self, error: RequestError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Add a header. An invalid name or value fails the request at `send`.
    pub fn header<N: AsRef<str>, V: AsRef<str>>(mut self, name: N, value: V) -> Self {
        if let Err(e) = self.headers.insert(name.as_ref(), value.as_ref()) {
            self.defer(e);
        }
        self
    }

    /// Add several headers.
    pub fn headers<I, N, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self = self.header(name, value);
        }
        self
    }

    /// Add a parameter, replacing any earlier value for `key`.
    pub fn param<N: Into<String>, V: Into<ParamValue>>(mut self, key: N, value: V) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Merge a parameter set.
    pub fn params(mut self, params: Params) -> Self {
        for (key, value) in params.iter() {
            self.params.insert(key, value.clone());
        }
        self
    }

    /// Merge parameters from a flat JSON object. Nested values fail the
    /// request at `send`.
    pub fn params_json(mut self, value: Value) -> Self {
        match Params::from_json(value) {
            Ok(params) => self.params(params),
            Err(e) => {
                self.defer(e);
                self
            }
        }
    }

    /// Called with the decoded body of a 2xx response.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.callbacks.success = Some(Box::new(f));
        self
    }

    /// Called once with the reason the request did not succeed.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RequestError) + Send + 'static,
    {
        self.callbacks.failure = Some(Box::new(f));
        self
    }

    /// Validate and queue the request.
    ///
    /// Validation errors, and a missing Tokio runtime, go synchronously to
    /// `on_failure` (or are logged when there is none) and the returned
    /// handle is already `Failed`.
    pub fn send(self) -> RequestHandle {
        let RequestBuilder {
            manager,
            method,
            url,
            headers,
            params,
            mut body,
            file_name,
            mut files,
            file_paths,
            mut callbacks,
            error,
            ..
        } = self;

        let parsed = match error {
            Some(e) => Err(e),
            None => parse_url(&url),
        };
        let url = match parsed {
            Ok(url) => url,
            Err(e) => return RequestHandle::rejected(e, callbacks.failure.take()),
        };
        if tokio::runtime::Handle::try_current().is_err() {
            return RequestHandle::rejected(RequestError::NoRuntime, callbacks.failure.take());
        }

        if method == RequestMethod::Upload {
            if let Some(data) = body.take() {
                let file_name = file_name.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                files.insert(0, FilePart::new(UPLOAD_FIELD, file_name, data));
            }
        }

        let mut merged = manager.inner.default_headers.clone();
        merged.merge(&headers);

        let descriptor = RequestDescriptor::new(method, url)
            .with_headers(merged)
            .with_params(params)
            .with_body(body)
            .with_files(files)
            .with_file_paths(file_paths);

        let inner = &manager.inner;
        let worker = RequestWorker::new(
            descriptor,
            inner.transport.clone(),
            inner.cache.clone(),
            callbacks,
        )
        .remove_null(inner.remove_null);

        let control = worker.control();
        control.transition(WorkState::Queued);
        tracing::debug!(id = %control.id(), method = %method, "request queued");
        inner.queue.submit(control.id(), worker.into_future());

        RequestHandle {
            control,
            queue: Some(inner.queue.clone()),
        }
    }
}

impl RequestBuilder<kind::Get> {
    /// Called with the cached body, before the network result, when the cache
    /// holds an entry for this request.
    pub fn on_cached<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.callbacks.cached = Some(Box::new(f));
        self
    }
}

impl RequestBuilder<kind::Post> {
    /// Send `body` as-is. Params then move to the query string, except for
    /// multipart where the body becomes a `file` part.
    pub fn body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Called with `(sent, total)` as the body is uploaded.
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.callbacks.progress = Some(Arc::new(f));
        self
    }
}

impl RequestBuilder<kind::Upload> {
    /// File name for the uploaded data (default: a random UUID).
    pub fn file_name<S: Into<String>>(mut self, name: S) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Attach the file at `path`, read when the request runs.
    pub fn file_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Attach an additional file part.
    pub fn file<N, F, B>(mut self, field: N, file_name: F, data: B) -> Self
    where
        N: Into<String>,
        F: Into<String>,
        B: Into<Bytes>,
    {
        self.files.push(FilePart::new(field, file_name, data));
        self
    }

    /// Called with `(sent, total)` as the body is uploaded.
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.callbacks.progress = Some(Arc::new(f));
        self
    }
}

fn parse_url(raw: &str) -> Result<Url, RequestError> {
    let url = Url::parse(raw).map_err(|e| RequestError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() || url.host_str().map_or(true, str::is_empty) {
        return Err(RequestError::InvalidUrl(format!("{raw}: missing host")));
    }
    Ok(url)
}

/// Handle to a sent request.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    control: Arc<WorkControl>,
    queue: Option<ExecutionQueue>,
}

impl RequestHandle {
    fn rejected(error: RequestError, failure: Option<FailureFn>) -> Self {
        let control = WorkControl::new(WorkId::next());
        control.transition(WorkState::Failed);
        match failure {
            Some(failure) => failure(error),
            None => tracing::warn!(error = %error, "request rejected with no failure callback"),
        }
        Self {
            control,
            queue: None,
        }
    }

    pub fn id(&self) -> WorkId {
        self.control.id()
    }

    pub fn state(&self) -> WorkState {
        self.control.state()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Cancel the request. No callback fires after this returns `true`.
    pub fn cancel(&self) -> bool {
        if !self.control.cancel() {
            return false;
        }
        if let Some(queue) = &self.queue {
            if queue.remove(self.control.id()) {
                tracing::debug!(id = %self.control.id(), "removed queued request");
            }
        }
        true
    }
}
