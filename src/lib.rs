//! # netdispatch
//!
//! An asynchronous HTTP request layer with bounded concurrency.
//!
//! `netdispatch` queues GET/POST/DELETE/UPLOAD requests, runs at most N of
//! them at once, serves repeat GETs from a cache-aside response cache, and
//! builds multipart bodies for uploads. Results are delivered through
//! callbacks.
//!
//! ## Features
//!
//! - **Bounded Dispatch**: FIFO queue, `max_concurrent` in flight (default 5)
//! - **Cache-Aside GETs**: cached body delivered first, fresh result after
//! - **Multipart Uploads**: deterministic `multipart/form-data` encoding
//! - **Pluggable Boundaries**: swap the [`Transport`] or the [`CacheStore`]
//! - **Cancellation**: queued or running requests go silent on `cancel()`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use netdispatch::{ContentType, RequestManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = RequestManager::new();
//!     manager
//!         .post("http://localhost:8080/items", ContentType::Json)
//!         .param("name", "widget")
//!         .on_success(|value| println!("created: {value}"))
//!         .on_failure(|err| eprintln!("failed: {err}"))
//!         .send();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error taxonomy and request lifecycle states
//! - [`client`] - Request manager, builders and handles
//! - [`dispatch`] - Request descriptors, workers and the execution queue
//! - [`http`] - Serializer, multipart encoder, response cache and transport

pub mod base;
pub mod client;
pub mod dispatch;
pub mod http;

pub use base::loadstate::WorkState;
pub use base::neterror::{CacheError, NetError, RequestError};
pub use client::{ManagerConfig, RequestBuilder, RequestHandle, RequestManager, RequestManagerBuilder};
pub use dispatch::{ContentType, RequestDescriptor, RequestMethod, WorkId};
pub use http::{CacheKey, CacheStore, HttpResponse, MemoryStore, ParamValue, Params, ResponseCache, Transport};
