pub mod httpcache;
pub mod multipart;
pub mod orderedheaders;
pub mod params;
pub mod requestbody;
pub mod response;
pub mod serializer;
mod tls;
pub mod transport;

// Re-exports for convenience
pub use httpcache::{CacheKey, CacheStore, MemoryStore, ResponseCache};
pub use multipart::{FilePart, Form, Part};
pub use orderedheaders::OrderedHeaderMap;
pub use params::{ParamValue, Params};
pub use requestbody::RequestBody;
pub use response::HttpResponse;
pub use transport::{HyperTransport, ProgressSink, Transport, WireRequest};
