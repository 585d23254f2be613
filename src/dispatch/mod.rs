pub mod queue;
pub mod request;
pub mod worker;

pub use queue::ExecutionQueue;
pub use request::{ContentType, RequestDescriptor, RequestMethod, UPLOAD_FIELD};
pub use worker::{Callbacks, RequestWorker, WorkControl, WorkId};
