//! Request body for POST/UPLOAD operations.

use crate::http::transport::ProgressSink;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Chunk size used when streaming a body to the transport.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Request body for HTTP methods that send data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    /// No body (GET, DELETE).
    #[default]
    Empty,
    /// Body with raw bytes.
    Bytes(Bytes),
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Bytes(Bytes::from(s))
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Bytes(Bytes::from(s.to_owned()))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl RequestBody {
    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the length of the body in bytes.
    pub fn len(&self) -> usize {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Bytes(b) => b.len(),
        }
    }

    /// The body bytes; empty for [`RequestBody::Empty`].
    pub fn as_bytes(&self) -> Bytes {
        match self {
            RequestBody::Empty => Bytes::new(),
            RequestBody::Bytes(b) => b.clone(),
        }
    }

    /// Convert into a streaming body that reports upload progress.
    pub fn into_progress_body(self, progress: ProgressSink) -> ProgressBody {
        ProgressBody::new(self.as_bytes(), DEFAULT_CHUNK_SIZE, progress)
    }
}

/// A body that yields fixed-size chunks and reports bytes handed out.
#[derive(Debug)]
pub struct ProgressBody {
    data: Bytes,
    offset: usize,
    chunk_size: usize,
    progress: ProgressSink,
}

impl ProgressBody {
    pub fn new(data: Bytes, chunk_size: usize, progress: ProgressSink) -> Self {
        Self {
            data,
            offset: 0,
            chunk_size: chunk_size.max(1),
            progress,
        }
    }
}

impl Body for ProgressBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let total = self.data.len();
        if self.offset >= total {
            return Poll::Ready(None);
        }

        let end = (self.offset + self.chunk_size).min(total);
        let chunk = self.data.slice(self.offset..end);
        self.offset = end;
        self.progress.report(end as u64, total as u64);

        Poll::Ready(Some(Ok(Frame::data(chunk))))
    }

    fn is_end_stream(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact((self.data.len() - self.offset) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_empty_body() {
        let body = RequestBody::Empty;
        assert!(body.is_empty());
        assert_eq!(body.len(), 0);
        assert!(body.as_bytes().is_empty());
    }

    #[test]
    fn test_conversions() {
        let b1: RequestBody = String::from("test").into();
        assert_eq!(b1.len(), 4);
        let b2: RequestBody = "test".into();
        assert_eq!(b2.len(), 4);
        let b3: RequestBody = vec![1u8, 2, 3].into();
        assert_eq!(b3.len(), 3);
        let b4: RequestBody = Bytes::from_static(b"raw").into();
        assert_eq!(b4.len(), 3);
    }

    #[test]
    fn test_default_is_empty() {
        assert!(RequestBody::default().is_empty());
    }

    #[tokio::test]
    async fn test_progress_body_chunks_and_reports() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            ProgressSink::new(move |sent, total| seen.lock().unwrap().push((sent, total)))
        };

        let body = ProgressBody::new(Bytes::from(vec![7u8; 10]), 4, sink);
        assert_eq!(body.size_hint().exact(), Some(10));

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected.len(), 10);
        assert_eq!(*seen.lock().unwrap(), vec![(4, 10), (8, 10), (10, 10)]);
    }

    #[tokio::test]
    async fn test_empty_progress_body_reports_nothing() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            ProgressSink::new(move |sent, total| seen.lock().unwrap().push((sent, total)))
        };

        let body = RequestBody::Empty.into_progress_body(sink);
        assert!(body.is_end_stream());
        let collected = body.collect().await.unwrap().to_bytes();
        assert!(collected.is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }
}
