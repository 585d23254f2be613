//! Declarative description of one HTTP exchange.

use crate::base::neterror::RequestError;
use crate::http::httpcache::CacheKey;
use crate::http::multipart::{self, FilePart};
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::params::Params;
use crate::http::requestbody::RequestBody;
use crate::http::serializer;
use crate::http::transport::WireRequest;
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Multipart field name used for uploaded data.
pub const UPLOAD_FIELD: &str = "file";

/// Body encoding for POST requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    FormUrlencoded,
    Json,
    Multipart,
}

impl ContentType {
    /// MIME type, without parameters.
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::FormUrlencoded => "application/x-www-form-urlencoded",
            ContentType::Json => "application/json",
            ContentType::Multipart => "multipart/form-data",
        }
    }
}

/// The four request kinds the dispatcher knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post(ContentType),
    Delete,
    /// Multipart upload, sent as POST.
    Upload,
}

impl RequestMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post(_) => "POST",
            RequestMethod::Delete => "DELETE",
            RequestMethod::Upload => "UPLOAD",
        }
    }

    /// The method used on the wire.
    pub fn http_method(self) -> Method {
        match self {
            RequestMethod::Get => Method::GET,
            RequestMethod::Post(_) | RequestMethod::Upload => Method::POST,
            RequestMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: RequestMethod,
    url: Url,
    headers: OrderedHeaderMap,
    params: Params,
    body: Option<Bytes>,
    files: Vec<FilePart>,
    file_paths: Vec<PathBuf>,
}

impl RequestDescriptor {
    pub fn new(method: RequestMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: OrderedHeaderMap::new(),
            params: Params::new(),
            body: None,
            files: Vec::new(),
            file_paths: Vec::new(),
        }
    }

    pub fn with_headers(mut self, headers: OrderedHeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Option<Bytes>) -> Self {
        self.body = body;
        self
    }

    pub fn with_files(mut self, files: Vec<FilePart>) -> Self {
        self.files = files;
        self
    }

    /// Files to read from disk and attach as `file` parts when the request runs.
    pub fn with_file_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.file_paths = paths;
        self
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &OrderedHeaderMap {
        &self.headers
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn files(&self) -> &[FilePart] {
        &self.files
    }

    pub fn file_paths(&self) -> &[PathBuf] {
        &self.file_paths
    }

    /// Read every pending file path into a part named after the path's last
    /// component. On error nothing is attached.
    pub async fn read_files(&mut self) -> Result<(), RequestError> {
        let mut parts = Vec::with_capacity(self.file_paths.len());
        for path in &self.file_paths {
            let data = tokio::fs::read(path)
                .await
                .map_err(|e| RequestError::FileRead(format!("{}: {e}", path.display())))?;
            parts.push(FilePart::new(UPLOAD_FIELD, part_file_name(path), data));
        }
        self.file_paths.clear();
        self.files.extend(parts);
        Ok(())
    }

    /// The cache key; only GET requests are cacheable.
    pub fn cache_key(&self) -> Option<CacheKey> {
        match self.method {
            RequestMethod::Get => Some(CacheKey::new("GET", &self.url, &self.params)),
            _ => None,
        }
    }

    /// Build the wire request using a freshly generated multipart boundary.
    pub fn to_wire(&self) -> WireRequest {
        self.to_wire_with_boundary(&multipart::generate_boundary())
    }

    /// Build the wire request.
    ///
    /// GET and DELETE carry params in the query string. POST writes them into
    /// the body unless a raw body was supplied, in which case they move to the
    /// query string. Caller headers override derived ones.
    pub fn to_wire_with_boundary(&self, boundary: &str) -> WireRequest {
        let mut headers = HeaderMap::new();
        let (url, body) = match self.method {
            RequestMethod::Get | RequestMethod::Delete => {
                (serializer::url(&self.url, &self.params), RequestBody::Empty)
            }
            RequestMethod::Post(content_type @ ContentType::FormUrlencoded)
            | RequestMethod::Post(content_type @ ContentType::Json) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type.mime()));
                match &self.body {
                    Some(raw) => (
                        serializer::url(&self.url, &self.params),
                        RequestBody::Bytes(raw.clone()),
                    ),
                    None if content_type == ContentType::Json => (
                        self.url.clone(),
                        RequestBody::Bytes(serializer::params_to_json(&self.params)),
                    ),
                    None => (
                        self.url.clone(),
                        RequestBody::from(serializer::encode_params(&self.params)),
                    ),
                }
            }
            RequestMethod::Post(ContentType::Multipart) | RequestMethod::Upload => {
                let mut files = Vec::with_capacity(self.files.len() + 1);
                if let Some(raw) = &self.body {
                    files.push(FilePart::new(
                        UPLOAD_FIELD,
                        uuid::Uuid::new_v4().to_string(),
                        raw.clone(),
                    ));
                }
                files.extend(self.files.iter().cloned());

                let fields = self.params.iter().map(|(k, v)| (k, v.to_string()));
                let body = multipart::encode(fields, &files, boundary);

                let content_type = format!("multipart/form-data; boundary={boundary}");
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    headers.insert(CONTENT_TYPE, value);
                }
                (self.url.clone(), RequestBody::Bytes(body))
            }
        };

        self.headers.apply_to(&mut headers);

        WireRequest {
            method: self.method.http_method(),
            url,
            headers,
            body,
        }
    }
}

fn part_file_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => uuid::Uuid::new_v4().to_string(),
    }
}
