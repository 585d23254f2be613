//! `multipart/form-data` bodies for uploads.
//!
//! Text fields come first, then file parts, each framed as:
//!
//! ```text
//! --B\r\n
//! Content-Disposition: form-data; name="k"[; filename="f"]\r\n
//! [Content-Type: m\r\n]
//! \r\n
//! payload\r\n
//! ```
//!
//! and the body closes with `--B--\r\n`, even when there are no parts.
//!
//! ```ignore
//! use netdispatch::http::multipart::Form;
//!
//! let form = Form::new()
//!     .text("album", "trip")
//!     .file("file", "photo.png", png_bytes);
//!
//! let content_type = form.content_type();
//! let body = form.into_body();
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use std::borrow::Cow;

const DASHES: &[u8] = b"--";
const CRLF: &[u8] = b"\r\n";

/// An ordered set of parts sharing one boundary.
#[derive(Debug, Clone)]
pub struct Form {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    /// Empty form with a random `Boundary-<uuid>` boundary.
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    /// Empty form with a caller-chosen boundary. Used for reproducible bodies.
    pub fn with_boundary<B: Into<String>>(boundary: B) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn text<N, V>(self, name: N, value: V) -> Self
    where
        N: Into<Cow<'static, str>>,
        V: Into<Cow<'static, str>>,
    {
        self.part(name, Part::text(value))
    }

    /// Add a file part; its Content-Type is derived from the file name.
    pub fn file<N, F, B>(self, name: N, file_name: F, data: B) -> Self
    where
        N: Into<Cow<'static, str>>,
        F: Into<Cow<'static, str>>,
        B: Into<Bytes>,
    {
        let file_name = file_name.into();
        let mime = mime_for(&file_name);
        self.part(name, Part::bytes(data).file_name(file_name).content_type(mime))
    }

    pub fn part<N>(mut self, name: N, mut part: Part) -> Self
    where
        N: Into<Cow<'static, str>>,
    {
        part.name = name.into();
        self.parts.push(part);
        self
    }

    /// `multipart/form-data; boundary=...`
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact length of [`Form::into_body`].
    pub fn content_length(&self) -> usize {
        let framing = DASHES.len() + self.boundary.len() + CRLF.len();
        let parts: usize = self
            .parts
            .iter()
            .map(|p| framing + p.head().len() + CRLF.len() + p.data.len() + CRLF.len())
            .sum();
        parts + DASHES.len() + self.boundary.len() + DASHES.len() + CRLF.len()
    }

    pub fn into_body(self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.content_length());
        for part in &self.parts {
            part.write_to(&mut out, &self.boundary);
        }
        out.put_slice(DASHES);
        out.put_slice(self.boundary.as_bytes());
        out.put_slice(DASHES);
        out.put_slice(CRLF);
        out.freeze()
    }
}

/// One body part. The field name is set when the part is added to a form.
#[derive(Debug, Clone)]
pub struct Part {
    name: Cow<'static, str>,
    file_name: Option<Cow<'static, str>>,
    mime: Option<String>,
    data: Bytes,
}

impl Part {
    /// Text part. Text parts carry no Content-Type header.
    pub fn text<V>(value: V) -> Self
    where
        V: Into<Cow<'static, str>>,
    {
        Self::bytes(Bytes::from(value.into().into_owned()))
    }

    pub fn bytes<B>(data: B) -> Self
    where
        B: Into<Bytes>,
    {
        Self {
            name: Cow::Borrowed(""),
            file_name: None,
            mime: None,
            data: data.into(),
        }
    }

    pub fn content_type<S: Into<String>>(mut self, mime: S) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn file_name<S>(mut self, name: S) -> Self
    where
        S: Into<Cow<'static, str>>,
    {
        self.file_name = Some(name.into());
        self
    }

    /// Header lines, each terminated by CRLF.
    fn head(&self) -> String {
        let mut head = format!("Content-Disposition: form-data; name=\"{}\"", quote(&self.name));
        if let Some(file_name) = &self.file_name {
            head.push_str("; filename=\"");
            head.push_str(&quote(file_name));
            head.push('"');
        }
        head.push_str("\r\n");
        if let Some(mime) = &self.mime {
            head.push_str("Content-Type: ");
            head.push_str(mime);
            head.push_str("\r\n");
        }
        head
    }

    fn write_to(&self, out: &mut BytesMut, boundary: &str) {
        out.put_slice(DASHES);
        out.put_slice(boundary.as_bytes());
        out.put_slice(CRLF);
        out.put_slice(self.head().as_bytes());
        out.put_slice(CRLF);
        out.put_slice(&self.data);
        out.put_slice(CRLF);
    }
}

/// A named file payload for an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field_name: String,
    pub file_name: String,
    pub data: Bytes,
}

impl FilePart {
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

/// Encode text fields followed by file parts under `boundary`.
///
/// Deterministic for a given boundary.
pub fn encode<'a, I>(fields: I, files: &[FilePart], boundary: &str) -> Bytes
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let mut form = Form::with_boundary(boundary);
    for (name, value) in fields {
        form = form.text(name.to_owned(), value);
    }
    for file in files {
        form = form.file(
            file.field_name.clone(),
            file.file_name.clone(),
            file.data.clone(),
        );
    }
    form.into_body()
}

/// MIME type for a file name, by extension.
pub fn mime_for(file_name: &str) -> &'static str {
    let ext = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "heic" => "image/heic",
        "tif" | "tiff" => "image/tiff",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        _ => "application/octet-stream",
    }
}

/// Backslash-escape characters that would break a quoted header parameter.
fn quote(s: &str) -> Cow<'_, str> {
    if !s.contains(|c: char| matches!(c, '"' | '\\' | '\r' | '\n')) {
        return Cow::Borrowed(s);
    }
    let mut escaped = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

pub fn generate_boundary() -> String {
    format!("Boundary-{}", uuid::Uuid::new_v4().simple())
}
