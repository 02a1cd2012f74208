//! HTTP/1.1 response builder.
//!
//! Responses carry their body as [`Bytes`] so the cache layer can hand the same
//! buffer to the store and to the client without copying it.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use super::{Headers, StatusCode};

/// Media type written on JSON responses, including cache hits.
pub const APPLICATION_JSON: &str = "application/json";

/// A response on its way back through the middleware chain.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Response, StatusCode};
///
/// let response = Response::json(&serde_json::json!({ "id": 42 })).unwrap();
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.headers().get("content-type"), Some("application/json"));
/// assert_eq!(response.payload(), &b"{\"id\":42}"[..]);
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    keep_alive: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
            keep_alive: true,
        }
    }

    /// Serializes `value` into a `200 OK` JSON response.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] raised when `value` cannot be serialized.
    pub fn json<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(StatusCode::Ok)
            .header("Content-Type", APPLICATION_JSON)
            .body_bytes(body))
    }

    /// Appends a header; see [`Headers::insert`].
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Mutable access to the header map, for middleware decorating a downstream response.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Bytes::from(body.into());
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the body buffer. Cloning the returned [`Bytes`] is reference-counted.
    pub fn payload(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` when the `Content-Type` header names a JSON media type.
    pub fn is_json(&self) -> bool {
        self.headers
            .get("content-type")
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(APPLICATION_JSON))
    }

    /// Writes the status line, headers and body as HTTP/1.1.
    ///
    /// `Connection` and `Content-Length` are always written here; a non-empty
    /// body without a content type goes out as UTF-8 text.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.set("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);
        buf.put(self.body);

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}
