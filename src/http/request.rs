//! HTTP/1.1 request parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Why a buffer could not be turned into a [`Request`].
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request head is incomplete")]
    Incomplete,

    #[error("malformed request: {0}")]
    Parse(#[from] httparse::Error),

    #[error("request line has no {field}")]
    MissingField { field: &'static str },
}

/// A fully parsed HTTP/1.1 request.
///
/// Besides the usual accessors, a request knows its *requested URL*: the path
/// with the query string re-attached, which is what cache entries are keyed on
/// (`/api/posts?page=2` and `/api/posts?page=3` are different entries).
///
/// # Examples
///
/// ```
/// use rttp_cache::http::request::Request;
///
/// let raw = b"GET /api/posts?page=2 HTTP/1.1\r\nHost: x\r\nAuthorization: JWT abc\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.path(), "/api/posts");
/// assert_eq!(request.requested_url(), "/api/posts?page=2");
/// assert_eq!(request.authorization(), Some("JWT abc"));
/// assert_eq!(request.cookie(), None);
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Parses the head of `buf` and copies whatever follows it as the body.
    ///
    /// Also returns the offset of the first body byte, so the caller can tell
    /// whether `Content-Length` bytes have arrived yet. A head that is not
    /// complete yet yields [`RequestError::Incomplete`]; the connection loop
    /// reads more and tries again.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = match raw_req.method {
            Some(m) => m.parse::<Method>().unwrap_or_else(|never| match never {}),
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let (path, query) = match raw_path.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (raw_path.to_owned(), None),
        };

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let body = Bytes::copy_from_slice(&buf[body_offset..]);

        Ok((
            Self {
                method,
                path,
                version,
                headers: header_map,
                query,
                body,
            },
            body_offset,
        ))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the path with `?query` re-attached when a query string was sent.
    pub fn requested_url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// Minor version from the request line.
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn cookie(&self) -> Option<&str> {
        self.headers.get("cookie")
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers.get("authorization")
    }

    pub fn origin(&self) -> Option<&str> {
        self.headers.get("origin")
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// An explicit `Connection` header wins; otherwise only HTTP/1.1 persists.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}
