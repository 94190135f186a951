use thiserror::Error;

use super::{Headers, Method, StatusCode};

// Header slots offered to the parser; more fields than this is a 400.
const MAX_HEADERS: usize = 64;

/// Ways a request head can be rejected.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed request head: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("unsupported method {0:?}")]
    UnsupportedMethod(String),

    #[error("request head has no {0}")]
    Missing(&'static str),

    #[error("Content-Length is not a byte count: {0:?}")]
    InvalidContentLength(String),
}

impl RequestError {
    /// Status sent back before the connection is closed.
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::UnsupportedMethod(_) => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// A parsed request head.
///
/// Bodies are never handed to handlers; the server only uses
/// [`content_length`](Self::content_length) to skip past them.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Headers,
    keep_alive: bool,
    content_length: usize,
}

impl Request {
    /// Parses the head at the start of `buf`.
    ///
    /// Returns `Ok(None)` while the head is still incomplete, otherwise the
    /// request and the length of its head in bytes.
    ///
    /// ```
    /// use larder::{Method, Request};
    ///
    /// let raw = b"GET /recipes?format=text HTTP/1.1\r\nHost: localhost\r\n\r\n";
    /// let (request, head_len) = Request::parse(raw).unwrap().unwrap();
    /// assert_eq!(request.method(), Method::Get);
    /// assert_eq!(request.query_param("format"), Some("text"));
    /// assert_eq!(head_len, raw.len());
    ///
    /// assert!(Request::parse(b"GET /recipes HTTP/1.1\r\n").unwrap().is_none());
    /// ```
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>, RequestError> {
        let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut head = httparse::Request::new(&mut slots);
        let httparse::Status::Complete(head_len) = head.parse(buf)? else {
            return Ok(None);
        };

        let method: Method = head.method.ok_or(RequestError::Missing("method"))?.parse()?;
        let target = head.path.ok_or(RequestError::Missing("target"))?;
        let minor_version = head.version.ok_or(RequestError::Missing("version"))?;

        let mut headers = Headers::new();
        for field in head.headers.iter() {
            // Non-UTF-8 values are dropped; nothing downstream reads them.
            if let Ok(value) = std::str::from_utf8(field.value) {
                headers.append(field.name, value);
            }
        }

        let content_length = match headers.get("content-length") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| RequestError::InvalidContentLength(raw.to_owned()))?,
            None => 0,
        };
        let keep_alive = match headers.get("connection") {
            Some(value) if value.eq_ignore_ascii_case("close") => false,
            Some(value) if value.eq_ignore_ascii_case("keep-alive") => true,
            _ => minor_version >= 1,
        };

        let (path, query) = split_target(target);
        let request = Self {
            method,
            path,
            query,
            headers,
            keep_alive,
            content_length,
        };
        Ok(Some((request, head_len)))
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Target path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// First value of query parameter `name`, undecoded.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find_map(|(key, value)| (key == name).then_some(value.as_str()))
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Whether the client expects the connection to stay open afterwards.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Declared body length, `0` when the header is absent.
    pub fn content_length(&self) -> usize {
        self.content_length
    }
}

#[cfg(test)]
impl Request {
    /// Builds an HTTP/1.1 request with no headers beyond `Host`.
    pub(crate) fn for_test(method: &str, target: &str) -> Self {
        let raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        match Self::parse(raw.as_bytes()) {
            Ok(Some((request, _))) => request,
            other => panic!("bad test request {raw:?}: {other:?}"),
        }
    }
}

fn split_target(target: &str) -> (String, Vec<(String, String)>) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let pairs = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.to_owned(), value.to_owned())
        })
        .collect();
    (path.to_owned(), pairs)
}
