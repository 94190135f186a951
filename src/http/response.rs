use std::fmt::Write as _;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use super::{Headers, StatusCode};

/// An outgoing response.
///
/// `Content-Length` and `Connection` are computed when the response is
/// [encoded](Self::encode) and must not be set by hand.
///
/// ```
/// use larder::{Response, StatusCode};
///
/// let wire = Response::new(StatusCode::OK).text("ready").encode();
/// let text = std::str::from_utf8(&wire).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.ends_with("Content-Length: 5\r\n\r\nready"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    close: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
            close: false,
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    /// Appends a header to a response produced further down the chain.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.append(name, value);
    }

    /// Plain-text UTF-8 body.
    #[must_use]
    pub fn text(self, body: impl Into<String>) -> Self {
        self.with_body("text/plain; charset=utf-8", body.into().into_bytes())
    }

    /// JSON body. A value that fails to serialize turns the whole response
    /// into a bodiless `500`.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => self.with_body("application/json", body),
            Err(e) => {
                tracing::error!(error = %e, "response body did not serialize");
                Response {
                    close: self.close,
                    ..Response::new(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        }
    }

    /// Marks the connection to be closed after this response.
    #[must_use]
    pub fn close_connection(mut self) -> Self {
        self.close = true;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn payload(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the status line, headers and body.
    pub fn encode(&self) -> BytesMut {
        let mut head = format!("HTTP/1.1 {}\r\n", self.status);
        for (name, value) in self.headers.iter() {
            let _ = write!(head, "{name}: {value}\r\n");
        }
        let connection = if self.close { "close" } else { "keep-alive" };
        let _ = write!(
            head,
            "Connection: {connection}\r\nContent-Length: {}\r\n\r\n",
            self.body.len()
        );

        let mut wire = BytesMut::with_capacity(head.len() + self.body.len());
        wire.put_slice(head.as_bytes());
        wire.put_slice(&self.body);
        wire
    }

    fn with_body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self.headers.remove("content-type");
        self.headers.append("Content-Type", content_type);
        self.body = Bytes::from(body);
        self
    }
}
