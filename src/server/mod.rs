//! Tokio TCP front end speaking HTTP/1.1 with keep-alive.
//!
//! Each accepted connection gets its own task. Requests on a connection are
//! answered in order; pipelined requests already in the buffer are parsed
//! before the socket is read again. Request bodies are read and discarded.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::{Request, Response, StatusCode};

/// Largest request head accepted before answering `431`.
const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Largest head plus body accepted before answering `413`.
const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds a listener on `addr`. Port `0` picks a free port; see
    /// [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves connections with `handler` until `shutdown` completes.
    ///
    /// Connections that are already open are left to finish on their own.
    pub async fn run_until<H, F, S>(self, handler: H, shutdown: S) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
        S: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        info!(addr = %self.local_addr, "listening");
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                () = &mut shutdown => {
                    info!("shutting down listener");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, &*handler).await {
                    debug!(%peer, error = %e, "connection ended with an error");
                }
            });
        }
    }
}

async fn serve_connection<H, F>(mut stream: TcpStream, handler: &H) -> io::Result<()>
where
    H: Fn(Request) -> F,
    F: Future<Output = Response>,
{
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        let (request, head_len) = match Request::parse(&buf) {
            Ok(Some(parsed)) => parsed,
            Ok(None) if buf.len() >= MAX_HEAD_BYTES => {
                return refuse(&mut stream, StatusCode::HEADER_FIELDS_TOO_LARGE).await;
            }
            Ok(None) => {
                if stream.read_buf(&mut buf).await? == 0 {
                    return Ok(());
                }
                continue;
            }
            Err(e) => {
                warn!(error = %e, "rejecting request");
                return refuse(&mut stream, e.status()).await;
            }
        };

        let Some(frame_len) = frame_len(head_len, request.content_length()) else {
            return refuse(&mut stream, StatusCode::PAYLOAD_TOO_LARGE).await;
        };
        while buf.len() < frame_len {
            if stream.read_buf(&mut buf).await? == 0 {
                return Ok(());
            }
        }

        let keep_alive = request.keep_alive();
        let mut response = handler(request).await;
        if !keep_alive {
            response = response.close_connection();
        }
        stream.write_all(&response.encode()).await?;
        buf.advance(frame_len);

        if !keep_alive {
            return stream.shutdown().await;
        }
    }
}

// Bytes one request occupies on the wire, or `None` past the size limit.
fn frame_len(head_len: usize, content_length: usize) -> Option<usize> {
    head_len
        .checked_add(content_length)
        .filter(|len| *len <= MAX_REQUEST_BYTES)
}

async fn refuse(stream: &mut TcpStream, status: StatusCode) -> io::Result<()> {
    let response = Response::new(status).close_connection();
    stream.write_all(&response.encode()).await?;
    stream.shutdown().await
}
