//! Layers that run around every routed request.
//!
//! A [`Middleware`] gets the [`Context`] and a [`Next`] handle. Calling
//! [`Next::run`] hands the request to the following layer, and after the
//! last layer to the endpoint the router resolved. A layer may also answer
//! on its own without calling `next`.

use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Instant;

use crate::Response;
use crate::context::Context;

/// Boxed response future returned by layers and endpoints.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Type-erased request handler at the end of a chain.
pub type Endpoint = Arc<dyn Fn(Context) -> ResponseFuture + Send + Sync>;

pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, ctx: Context, next: Next) -> ResponseFuture;
}

/// The remainder of a middleware chain.
pub struct Next {
    layers: Arc<[Arc<dyn Middleware>]>,
    endpoint: Endpoint,
    position: usize,
}

impl Next {
    pub fn new(layers: Arc<[Arc<dyn Middleware>]>, endpoint: Endpoint) -> Self {
        Self {
            layers,
            endpoint,
            position: 0,
        }
    }

    pub async fn run(self, ctx: Context) -> Response {
        let Some(layer) = self.layers.get(self.position).cloned() else {
            return (self.endpoint)(ctx).await;
        };
        let rest = Next {
            position: self.position + 1,
            ..self
        };
        layer.handle(ctx, rest).await
    }
}

/// Logs one `info` line per request once the response is ready.
pub struct AccessLog;

impl Middleware for AccessLog {
    fn handle(&self, ctx: Context, next: Next) -> ResponseFuture {
        Box::pin(async move {
            let started = Instant::now();
            let method = ctx.request().method();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;

            tracing::info!(
                %method,
                %path,
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request"
            );
            response
        })
    }
}
