//! Request inspection: what one request did to the database and the cache.
//!
//! A [`RequestTrace`] bundles a [`QueryLog`] and a [`CacheLog`] for a single
//! unit of work. [`TraceMiddleware`] creates one per request, makes it
//! available to handlers through the context extensions and summarizes it in
//! response headers:
//!
//! | Header          | Value                                     |
//! |-----------------|-------------------------------------------|
//! | `X-Query-Count` | database round-trips made by the request  |
//! | `X-Cache-Ops`   | operations sent to the cache backend      |
//! | `X-Cache`       | `hit`, `miss`, or `bypass` (no lookup)    |

use std::sync::Arc;

use crate::Response;
use crate::cache::CacheLog;
use crate::context::Context;
use crate::database::QueryLog;
use crate::middleware::{Middleware, Next, ResponseFuture};

pub const QUERY_COUNT_HEADER: &str = "X-Query-Count";
pub const CACHE_OPS_HEADER: &str = "X-Cache-Ops";
pub const CACHE_STATUS_HEADER: &str = "X-Cache";

/// Database and cache activity of one unit of work.
#[derive(Debug, Default)]
pub struct RequestTrace {
    queries: QueryLog,
    cache: CacheLog,
}

impl RequestTrace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queries(&self) -> &QueryLog {
        &self.queries
    }

    pub fn cache(&self) -> &CacheLog {
        &self.cache
    }

    /// Clears both logs so the trace can measure a fresh unit of work.
    pub fn reset(&self) {
        self.queries.reset();
        self.cache.reset();
    }

    /// Returns the trace attached to `ctx`, or a detached one when the request
    /// did not pass through [`TraceMiddleware`].
    pub fn from_context(ctx: &Context) -> Arc<Self> {
        ctx.extensions()
            .get::<Arc<Self>>()
            .cloned()
            .unwrap_or_else(Self::new)
    }

    fn write_headers(&self, response: &mut Response) {
        let status = self
            .cache
            .outcome()
            .map_or("bypass", |outcome| outcome.as_str());
        response.add_header(QUERY_COUNT_HEADER, self.queries.count().to_string());
        response.add_header(CACHE_OPS_HEADER, self.cache.count().to_string());
        response.add_header(CACHE_STATUS_HEADER, status);
    }
}

/// Attaches a fresh [`RequestTrace`] to every request and reports it in the
/// response headers and a `debug` log line.
pub struct TraceMiddleware;

impl Middleware for TraceMiddleware {
    fn handle(&self, mut ctx: Context, next: Next) -> ResponseFuture {
        Box::pin(async move {
            let trace = RequestTrace::new();
            ctx.extensions_mut().insert(Arc::clone(&trace));
            let path = ctx.request().path().to_owned();

            let mut response = next.run(ctx).await;

            tracing::debug!(
                path = %path,
                queries = trace.queries().count(),
                cache_ops = trace.cache().count(),
                "request trace"
            );
            trace.write_headers(&mut response);
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheOpKind, Outcome};
    use crate::middleware::{Endpoint, ResponseFuture};
    use crate::{Request, StatusCode};

    async fn traced(endpoint: Endpoint) -> Response {
        let layers: Vec<Arc<dyn Middleware>> = vec![Arc::new(TraceMiddleware)];
        Next::new(Arc::from(layers), endpoint)
            .run(Context::new(Request::for_test("GET", "/recipes")))
            .await
    }

    #[test]
    fn detached_trace_when_middleware_absent() {
        let ctx = Context::new(Request::for_test("GET", "/recipes"));
        let trace = RequestTrace::from_context(&ctx);
        assert_eq!(trace.queries().count(), 0);
    }

    #[test]
    fn reset_clears_both_logs() {
        let trace = RequestTrace::new();
        trace.queries().record("SELECT 1");
        trace.cache().record(CacheOpKind::Get, ":1:recipes");
        trace.cache().mark(Outcome::Hit);
        trace.reset();
        assert_eq!(trace.queries().count(), 0);
        assert_eq!(trace.cache().count(), 0);
        assert_eq!(trace.cache().outcome(), None);
    }

    #[tokio::test]
    async fn middleware_injects_trace_and_reports_headers() {
        let response = traced(Arc::new(|ctx: Context| -> ResponseFuture {
            Box::pin(async move {
                let trace = RequestTrace::from_context(&ctx);
                trace.queries().record("SELECT id, name FROM recipe ORDER BY id");
                trace.queries().record("SELECT 2");
                trace.cache().record(CacheOpKind::Get, ":1:recipes");
                trace.cache().mark(Outcome::Miss);
                Response::new(StatusCode::OK)
            })
        }))
        .await;

        assert_eq!(response.headers().get(QUERY_COUNT_HEADER), Some("2"));
        assert_eq!(response.headers().get(CACHE_OPS_HEADER), Some("1"));
        assert_eq!(response.headers().get(CACHE_STATUS_HEADER), Some("miss"));
    }

    #[tokio::test]
    async fn bypass_when_no_lookup_happened() {
        let response = traced(Arc::new(|_ctx: Context| -> ResponseFuture {
            Box::pin(async { Response::new(StatusCode::NO_CONTENT) })
        }))
        .await;
        assert_eq!(response.headers().get(CACHE_STATUS_HEADER), Some("bypass"));
    }
}
