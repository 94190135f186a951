//! Exact-path routing with middleware layers.
//!
//! A route is a method plus a literal path; a trailing slash on either side
//! is ignored. Every request runs through the layers, including requests
//! that match no route and end in `404` or `405`.

use std::sync::Arc;

use crate::context::Context;
use crate::middleware::{Endpoint, Middleware, Next, ResponseFuture};
use crate::{Method, Request, Response, StatusCode};

struct Route {
    method: Method,
    path: String,
    endpoint: Endpoint,
}

/// Dispatches requests to the handler registered for their method and path.
///
/// ```
/// use larder::{Request, Response, Router, StatusCode};
///
/// # async fn demo() {
/// let mut router = Router::new();
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::OK).text("pong") });
///
/// let (request, _) = Request::parse(b"GET /ping HTTP/1.1\r\n\r\n").unwrap().unwrap();
/// assert_eq!(router.dispatch(request).await.payload(), b"pong");
/// # }
/// ```
pub struct Router {
    routes: Vec<Route>,
    layers: Arc<[Arc<dyn Middleware>]>,
}

impl Default for Router {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            layers: Arc::from(Vec::new()),
        }
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.on(Method::Get, path, handler);
    }

    pub fn post<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.on(Method::Post, path, handler);
    }

    /// Registers `handler` for `method` on `path`. When the same pair is
    /// registered twice the first registration wins.
    pub fn on<H, F>(&mut self, method: Method, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let endpoint: Endpoint =
            Arc::new(move |ctx: Context| -> ResponseFuture { Box::pin(handler(ctx)) });
        self.routes.push(Route {
            method,
            path: trim_slash(path).to_owned(),
            endpoint,
        });
    }

    /// Adds a layer inside the ones already added; the first layer sees the
    /// request first and the response last.
    pub fn layer(&mut self, middleware: impl Middleware) {
        let layer: Arc<dyn Middleware> = Arc::new(middleware);
        self.layers = self.layers.iter().cloned().chain([layer]).collect();
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        let endpoint = self.resolve(request.method(), request.path());
        Next::new(Arc::clone(&self.layers), endpoint)
            .run(Context::new(request))
            .await
    }

    fn resolve(&self, method: Method, path: &str) -> Endpoint {
        let path = trim_slash(path);
        let mut allowed: Vec<&'static str> = Vec::new();
        for route in self.routes.iter().filter(|route| route.path == path) {
            if route.method == method {
                return Arc::clone(&route.endpoint);
            }
            allowed.push(route.method.as_str());
        }

        if allowed.is_empty() {
            return Arc::new(|_ctx: Context| -> ResponseFuture {
                Box::pin(async { Response::new(StatusCode::NOT_FOUND) })
            });
        }
        let allow = allowed.join(", ");
        Arc::new(move |_ctx: Context| -> ResponseFuture {
            let response =
                Response::new(StatusCode::METHOD_NOT_ALLOWED).header("Allow", allow.clone());
            Box::pin(async move { response })
        })
    }
}

fn trim_slash(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}
