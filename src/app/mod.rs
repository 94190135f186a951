//! HTTP surface of the cookbook.
//!
//! | Route                    | Response                                   |
//! |--------------------------|--------------------------------------------|
//! | `GET /recipes`           | cached listing (`?format=text` for text)   |
//! | `GET /recipes/uncached`  | listing straight from the database         |
//! | `POST /cache/clear`      | `204 No Content` after flushing the cache  |
//!
//! Every route runs behind [`AccessLog`] and [`TraceMiddleware`], so
//! responses carry the per-request inspection headers.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::context::Context;
use crate::cookbook::{Cookbook, CookbookError};
use crate::middleware::AccessLog;
use crate::model::Recipe;
use crate::trace::{RequestTrace, TraceMiddleware};
use crate::{Response, Router, StatusCode};

#[derive(Serialize)]
struct RecipeList<'a> {
    recipes: &'a [Recipe],
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// Builds the application router around a shared [`Cookbook`].
pub fn build_router(cookbook: Arc<Cookbook>) -> Router {
    let mut router = Router::new();
    router.layer(AccessLog);
    router.layer(TraceMiddleware);

    let cached = Arc::clone(&cookbook);
    router.get("/recipes", move |ctx: Context| {
        let cookbook = Arc::clone(&cached);
        async move {
            let trace = RequestTrace::from_context(&ctx);
            match cookbook.get_recipes_with_cache(&trace).await {
                Ok(recipes) if ctx.request().query_param("format") == Some("text") => {
                    Response::new(StatusCode::OK).text(render_text(&recipes))
                }
                Ok(recipes) => list_response(&recipes),
                Err(err) => error_response(&err),
            }
        }
    });

    let uncached = Arc::clone(&cookbook);
    router.get("/recipes/uncached", move |ctx: Context| {
        let cookbook = Arc::clone(&uncached);
        async move {
            let trace = RequestTrace::from_context(&ctx);
            match cookbook.get_recipes_without_cache(&trace).await {
                Ok(recipes) => list_response(&recipes),
                Err(err) => error_response(&err),
            }
        }
    });

    router.post("/cache/clear", move |ctx: Context| {
        let cookbook = Arc::clone(&cookbook);
        async move {
            let trace = RequestTrace::from_context(&ctx);
            match cookbook.clear_cache(&trace).await {
                Ok(()) => Response::new(StatusCode::NO_CONTENT),
                Err(err) => error_response(&err),
            }
        }
    });

    router
}

fn list_response(recipes: &[Recipe]) -> Response {
    Response::new(StatusCode::OK).json(&RecipeList { recipes })
}

fn error_response(err: &CookbookError) -> Response {
    let status = match err {
        CookbookError::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
        CookbookError::Database(_) | CookbookError::Task(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    tracing::error!(error = %err, status = status.as_u16(), "request failed");
    Response::new(status).json(&ErrorBody {
        error: status.reason(),
    })
}

/// Renders recipes as plain text, one [`IngredientLine`] per line. A recipe
/// without ingredients is listed by name alone.
///
/// [`IngredientLine`]: crate::model::IngredientLine
pub fn render_text(recipes: &[Recipe]) -> String {
    let mut out = String::new();
    for recipe in recipes {
        if recipe.ingredients.is_empty() {
            let _ = writeln!(out, "{recipe}");
        }
        for line in recipe.lines() {
            let _ = writeln!(out, "{line}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::Request;
    use crate::cache::{Cache, CacheStore, KeyNamespace, MemoryStore, StoreFuture};
    use crate::cache::CacheError;
    use crate::database::{Database, seed_demo};

    fn request(method: &str, path: &str) -> Request {
        Request::for_test(method, path)
    }

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        seed_demo(&db).unwrap();
        db
    }

    fn router_with(store: Arc<dyn CacheStore>, fail_open: bool) -> Router {
        let cache = Cache::new(store, KeyNamespace::default(), None);
        build_router(Arc::new(Cookbook::new(seeded(), cache, fail_open)))
    }

    fn router() -> Router {
        router_with(Arc::new(MemoryStore::new()), true)
    }

    struct DownStore;

    impl CacheStore for DownStore {
        fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
            Box::pin(async { Err(CacheError::Unavailable("down".to_owned())) })
        }

        fn set<'a>(
            &'a self,
            _key: &'a str,
            _value: Vec<u8>,
            _ttl: Option<Duration>,
        ) -> StoreFuture<'a, ()> {
            Box::pin(async { Err(CacheError::Unavailable("down".to_owned())) })
        }

        fn exists<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, bool> {
            Box::pin(async { Err(CacheError::Unavailable("down".to_owned())) })
        }

        fn delete<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, bool> {
            Box::pin(async { Err(CacheError::Unavailable("down".to_owned())) })
        }

        fn clear(&self) -> StoreFuture<'_, ()> {
            Box::pin(async { Err(CacheError::Unavailable("down".to_owned())) })
        }

        fn backend(&self) -> &'static str {
            "down"
        }
    }

    #[tokio::test]
    async fn cached_listing_reports_miss_then_hit() {
        let router = router();

        let first = router.dispatch(request("GET", "/recipes")).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers().get("x-query-count"), Some("3"));
        assert_eq!(first.headers().get("x-cache"), Some("miss"));
        let body = first.payload().to_vec();

        let second = router.dispatch(request("GET", "/recipes")).await;
        assert_eq!(second.headers().get("x-query-count"), Some("0"));
        assert_eq!(second.headers().get("x-cache"), Some("hit"));
        assert_eq!(second.payload(), body.as_slice());

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["recipes"][0]["name"], "Pancakes");
        assert_eq!(json["recipes"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn uncached_listing_bypasses_the_cache() {
        let router = router();
        for _ in 0..2 {
            let res = router.dispatch(request("GET", "/recipes/uncached")).await;
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(res.headers().get("x-query-count"), Some("3"));
            assert_eq!(res.headers().get("x-cache-ops"), Some("0"));
            assert_eq!(res.headers().get("x-cache"), Some("bypass"));
        }
    }

    #[tokio::test]
    async fn clearing_forces_the_next_listing_to_miss() {
        let router = router();
        router.dispatch(request("GET", "/recipes")).await;

        let cleared = router.dispatch(request("POST", "/cache/clear")).await;
        assert_eq!(cleared.status(), StatusCode::NO_CONTENT);

        let res = router.dispatch(request("GET", "/recipes")).await;
        assert_eq!(res.headers().get("x-cache"), Some("miss"));
        assert_eq!(res.headers().get("x-query-count"), Some("3"));
    }

    #[tokio::test]
    async fn text_format_lists_ingredients() {
        let res = router().dispatch(request("GET", "/recipes?format=text")).await;
        assert_eq!(res.status(), StatusCode::OK);
        let text = std::str::from_utf8(res.payload()).unwrap();
        assert!(text.starts_with("Pancakes: 1.500 cup Flour\n"));
        assert!(text.contains("\nShortbread: 2.000 cup Flour\n"));
        assert_eq!(text.lines().count(), 9);
    }

    #[tokio::test]
    async fn unavailable_cache_fails_open_by_default() {
        let router = router_with(Arc::new(DownStore), true);
        let res = router.dispatch(request("GET", "/recipes")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get("x-query-count"), Some("3"));
    }

    #[tokio::test]
    async fn unavailable_cache_is_503_when_failing_closed() {
        let router = router_with(Arc::new(DownStore), false);
        let res = router.dispatch(request("GET", "/recipes")).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.headers().get("x-query-count"), Some("0"));

        let cleared = router.dispatch(request("POST", "/cache/clear")).await;
        assert_eq!(cleared.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_routes_and_methods() {
        let router = router();
        let missing = router.dispatch(request("GET", "/foods")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let wrong = router.dispatch(request("DELETE", "/recipes")).await;
        assert_eq!(wrong.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn render_text_of_nothing_is_empty() {
        assert_eq!(render_text(&[]), "");
    }

    #[test]
    fn recipes_without_ingredients_are_listed_by_name() {
        let water = Recipe {
            id: 1,
            name: "Water".to_owned(),
            ingredients: Vec::new(),
        };
        assert_eq!(render_text(&[water]), "Water\n");
    }
}
