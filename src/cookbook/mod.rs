//! Recipe listing with and without the read-through cache.
//!
//! Database work runs on Tokio's blocking pool. Both listing calls record
//! their round-trips into the caller's [`RequestTrace`], which is how tests and
//! the inspection headers observe whether the database was touched.

use std::sync::Arc;

use thiserror::Error;

use crate::cache::{Cache, CacheError, ReadThrough};
use crate::database::{Database, DatabaseError};
use crate::model::Recipe;
use crate::trace::RequestTrace;

/// Logical cache key of the full recipe listing.
pub const RECIPES_KEY: &str = "recipes";

/// Errors produced by the cookbook service.
#[derive(Debug, Error)]
pub enum CookbookError {
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Recipe queries in front of a [`Database`], optionally through a cache.
pub struct Cookbook {
    db: Database,
    recipes: ReadThrough,
}

impl Cookbook {
    pub fn new(db: Database, cache: Cache, fail_open: bool) -> Self {
        Self {
            db,
            recipes: ReadThrough::new(cache, fail_open),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn cache(&self) -> &Cache {
        self.recipes.cache()
    }

    /// Loads every recipe straight from the database.
    pub async fn get_recipes_without_cache(
        &self,
        trace: &Arc<RequestTrace>,
    ) -> Result<Vec<Recipe>, CookbookError> {
        let db = self.db.clone();
        let trace = Arc::clone(trace);
        let (recipes, round_trips) =
            tokio::task::spawn_blocking(move || db.fetch_recipes(trace.queries())).await??;
        tracing::debug!(round_trips, recipes = recipes.len(), "fetched recipes");
        Ok(recipes)
    }

    /// Returns the cached recipe listing, loading and caching it on a miss.
    pub async fn get_recipes_with_cache(
        &self,
        trace: &Arc<RequestTrace>,
    ) -> Result<Vec<Recipe>, CookbookError> {
        self.recipes
            .get_or_compute(RECIPES_KEY, trace.cache(), || {
                self.get_recipes_without_cache(trace)
            })
            .await
    }

    /// Removes every key from the cache backend.
    pub async fn clear_cache(&self, trace: &RequestTrace) -> Result<(), CookbookError> {
        self.recipes.cache().clear(trace.cache()).await?;
        Ok(())
    }
}
