//! # larder
//!
//! A read-through cache in front of a SQLite recipe store, served over a
//! small async HTTP/1.1 stack.
//!
//! The cached path looks the recipe listing up in a [`cache::Cache`] and only
//! falls back to the [`database::Database`] on a miss. Every request carries a
//! [`trace::RequestTrace`] that counts database round-trips and cache
//! operations, which is how the cache's effect is observed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use larder::cache::{Cache, KeyNamespace, MemoryStore};
//! use larder::cookbook::Cookbook;
//! use larder::database::{Database, seed_demo};
//! use larder::{Server, app};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::open_in_memory()?;
//!     seed_demo(&db)?;
//!     let cache = Cache::new(Arc::new(MemoryStore::new()), KeyNamespace::default(), None);
//!     let router = Arc::new(app::build_router(Arc::new(Cookbook::new(db, cache, true))));
//!
//!     let server = Server::bind("127.0.0.1:8000").await?;
//!     server
//!         .run_until(
//!             move |req| {
//!                 let router = Arc::clone(&router);
//!                 async move { router.dispatch(req).await }
//!             },
//!             async {
//!                 let _ = tokio::signal::ctrl_c().await;
//!             },
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod cache;
pub mod config;
pub mod context;
pub mod cookbook;
pub mod database;
pub mod http;
pub mod middleware;
pub mod model;
pub mod router;
pub mod server;
pub mod trace;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
