use std::sync::Arc;

use clap::Parser;
use larder::Server;
use larder::app::build_router;
use larder::cache::{Cache, CacheStore, MemoryStore, RedisStore};
use larder::config::AppConfig;
use larder::cookbook::Cookbook;
use larder::database::{Database, seed_demo};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::parse();

    let db = Database::open(&config.database)?;
    if config.seed {
        let inserted = seed_demo(&db)?;
        info!(recipes = inserted, "seeded demo cookbook");
    }

    let store: Arc<dyn CacheStore> = match &config.cache.redis_url {
        Some(url) => Arc::new(RedisStore::connect(url).await?),
        None => Arc::new(MemoryStore::new()),
    };
    let cache = Cache::new(store, config.cache.namespace(), config.cache.ttl());
    info!(
        backend = cache.backend(),
        ttl = ?config.cache.ttl(),
        fail_open = config.cache.fail_open,
        "cache configured"
    );

    let cookbook = Arc::new(Cookbook::new(db, cache, config.cache.fail_open));
    let router = Arc::new(build_router(cookbook));

    let server = Server::bind(&config.bind).await?;
    server
        .run_until(
            move |req| {
                let router = Arc::clone(&router);
                async move { router.dispatch(req).await }
            },
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            },
        )
        .await?;

    Ok(())
}
