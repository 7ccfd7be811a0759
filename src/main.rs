//! Server entry point for chapter-stitch.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use chapter_stitch::{
    AuthClient, AuthConfig, Cache, ChapterService, Database, MemoryCache, MetadataResolver,
    PageClient, PageFetcher, RetryPolicy, SessionManager, SqliteCache, SqliteCredentialStore,
    UpstreamConfig, default_concurrency, router,
};
use chapter_stitch::cache::{DEFAULT_SWEEP_INTERVAL, spawn_sweeper};
use clap::Parser;
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, CacheBackend};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("chapter-stitch starting");

    let db = Database::new(&args.db)
        .await
        .with_context(|| format!("open database {}", args.db.display()))?;

    let cache: Arc<dyn Cache> = match args.cache {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Sqlite => Arc::new(SqliteCache::new(db.clone())),
    };
    match cache.purge_expired().await {
        Ok(purged) => debug!(purged, "purged expired cache entries"),
        Err(e) => warn!(error = %e, "failed to purge expired cache entries"),
    }
    let sweeper = spawn_sweeper(Arc::clone(&cache), DEFAULT_SWEEP_INTERVAL);
    debug!(backend = ?args.cache, "cache ready");

    let auth = AuthClient::new(AuthConfig {
        token_url: args.auth_url.clone(),
        client_id: args.client_id.clone(),
        client_secret: args.client_secret.clone(),
        username: args.username.clone(),
        password: args.password.clone(),
    })?;
    let store = Arc::new(SqliteCredentialStore::new(db.clone()));
    let session = Arc::new(SessionManager::new(auth, store));

    let resolver = MetadataResolver::new(
        &UpstreamConfig {
            api_base_url: args.api_base_url.clone(),
        },
        Arc::clone(&cache),
    )?;

    let concurrency = args
        .concurrency
        .map_or_else(default_concurrency, usize::from);
    let chapter_fetcher = PageFetcher::new(PageClient::new(None)?, concurrency, RetryPolicy::default());
    let page_fetcher = PageFetcher::new(
        PageClient::new(Some(args.referer.clone()))?,
        concurrency,
        RetryPolicy::default(),
    );

    let service = Arc::new(
        ChapterService::new(session, resolver, cache, chapter_fetcher)
            .with_page_fetcher(page_fetcher),
    );

    let cors_origin = match args.cors_origin.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => Some(origin),
        Some(Err(e)) => {
            warn!(error = %e, "ignoring invalid CORS origin");
            None
        }
        None => None,
    };

    let app = router(service, cors_origin);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(addr = %args.bind, concurrency, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    db.close().await;
    info!("chapter-stitch stopped");

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("interrupt received, draining in-flight requests");
    } else {
        warn!("failed to listen for interrupt; shutdown only on process kill");
        std::future::pending::<()>().await;
    }
}
