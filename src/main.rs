use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use academy_order as app;
use app::cache::{CacheBackend, InMemoryCache, RedisCache};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = app::config::load_config()?;
    app::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = app::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        app::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Request id claims live in Redis so duplicate submits are caught across instances
    let cache: Arc<dyn CacheBackend> = match cfg.cache.cache_type.to_ascii_lowercase().as_str() {
        "redis" => {
            let client = redis::Client::open(cfg.redis_url.clone())
                .context("invalid redis url")?;
            match RedisCache::connect(&client).await {
                Ok(cache) => Arc::new(cache),
                Err(err) if cfg.is_development() => {
                    warn!(
                        "Failed to connect to Redis (falling back to in-memory cache): {}",
                        err
                    );
                    Arc::new(InMemoryCache::new())
                }
                Err(err) => {
                    error!("Failed to connect to Redis: {}", err);
                    return Err(err.into());
                }
            }
        }
        _ => Arc::new(InMemoryCache::new()),
    };

    let collaborators = app::handlers::Collaborators::from_config(
        &cfg.collaborators,
        cfg.order.collaborator_timeout(),
    )
    .context("failed to build collaborator clients")?;

    // Aggregate app services used by HTTP handlers
    let services =
        app::handlers::AppServices::new(db_arc.clone(), cache.clone(), collaborators, &cfg.order);

    // Compose shared app state
    let app_state = app::AppState {
        db: db_arc,
        config: cfg.clone(),
        cache,
        services,
    };

    let router = app::app_router(app_state)?;

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid listen address")?;
    info!("academy-order listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("academy-order stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
