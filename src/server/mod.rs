use crate::config::Config;
use crate::scanner::{
    register_configured_roots, start_job_cleanup, start_scheduler, FolderScanner, ScanDispatcher,
    ScanOptions,
};
use crate::streaming;
use crate::transcode::TranscodeOrchestrator;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use reelhouse_av::MetadataExtractor;
use reelhouse_db::{pool::DbPool, queries::folders};
use reelhouse_media::PlaylistGenerator;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod routes_scan;

/// How often finished scan jobs are pruned.
const JOB_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Catalog connection pool
    pub db: DbPool,
    /// Runs and tracks background scans
    pub dispatcher: ScanDispatcher,
    pub transcoder: Arc<TranscodeOrchestrator>,
    pub playlists: PlaylistGenerator,
}

impl AppContext {
    pub fn new(config: Config, db: DbPool, extractor: Arc<dyn MetadataExtractor>) -> Result<Self> {
        let transcoder = TranscodeOrchestrator::from_config(&config)
            .context("Invalid transcoder configuration")?;
        let scanner = FolderScanner::new(db.clone(), extractor, ScanOptions::from_config(&config));

        Ok(Self {
            playlists: PlaylistGenerator::new(config.server.base_url.clone()),
            transcoder: Arc::new(transcoder),
            dispatcher: ScanDispatcher::new(Arc::new(scanner)),
            config: Arc::new(config),
            db,
        })
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::RANGE]);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .merge(streaming::streaming_router())
        .merge(routes_scan::scan_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Register configured roots and clear stale locks before serving.
///
/// Failures here are logged; the server starts regardless.
pub fn prepare_catalog(ctx: &AppContext) {
    let conn = match ctx.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Failed to get database connection: {}", e);
            return;
        }
    };

    let roots = register_configured_roots(&conn, &ctx.config.library.roots);
    tracing::info!("{} configured root folder(s) registered", roots.len());

    if ctx.config.scan.clear_locks_on_startup {
        match folders::clear_all_locks(&conn) {
            Ok(0) => {}
            Ok(n) => tracing::warn!("Cleared {} stale folder lock(s)", n),
            Err(e) => tracing::error!("Failed to clear folder locks: {}", e),
        }
    }
}

/// Start the HTTP server
pub async fn start_server(ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .context("Invalid server address")?;

    prepare_catalog(&ctx);

    let scheduler = ctx.config.scan.schedule_interval_secs.map(|secs| {
        tracing::info!("Rescanning autoscan roots every {}s", secs);
        start_scheduler(ctx.dispatcher.clone(), Duration::from_secs(secs))
    });

    let retention = Duration::from_secs(ctx.config.scan.job_retention_secs);
    let job_cleanup = start_job_cleanup(
        ctx.dispatcher.clone(),
        JOB_CLEANUP_INTERVAL.min(retention.max(Duration::from_secs(1))),
        retention,
    );

    let dispatcher = ctx.dispatcher.clone();
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Running scans stop at their next directory and commit what they have
    dispatcher.stop();
    if let Some(scheduler) = scheduler {
        scheduler.abort();
    }
    job_cleanup.abort();

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}
