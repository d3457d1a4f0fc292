use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use spotter_api::middleware::require_auth;
use spotter_api::storage::UploadStore;
use spotter_api::{AppState, AppStateInner, auth, images};
use spotter_db::Database;
use spotter_detect::ContourDetector;
use spotter_types::api::ErrorResponse;

/// Matches the original deployment's upload cap.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotter=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("SPOTTER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("SPOTTER_PORT")
        .unwrap_or_else(|_| "5000".into())
        .parse()?;
    let db_path = std::env::var("SPOTTER_DB_PATH").unwrap_or_else(|_| "spotter.db".into());
    let upload_dir: PathBuf = std::env::var("SPOTTER_UPLOAD_DIR")
        .unwrap_or_else(|_| "./uploads".into())
        .into();

    // Init database and upload storage
    let db = Database::open(&PathBuf::from(&db_path))?;
    let store = UploadStore::new(upload_dir.clone()).await?;

    // The detector is built once here and shared across all requests.
    let detector = Arc::new(ContourDetector::default());
    info!("Detector initialized");

    let state: AppState = Arc::new(AppStateInner {
        db,
        store,
        detector,
    });

    // Routes
    let public_routes = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/upload", post(images::upload))
        .route("/images", get(images::list_images))
        .route("/delete/{image_id}", post(images::delete_image))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/uploads", ServeDir::new(&upload_dir))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Spotter server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "spotter",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not found".to_string(),
        }),
    )
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
