//! HTTP facade over the item repository.
//!
//! # Routes
//!
//! | Method | Path           | Handler                   |
//! |--------|----------------|---------------------------|
//! | GET    | `/`            | health message            |
//! | POST   | `/items`       | ingest (multipart)        |
//! | GET    | `/items`       | list all                  |
//! | GET    | `/search`      | keyword search            |
//! | GET    | `/items/{id}`  | single item               |
//! | GET    | `/image/{id}`  | item image or placeholder |

pub mod error;
pub mod handlers;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::ResolvedConfig;
use crate::repository::ItemRepository;

pub use error::{ApiError, ApiResult};

/// State shared by all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub repository: ItemRepository,
}

/// Build the router with CORS, tracing and the upload limit applied
pub fn create_app(repository: ItemRepository, config: &ResolvedConfig) -> Result<Router> {
    let origin: HeaderValue = config
        .front_url
        .parse()
        .with_context(|| format!("Invalid front URL: {}", config.front_url))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::DELETE]);

    Ok(Router::new()
        .route("/", get(handlers::root))
        .route("/items", get(handlers::list_items).post(handlers::add_item))
        .route("/search", get(handlers::search_items))
        .route("/items/{id}", get(handlers::get_item))
        .route("/image/{id}", get(handlers::get_image))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { repository }))
}

/// Open the repository and serve until Ctrl-C
pub async fn serve(config: &ResolvedConfig) -> Result<()> {
    let repository = ItemRepository::open(config)
        .await
        .context("Failed to open item repository")?;
    let app = create_app(repository, config)?;

    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("Failed to bind {}", config.address))?;
    info!(address = %config.address, db = %config.db_path.display(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
