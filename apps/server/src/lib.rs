//! # Shopkeep Server
//!
//! HTTP JSON API over the shop database.
//!
//! ## Module Organization
//! ```text
//! shopkeep_server/
//! ├── lib.rs          ◄─── AppState, router, tracing setup
//! ├── main.rs         ◄─── Binary entry point (bind, serve, shutdown)
//! ├── config.rs       ◄─── AppConfig (defaults → file → env)
//! ├── error.rs        ◄─── ApiError { code, message } → HTTP status
//! ├── extract.rs      ◄─── Json/Query extractors with ApiError rejections
//! ├── media.rs        ◄─── Photo and logo files
//! ├── mailer.rs       ◄─── Transactional email client
//! ├── digest.rs       ◄─── Daily digest builder + scheduler
//! └── routes/         ◄─── One module per resource
//! ```
//!
//! ## State
//! Handlers receive a cloned [`AppState`]. Everything inside is cheap to
//! clone: the pool and the HTTP client are reference counted, the config is
//! behind an `Arc`.

pub mod config;
pub mod digest;
pub mod error;
pub mod extract;
pub mod mailer;
pub mod media;
pub mod routes;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use shopkeep_db::Database;

use crate::config::AppConfig;
use crate::mailer::{MailError, Mailer};
use crate::media::MediaStore;

/// Smallest request body limit, for JSON endpoints.
const MIN_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub media: MediaStore,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Result<Self, MailError> {
        let media = MediaStore::new(config.media.dir.clone(), config.media.max_bytes);
        let mailer = Mailer::new(&config.email)?;
        Ok(AppState {
            db,
            config: Arc::new(config),
            media,
            mailer,
        })
    }
}

/// Builds the application router.
///
/// The body limit is twice the media limit so an oversized upload still
/// reaches the handler and gets a JSON 413.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.media.max_bytes().saturating_mul(2).max(MIN_BODY_LIMIT);

    routes::router()
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=shopkeep=trace` - Trace for shopkeep crates only
/// - Default: `info,shopkeep=debug,sqlx=warn`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shopkeep=debug,sqlx=warn,tower_http=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
