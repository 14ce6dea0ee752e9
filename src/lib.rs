pub mod appresult;
pub mod auth;
pub mod blob;
pub mod config;
pub mod db;
pub mod model;
pub mod notifications;
pub mod posts;
pub mod session;
pub mod social;
pub mod store;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, FromRequest},
    http::{HeaderValue, Method, header},
};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};

pub use appresult::{AppError, AppResult};

use blob::BlobStore;
use config::Config;
use social::{FeedComposer, Inbox, InteractionManager, RelationshipManager};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub relationships: RelationshipManager,
    pub interactions: InteractionManager,
    pub feeds: FeedComposer,
    pub inbox: Inbox,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            relationships: RelationshipManager::new(db_pool.clone()),
            interactions: InteractionManager::new(db_pool.clone(), blobs.clone()),
            feeds: FeedComposer::new(db_pool.clone()),
            inbox: Inbox::new(db_pool.clone()),
            db_pool,
            blobs,
        }
    }
}

/// JSON body extractor whose rejections come back as `AppError`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

pub fn app(state: AppState, config: &Config) -> anyhow::Result<Router> {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.secure_cookies)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(config.session_days)));

    let cors = CorsLayer::new()
        .allow_origin(config.client_origin.parse::<HeaderValue>()?)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .nest("/auth", auth::router())
        .nest("/user", users::router())
        .nest("/posts", posts::router())
        .nest("/notifications", notifications::router())
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
