use std::io;

use axum::{http::StatusCode, routing::get_service, Extension, Router};
use deadpool::managed::Pool;
use diesel_async::{pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod api;
pub mod auth;
pub mod directory;
pub mod error;
pub mod media;
pub mod membership;
pub mod models;
pub mod notify;
pub mod provision;
pub mod schema;
pub mod slug;
pub mod store;

use auth::Keys;
use media::MediaStore;
use store::DynStore;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub fn connect_to_db(db_url: &str) -> anyhow::Result<DbPool> {
    let db_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Pool::builder(db_config)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build database pool: {e}"))
}

/// The whole service: the JSON API under `/api` and uploaded media under
/// `/media`.
pub fn app(store: DynStore, keys: Keys, media: MediaStore) -> Router {
    let serve = get_service(ServeDir::new(media.root())).handle_error(handle_error);
    Router::new()
        .nest("/api", api::app())
        .nest("/media", serve)
        .layer(Extension(store))
        .layer(Extension(keys))
        .layer(Extension(media))
        .layer(TraceLayer::new_for_http())
}

async fn handle_error(_: io::Error) -> error::AppError {
    error::AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch media")
}
