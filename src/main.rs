use axum::http::Method;
use club_registry::{
    auth::Keys,
    connect_to_db,
    media::MediaStore,
    models::Role,
    store::{DynStore, MemoryStore, PgStore, Store},
};
use envconfig::Envconfig;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Categories the migration seeds; the in-memory store starts with the same.
const CATEGORIES: [&str; 6] = [
    "Technical",
    "Cultural",
    "Sports",
    "Literary",
    "Social Service",
    "Entrepreneurship",
];

#[derive(Envconfig)]
struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: Option<String>,
    #[envconfig(from = "STORE", default = "postgres")]
    pub store: String,
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,
    #[envconfig(from = "JWT_SECRET")]
    pub jwt_secret: String,
    #[envconfig(from = "MEDIA_DIR", default = "media")]
    pub media_dir: String,
    #[envconfig(from = "PUBLIC_URL", default = "http://localhost:8080")]
    pub public_url: String,
    #[envconfig(from = "SUPER_ADMIN_EMAIL")]
    pub super_admin_email: Option<String>,
}

fn open_store(config: &Config) -> anyhow::Result<DynStore> {
    match config.store.as_str() {
        "postgres" => {
            let db_url = config
                .db_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
            Ok(Arc::new(PgStore::new(connect_to_db(db_url)?)))
        }
        "memory" => {
            warn!("using the in-memory store, nothing will be persisted");
            Ok(Arc::new(MemoryStore::with_categories(CATEGORIES)))
        }
        other => anyhow::bail!("unknown STORE `{other}`, expected postgres or memory"),
    }
}

async fn promote_super_admin(store: &DynStore, email: &str) -> anyhow::Result<()> {
    match store.find_profile_by_email(email).await? {
        Some(profile) if profile.role == Role::SuperAdmin => {}
        Some(profile) => {
            store.set_role(profile.user_id, Role::SuperAdmin).await?;
            info!(user = profile.user_id, "promoted to super admin");
        }
        None => warn!(%email, "SUPER_ADMIN_EMAIL does not match any profile yet"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("club_registry=info,tower_http=info")),
        )
        .init();

    let config = Config::init_from_env()?;
    let keys = Keys::from_base64_secret(&config.jwt_secret)
        .map_err(|e| anyhow::anyhow!("JWT_SECRET is not valid base64: {e}"))?;
    let store = open_store(&config)?;
    if let Some(email) = &config.super_admin_email {
        promote_super_admin(&store, email).await?;
    }
    let media = MediaStore::new(&config.media_dir, &config.public_url);

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any);
    let app = club_registry::app(store, keys, media).layer(cors);

    info!(port = config.port, "listening");
    axum::Server::bind(&([0, 0, 0, 0], config.port).into())
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
