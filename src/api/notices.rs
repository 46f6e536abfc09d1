use crate::{
    directory::ALL_CATEGORIES,
    error::AppResult,
    models::{Event, Update},
    store::DynStore,
};
use axum::{extract::Query, routing::get, Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;

#[derive(Deserialize)]
struct NoticeParams {
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct EventParams {
    #[serde(default)]
    upcoming: bool,
}

async fn list(
    Extension(store): Extension<DynStore>,
    Query(params): Query<NoticeParams>,
) -> AppResult<Json<Vec<Update>>> {
    let kind = params
        .kind
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty() && *k != ALL_CATEGORIES);
    Ok(Json(store.list_notices(kind).await?))
}

async fn events(
    Extension(store): Extension<DynStore>,
    Query(params): Query<EventParams>,
) -> AppResult<Json<Vec<Event>>> {
    let from = params.upcoming.then(Utc::now);
    Ok(Json(store.list_events(from).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/events", get(events))
}
