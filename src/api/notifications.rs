use crate::{
    auth::Session,
    error::{AppError, AppResult},
    models::Notification,
    store::DynStore,
};
use axum::{
    extract::{Path, Query},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

#[derive(Deserialize)]
struct ListParams {
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnreadResponse {
    unread: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkedResponse {
    marked: usize,
}

async fn list(
    Extension(store): Extension<DynStore>,
    session: Session,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<Notification>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(
        store.list_notifications(session.user_id(), limit).await?,
    ))
}

async fn unread_count(
    Extension(store): Extension<DynStore>,
    session: Session,
) -> AppResult<Json<UnreadResponse>> {
    Ok(Json(UnreadResponse {
        unread: store.unread_count(session.user_id()).await?,
    }))
}

async fn mark_read(
    Extension(store): Extension<DynStore>,
    Path(id): Path<i32>,
    session: Session,
) -> AppResult<Json<MarkedResponse>> {
    if !store.mark_read(session.user_id(), id).await? {
        return Err(AppError::not_found("notification"));
    }
    Ok(Json(MarkedResponse { marked: 1 }))
}

async fn mark_all_read(
    Extension(store): Extension<DynStore>,
    session: Session,
) -> AppResult<Json<MarkedResponse>> {
    Ok(Json(MarkedResponse {
        marked: store.mark_all_read(session.user_id()).await?,
    }))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/unread-count", get(unread_count))
        .route("/:id/read", post(mark_read))
        .route("/read-all", post(mark_all_read))
}
