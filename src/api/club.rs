use crate::{
    auth::Session,
    directory::{ClubQuery, DirectoryParams},
    error::{AppError, AppResult},
    membership::Roster,
    models::{Club, ClubMember, Event, RegistryStats, Update},
    store::DynStore,
};
use axum::{
    extract::{Path, Query},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;

const FEATURED_LIMIT: i64 = 6;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClubInfoResponse {
    club: Club,
    updates: Vec<Update>,
    events: Vec<Event>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClicksResponse {
    website_clicks: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MembershipResponse {
    membership: Option<ClubMember>,
    subscribed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionResponse {
    subscribed: bool,
}

async fn list(
    Extension(store): Extension<DynStore>,
    Query(params): Query<DirectoryParams>,
) -> AppResult<Json<Vec<Club>>> {
    let query = ClubQuery::directory(params.into());
    Ok(Json(store.list_clubs(&query).await?))
}

async fn list_featured(Extension(store): Extension<DynStore>) -> AppResult<Json<Vec<Club>>> {
    Ok(Json(
        store.list_clubs(&ClubQuery::featured(FEATURED_LIMIT)).await?,
    ))
}

async fn info(
    Extension(store): Extension<DynStore>,
    Path(slug): Path<String>,
) -> AppResult<Json<ClubInfoResponse>> {
    let club = store
        .find_club_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::not_found("club"))?;

    let updates = store.list_club_updates(club.id, true).await?;
    let events = store.list_club_events(club.id, true).await?;

    Ok(Json(ClubInfoResponse {
        club,
        updates,
        events,
    }))
}

async fn list_categories(Extension(store): Extension<DynStore>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(
        store
            .list_categories()
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect(),
    ))
}

async fn click(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<ClicksResponse>> {
    let website_clicks = store
        .increment_website_clicks(club_id)
        .await?
        .ok_or_else(|| AppError::not_found("club"))?;
    Ok(Json(ClicksResponse { website_clicks }))
}

async fn stats(Extension(store): Extension<DynStore>) -> AppResult<Json<RegistryStats>> {
    Ok(Json(store.stats().await?))
}

async fn join(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    session: Session,
) -> AppResult<Json<ClubMember>> {
    Roster::new(store)
        .join(club_id, session.user_id())
        .await
        .map(Json)
        .map_err(AppError::membership)
}

async fn membership(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    session: Session,
) -> AppResult<Json<MembershipResponse>> {
    let membership = store.get_member(club_id, session.user_id()).await?;
    let subscribed = store
        .list_subscribers(club_id)
        .await?
        .contains(&session.user_id());
    Ok(Json(MembershipResponse {
        membership,
        subscribed,
    }))
}

async fn subscribe(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    session: Session,
) -> AppResult<Json<SubscriptionResponse>> {
    store.subscribe(club_id, session.user_id()).await?;
    Ok(Json(SubscriptionResponse { subscribed: true }))
}

async fn unsubscribe(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    session: Session,
) -> AppResult<Json<SubscriptionResponse>> {
    store.unsubscribe(club_id, session.user_id()).await?;
    Ok(Json(SubscriptionResponse { subscribed: false }))
}

pub fn app() -> Router {
    Router::new()
        .route("/list", get(list))
        .route("/featured", get(list_featured))
        .route("/info/:slug", get(info))
        .route("/categories/list", get(list_categories))
        .route("/stats", get(stats))
        .route("/:club_id/click", post(click))
        .route("/:club_id/join", post(join))
        .route("/:club_id/membership", get(membership))
        .route("/:club_id/subscribe", post(subscribe).delete(unsubscribe))
}
