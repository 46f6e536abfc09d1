use crate::{
    auth::{Operator, SuperAdmin},
    directory::ClubQuery,
    error::{AppError, AppResult},
    models::{Club, ClubRequest, Profile, Role},
    provision::{Provisioned, Provisioner, Rejected, Reopened},
    store::DynStore,
};
use axum::{
    extract::Path,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use tracing::info;

#[derive(Deserialize)]
struct RejectRequest {
    notes: Option<String>,
}

#[derive(Deserialize)]
struct VerifyRequest {
    verified: bool,
}

#[derive(Deserialize)]
struct RoleRequest {
    role: Role,
}

async fn list_requests(
    Extension(store): Extension<DynStore>,
    _: Operator,
) -> AppResult<Json<Vec<ClubRequest>>> {
    Ok(Json(store.list_requests().await?))
}

async fn approve(
    Extension(store): Extension<DynStore>,
    Path(id): Path<i32>,
    Operator(session): Operator,
) -> AppResult<Json<Provisioned>> {
    Provisioner::new(store)
        .approve(id, session.user_id())
        .await
        .map(Json)
        .map_err(AppError::provision)
}

async fn reject(
    Extension(store): Extension<DynStore>,
    Path(id): Path<i32>,
    Operator(session): Operator,
    req: Option<Json<RejectRequest>>,
) -> AppResult<Json<Rejected>> {
    let notes = req.and_then(|Json(req)| req.notes);
    Provisioner::new(store)
        .reject(id, session.user_id(), notes)
        .await
        .map(Json)
        .map_err(AppError::provision)
}

async fn reset(
    Extension(store): Extension<DynStore>,
    Path(id): Path<i32>,
    _: Operator,
) -> AppResult<Json<Reopened>> {
    Provisioner::new(store)
        .reset(id)
        .await
        .map(Json)
        .map_err(AppError::provision)
}

async fn list_clubs(
    Extension(store): Extension<DynStore>,
    _: Operator,
) -> AppResult<Json<Vec<Club>>> {
    Ok(Json(store.list_clubs(&ClubQuery::default()).await?))
}

async fn verify_club(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    _: Operator,
    Json(req): Json<VerifyRequest>,
) -> AppResult<Json<Club>> {
    let club = store
        .set_club_verified(club_id, req.verified)
        .await?
        .ok_or_else(|| AppError::not_found("club"))?;
    info!(club = club_id, verified = req.verified, "club verification changed");
    Ok(Json(club))
}

async fn delete_club(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    Operator(session): Operator,
) -> AppResult<Json<()>> {
    if !store.delete_club(club_id).await? {
        return Err(AppError::not_found("club"));
    }
    info!(club = club_id, by = session.user_id(), "club deleted");
    Ok(Json(()))
}

async fn set_role(
    Extension(store): Extension<DynStore>,
    Path(user_id): Path<i32>,
    SuperAdmin(session): SuperAdmin,
    Json(req): Json<RoleRequest>,
) -> AppResult<Json<Profile>> {
    if user_id == session.user_id() {
        return Err(AppError::bad_request("you cannot change your own role"));
    }
    let profile = store
        .set_role(user_id, req.role)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;
    info!(user = user_id, role = %req.role, "role changed");
    Ok(Json(profile))
}

pub fn app() -> Router {
    Router::new()
        .route("/requests", get(list_requests))
        .route("/requests/:id/approve", post(approve))
        .route("/requests/:id/reject", post(reject))
        .route("/requests/:id/reset", post(reset))
        .route("/clubs", get(list_clubs))
        .route("/clubs/:id/verify", post(verify_club))
        .route("/clubs/:id", delete(delete_club))
        .route("/users/:user_id/role", put(set_role))
}
