use super::{blank_as_none, required};
use crate::{
    auth::Session,
    error::{AppError, AppResult},
    models::{ClubRequest, NewClubRequest},
    slug::slugify,
    store::DynStore,
};
use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use tracing::info;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    club_name: String,
    category: String,
    description: String,
    contact_name: String,
    contact_email: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    website_url: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    social_facebook: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    social_instagram: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    social_twitter: Option<String>,
}

async fn submit(
    Extension(store): Extension<DynStore>,
    session: Session,
    Json(req): Json<SubmitRequest>,
) -> AppResult<Json<ClubRequest>> {
    let club_name = required("clubName", req.club_name)?;
    if slugify(&club_name).is_empty() {
        return Err(AppError::bad_request(
            "club name must contain letters or digits",
        ));
    }
    let category = required("category", req.category)?;
    let categories = store.list_categories().await?;
    if !categories.is_empty() && !categories.iter().any(|c| c.name == category) {
        return Err(AppError::bad_request("invalid category"));
    }
    if let Some(url) = &req.website_url {
        url::Url::parse(url).map_err(|_| AppError::bad_request("invalid website url"))?;
    }

    let request = store
        .create_request(NewClubRequest {
            club_name,
            category,
            description: required("description", req.description)?,
            contact_name: required("contactName", req.contact_name)?,
            contact_email: required("contactEmail", req.contact_email)?,
            website_url: req.website_url,
            social_facebook: req.social_facebook,
            social_instagram: req.social_instagram,
            social_twitter: req.social_twitter,
            requested_by: Some(session.user_id()),
        })
        .await?;
    info!(request = request.id, user = session.user_id(), "club request submitted");

    Ok(Json(request))
}

async fn mine(
    Extension(store): Extension<DynStore>,
    session: Session,
) -> AppResult<Json<Vec<ClubRequest>>> {
    Ok(Json(store.list_requests_by(session.user_id()).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/", post(submit))
        .route("/mine", get(mine))
}
