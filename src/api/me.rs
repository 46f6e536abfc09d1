use crate::{
    auth::Session,
    error::AppResult,
    models::{Club, ClubMember},
    store::DynStore,
};
use axum::{routing::get, Extension, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MembershipEntry {
    #[serde(flatten)]
    membership: ClubMember,
    club: Club,
}

/// Every club the user has asked to join, with the club row alongside.
async fn memberships(
    Extension(store): Extension<DynStore>,
    session: Session,
) -> AppResult<Json<Vec<MembershipEntry>>> {
    let mut entries = Vec::new();
    for membership in store.list_memberships(session.user_id()).await? {
        if let Some(club) = store.get_club(membership.club_id).await? {
            entries.push(MembershipEntry { membership, club });
        }
    }
    Ok(Json(entries))
}

pub fn app() -> Router {
    Router::new().route("/memberships", get(memberships))
}
