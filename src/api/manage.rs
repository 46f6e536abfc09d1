//! Club admin dashboard. Every route under `/:club_id` requires an active
//! admin membership of that club, or an operator session.

use super::{blank_as_none, required};
use crate::{
    auth::Session,
    error::{AppError, AppResult},
    media::{MediaError, MediaStore, MAX_UPLOAD_BYTES},
    membership::{MemberChange, Roster},
    models::*,
    notify,
    store::DynStore,
};
use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Path,
    },
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemberEntry {
    #[serde(flatten)]
    membership: ClubMember,
    profile: Option<Profile>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClubStatsResponse {
    website_clicks: i64,
    members: usize,
    pending_members: usize,
    updates: usize,
    events: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewUpdateRequest {
    title: String,
    body: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default = "published")]
    is_published: bool,
    #[serde(default)]
    is_pinned: bool,
    #[serde(default, deserialize_with = "blank_as_none")]
    redirect_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewEventRequest {
    title: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    description: Option<String>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    location: Option<String>,
    #[serde(default)]
    is_online: bool,
    #[serde(default = "published")]
    is_published: bool,
    #[serde(default, deserialize_with = "blank_as_none")]
    registration_url: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    image_url: Option<String>,
}

fn published() -> bool {
    true
}

/// Club notices share a column with nothing else, but the `notification_`
/// prefix stays reserved for personal notifications.
fn notice_kind(kind: String) -> AppResult<String> {
    let kind = required("type", kind)?;
    if kind.starts_with(NOTIFICATION_PREFIX) {
        return Err(AppError::bad_request(format!(
            "notice types may not start with `{NOTIFICATION_PREFIX}`"
        )));
    }
    Ok(kind)
}

fn check_event_times(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> AppResult<()> {
    if matches!(end, Some(end) if end < start) {
        return Err(AppError::bad_request("an event cannot end before it starts"));
    }
    Ok(())
}

async fn managed_club(store: &DynStore, session: &Session, club_id: i32) -> AppResult<Club> {
    session.ensure_club_admin(store, club_id).await?;
    store
        .get_club(club_id)
        .await?
        .ok_or_else(|| AppError::not_found("club"))
}

async fn my_club(
    Extension(store): Extension<DynStore>,
    session: Session,
) -> AppResult<Json<Club>> {
    let club_id = store
        .find_admin_club(session.user_id())
        .await?
        .ok_or_else(|| AppError::from(StatusCode::FORBIDDEN, "no club to manage"))?;
    let club = store
        .get_club(club_id)
        .await?
        .ok_or_else(|| AppError::not_found("club"))?;
    Ok(Json(club))
}

async fn edit_club(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    session: Session,
    Json(edit): Json<ClubEdit>,
) -> AppResult<Json<Club>> {
    managed_club(&store, &session, club_id).await?;
    if edit.is_empty() {
        return Err(AppError::bad_request("nothing to update"));
    }
    if let Some(name) = &edit.name {
        if name.trim().is_empty() {
            return Err(AppError::bad_request("name is required"));
        }
    }
    if let Some(category) = &edit.category {
        let categories = store.list_categories().await?;
        if !categories.is_empty() && !categories.iter().any(|c| &c.name == category) {
            return Err(AppError::bad_request("invalid category"));
        }
    }

    let club = store
        .update_club(club_id, edit)
        .await?
        .ok_or_else(|| AppError::not_found("club"))?;
    info!(club = club_id, user = session.user_id(), "club profile updated");
    Ok(Json(club))
}

fn invalid_upload(e: MultipartError) -> AppError {
    AppError::bad_request(format!("invalid upload: {e}"))
}

/// Reads one multipart field, refusing it as soon as it passes the upload
/// limit instead of buffering the rest of the body.
async fn read_upload(field: &mut Field<'_>) -> AppResult<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(invalid_upload)? {
        if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::media(MediaError::TooLarge));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn discard(media: &MediaStore, url: &str) {
    if let Err(e) = media.remove(url).await {
        warn!(url, error = %e, "stale media file not removed");
    }
}

async fn upload_media(
    Extension(store): Extension<DynStore>,
    Extension(media): Extension<MediaStore>,
    Path((club_id, slot)): Path<(i32, String)>,
    session: Session,
    mut multipart: Multipart,
) -> AppResult<Json<Club>> {
    let club = managed_club(&store, &session, club_id).await?;
    let mut edit = ClubEdit::default();
    let (previous, target) = match slot.as_str() {
        "logo" => (club.logo_url, &mut edit.logo_url),
        "banner" => (club.banner_url, &mut edit.banner_url),
        _ => return Err(AppError::not_found("media slot")),
    };

    let mut field = multipart
        .next_field()
        .await
        .map_err(invalid_upload)?
        .ok_or_else(|| AppError::bad_request("no file was uploaded"))?;
    let bytes = read_upload(&mut field).await?;

    let url = media
        .save(club_id, &bytes)
        .await
        .map_err(AppError::media)?;
    *target = Some(url.clone());

    let club = match store.update_club(club_id, edit).await {
        Ok(Some(club)) => club,
        Ok(None) => {
            discard(&media, &url).await;
            return Err(AppError::not_found("club"));
        }
        Err(e) => {
            discard(&media, &url).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = previous {
        discard(&media, &previous).await;
    }
    info!(club = club_id, %slot, "club media replaced");
    Ok(Json(club))
}

async fn members(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    session: Session,
) -> AppResult<Json<Vec<MemberEntry>>> {
    managed_club(&store, &session, club_id).await?;
    let mut entries = Vec::new();
    for membership in store.list_members(club_id).await? {
        let profile = store.get_profile(membership.user_id).await?;
        entries.push(MemberEntry {
            membership,
            profile,
        });
    }
    Ok(Json(entries))
}

async fn decide(
    store: DynStore,
    session: Session,
    club_id: i32,
    user_id: i32,
    to: MemberStatus,
) -> AppResult<Json<MemberChange>> {
    managed_club(&store, &session, club_id).await?;
    Roster::new(store)
        .decide(session.user_id(), club_id, user_id, to)
        .await
        .map(Json)
        .map_err(AppError::membership)
}

async fn approve_member(
    Extension(store): Extension<DynStore>,
    Path((club_id, user_id)): Path<(i32, i32)>,
    session: Session,
) -> AppResult<Json<MemberChange>> {
    decide(store, session, club_id, user_id, MemberStatus::Active).await
}

async fn reject_member(
    Extension(store): Extension<DynStore>,
    Path((club_id, user_id)): Path<(i32, i32)>,
    session: Session,
) -> AppResult<Json<MemberChange>> {
    decide(store, session, club_id, user_id, MemberStatus::Rejected).await
}

async fn set_admin(
    store: DynStore,
    session: Session,
    club_id: i32,
    user_id: i32,
    is_admin: bool,
) -> AppResult<Json<MemberChange>> {
    managed_club(&store, &session, club_id).await?;
    Roster::new(store)
        .set_admin(session.user_id(), club_id, user_id, is_admin)
        .await
        .map(Json)
        .map_err(AppError::membership)
}

async fn promote_member(
    Extension(store): Extension<DynStore>,
    Path((club_id, user_id)): Path<(i32, i32)>,
    session: Session,
) -> AppResult<Json<MemberChange>> {
    set_admin(store, session, club_id, user_id, true).await
}

async fn demote_member(
    Extension(store): Extension<DynStore>,
    Path((club_id, user_id)): Path<(i32, i32)>,
    session: Session,
) -> AppResult<Json<MemberChange>> {
    set_admin(store, session, club_id, user_id, false).await
}

async fn remove_member(
    Extension(store): Extension<DynStore>,
    Path((club_id, user_id)): Path<(i32, i32)>,
    session: Session,
) -> AppResult<Json<()>> {
    managed_club(&store, &session, club_id).await?;
    Roster::new(store)
        .remove(session.user_id(), club_id, user_id)
        .await
        .map_err(AppError::membership)?;
    Ok(Json(()))
}

async fn list_updates(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    session: Session,
) -> AppResult<Json<Vec<Update>>> {
    managed_club(&store, &session, club_id).await?;
    Ok(Json(store.list_club_updates(club_id, false).await?))
}

async fn create_update(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    session: Session,
    Json(req): Json<NewUpdateRequest>,
) -> AppResult<Json<Update>> {
    managed_club(&store, &session, club_id).await?;
    let update = store
        .create_update(NewUpdate {
            club_id,
            title: required("title", req.title)?,
            body: required("body", req.body)?,
            kind: notice_kind(req.kind)?,
            is_published: req.is_published,
            is_pinned: req.is_pinned,
            redirect_url: req.redirect_url,
            created_by: Some(session.user_id()),
        })
        .await?;
    info!(club = club_id, update = update.id, "notice posted");
    Ok(Json(update))
}

async fn owned_update(store: &DynStore, club_id: i32, id: i32) -> AppResult<Update> {
    store
        .get_update(id)
        .await?
        .filter(|u| u.club_id == club_id)
        .ok_or_else(|| AppError::not_found("notice"))
}

async fn edit_update(
    Extension(store): Extension<DynStore>,
    Path((club_id, id)): Path<(i32, i32)>,
    session: Session,
    Json(mut edit): Json<UpdateEdit>,
) -> AppResult<Json<Update>> {
    managed_club(&store, &session, club_id).await?;
    owned_update(&store, club_id, id).await?;
    if edit.is_empty() {
        return Err(AppError::bad_request("nothing to update"));
    }
    if let Some(kind) = edit.kind.take() {
        edit.kind = Some(notice_kind(kind)?);
    }
    let update = store
        .edit_update(id, edit)
        .await?
        .ok_or_else(|| AppError::not_found("notice"))?;
    Ok(Json(update))
}

async fn delete_update(
    Extension(store): Extension<DynStore>,
    Path((club_id, id)): Path<(i32, i32)>,
    session: Session,
) -> AppResult<Json<()>> {
    managed_club(&store, &session, club_id).await?;
    owned_update(&store, club_id, id).await?;
    store.delete_update(id).await?;
    Ok(Json(()))
}

async fn list_events(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    session: Session,
) -> AppResult<Json<Vec<Event>>> {
    managed_club(&store, &session, club_id).await?;
    Ok(Json(store.list_club_events(club_id, false).await?))
}

async fn create_event(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    session: Session,
    Json(req): Json<NewEventRequest>,
) -> AppResult<Json<Event>> {
    let club = managed_club(&store, &session, club_id).await?;
    check_event_times(req.start_time, req.end_time)?;

    let event = store
        .create_event(NewEvent {
            club_id,
            title: required("title", req.title)?,
            description: req.description,
            start_time: req.start_time,
            end_time: req.end_time,
            location: req.location,
            is_online: req.is_online,
            is_published: req.is_published,
            registration_url: req.registration_url,
            image_url: req.image_url,
            created_by: Some(session.user_id()),
        })
        .await?;
    info!(club = club_id, event = event.id, "event created");

    if event.is_published {
        match notify::notify_subscribers(store.as_ref(), &club, &event).await {
            Ok(sent) => info!(event = event.id, sent, "subscribers notified"),
            Err(e) => warn!(event = event.id, error = %e, "subscriber notifications not sent"),
        }
    }
    Ok(Json(event))
}

async fn owned_event(store: &DynStore, club_id: i32, id: i32) -> AppResult<Event> {
    store
        .get_event(id)
        .await?
        .filter(|e| e.club_id == club_id)
        .ok_or_else(|| AppError::not_found("event"))
}

async fn edit_event(
    Extension(store): Extension<DynStore>,
    Path((club_id, id)): Path<(i32, i32)>,
    session: Session,
    Json(edit): Json<EventEdit>,
) -> AppResult<Json<Event>> {
    managed_club(&store, &session, club_id).await?;
    let current = owned_event(&store, club_id, id).await?;
    if edit.is_empty() {
        return Err(AppError::bad_request("nothing to update"));
    }
    check_event_times(
        edit.start_time.unwrap_or(current.start_time),
        edit.end_time.or(current.end_time),
    )?;
    let event = store
        .edit_event(id, edit)
        .await?
        .ok_or_else(|| AppError::not_found("event"))?;
    Ok(Json(event))
}

async fn delete_event(
    Extension(store): Extension<DynStore>,
    Path((club_id, id)): Path<(i32, i32)>,
    session: Session,
) -> AppResult<Json<()>> {
    managed_club(&store, &session, club_id).await?;
    owned_event(&store, club_id, id).await?;
    store.delete_event(id).await?;
    Ok(Json(()))
}

async fn club_stats(
    Extension(store): Extension<DynStore>,
    Path(club_id): Path<i32>,
    session: Session,
) -> AppResult<Json<ClubStatsResponse>> {
    let club = managed_club(&store, &session, club_id).await?;
    let members = store.list_members(club_id).await?;
    Ok(Json(ClubStatsResponse {
        website_clicks: club.website_clicks,
        pending_members: members
            .iter()
            .filter(|m| m.status == MemberStatus::Pending)
            .count(),
        members: members
            .iter()
            .filter(|m| m.status == MemberStatus::Active)
            .count(),
        updates: store.list_club_updates(club_id, false).await?.len(),
        events: store.list_club_events(club_id, false).await?.len(),
    }))
}

pub fn app() -> Router {
    Router::new()
        .route("/club", get(my_club))
        .route("/:club_id", put(edit_club))
        .route("/:club_id/media/:slot", post(upload_media))
        .route("/:club_id/members", get(members))
        .route("/:club_id/members/:user_id", delete(remove_member))
        .route("/:club_id/members/:user_id/approve", post(approve_member))
        .route("/:club_id/members/:user_id/reject", post(reject_member))
        .route(
            "/:club_id/members/:user_id/admin",
            post(promote_member).delete(demote_member),
        )
        .route("/:club_id/updates", get(list_updates).post(create_update))
        .route("/:club_id/updates/:id", put(edit_update).delete(delete_update))
        .route("/:club_id/events", get(list_events).post(create_event))
        .route("/:club_id/events/:id", put(edit_event).delete(delete_event))
        .route("/:club_id/stats", get(club_stats))
}
