//! Table access for the registry.
//!
//! Every method is a single read or write; callers compose them and decide
//! what a failure means. Nothing here retries.

use crate::{
    directory::ClubQuery,
    models::*,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type DynStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    // users and profiles
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        full_name: Option<String>,
    ) -> StoreResult<Profile>;
    async fn find_credentials(&self, email: &str) -> StoreResult<Option<UserCredentials>>;
    async fn get_profile(&self, user_id: i32) -> StoreResult<Option<Profile>>;
    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>>;
    /// Inserts the profile, or overwrites only the role of an existing one.
    async fn upsert_profile_role(&self, profile: NewProfile) -> StoreResult<Profile>;
    async fn set_role(&self, user_id: i32, role: Role) -> StoreResult<Option<Profile>>;

    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    // club requests
    async fn create_request(&self, request: NewClubRequest) -> StoreResult<ClubRequest>;
    async fn get_request(&self, id: i32) -> StoreResult<Option<ClubRequest>>;
    /// Newest first.
    async fn list_requests(&self) -> StoreResult<Vec<ClubRequest>>;
    async fn list_requests_by(&self, user_id: i32) -> StoreResult<Vec<ClubRequest>>;
    /// Writes `review` only while the request is still in `from`; `None`
    /// means the row is gone or another decision got there first.
    async fn transition_request(
        &self,
        id: i32,
        from: RequestStatus,
        review: RequestReview,
    ) -> StoreResult<Option<ClubRequest>>;
    async fn link_request_club(&self, id: i32, club_id: i32) -> StoreResult<()>;
    async fn flag_partially_provisioned(&self, id: i32) -> StoreResult<()>;

    // clubs
    async fn create_club(&self, club: NewClub) -> StoreResult<Club>;
    async fn get_club(&self, id: i32) -> StoreResult<Option<Club>>;
    async fn find_club_by_slug(&self, slug: &str) -> StoreResult<Option<Club>>;
    /// Newest first.
    async fn list_clubs(&self, query: &ClubQuery) -> StoreResult<Vec<Club>>;
    async fn update_club(&self, id: i32, edit: ClubEdit) -> StoreResult<Option<Club>>;
    async fn set_club_verified(&self, id: i32, verified: bool) -> StoreResult<Option<Club>>;
    async fn increment_website_clicks(&self, id: i32) -> StoreResult<Option<i64>>;
    /// Removes the club with its members, notices, events and subscriptions.
    async fn delete_club(&self, id: i32) -> StoreResult<bool>;
    async fn stats(&self) -> StoreResult<RegistryStats>;

    // memberships
    async fn add_member(&self, member: NewClubMember) -> StoreResult<ClubMember>;
    async fn get_member(&self, club_id: i32, user_id: i32) -> StoreResult<Option<ClubMember>>;
    async fn list_members(&self, club_id: i32) -> StoreResult<Vec<ClubMember>>;
    async fn list_memberships(&self, user_id: i32) -> StoreResult<Vec<ClubMember>>;
    /// Lowest-id club where the user holds an active admin membership.
    async fn find_admin_club(&self, user_id: i32) -> StoreResult<Option<i32>>;
    async fn set_member_status(
        &self,
        club_id: i32,
        user_id: i32,
        status: MemberStatus,
    ) -> StoreResult<Option<ClubMember>>;
    async fn set_member_admin(
        &self,
        club_id: i32,
        user_id: i32,
        is_admin: bool,
    ) -> StoreResult<Option<ClubMember>>;
    async fn remove_member(&self, club_id: i32, user_id: i32) -> StoreResult<bool>;
    async fn remove_members_of(&self, club_id: i32) -> StoreResult<usize>;

    // notices
    async fn create_update(&self, update: NewUpdate) -> StoreResult<Update>;
    async fn get_update(&self, id: i32) -> StoreResult<Option<Update>>;
    async fn edit_update(&self, id: i32, edit: UpdateEdit) -> StoreResult<Option<Update>>;
    async fn delete_update(&self, id: i32) -> StoreResult<bool>;
    /// Pinned first, then newest first.
    async fn list_club_updates(&self, club_id: i32, published_only: bool)
        -> StoreResult<Vec<Update>>;
    /// Published notices of every club, newest first, optionally of one kind.
    async fn list_notices(&self, kind: Option<&str>) -> StoreResult<Vec<Update>>;

    // events
    async fn create_event(&self, event: NewEvent) -> StoreResult<Event>;
    async fn get_event(&self, id: i32) -> StoreResult<Option<Event>>;
    async fn edit_event(&self, id: i32, edit: EventEdit) -> StoreResult<Option<Event>>;
    async fn delete_event(&self, id: i32) -> StoreResult<bool>;
    /// Ordered by start time.
    async fn list_club_events(&self, club_id: i32, published_only: bool)
        -> StoreResult<Vec<Event>>;
    /// Published events of every club starting at or after `from`, ordered
    /// by start time.
    async fn list_events(&self, from: Option<DateTime<Utc>>) -> StoreResult<Vec<Event>>;

    // subscriptions
    async fn subscribe(&self, club_id: i32, user_id: i32) -> StoreResult<bool>;
    async fn unsubscribe(&self, club_id: i32, user_id: i32) -> StoreResult<bool>;
    async fn list_subscribers(&self, club_id: i32) -> StoreResult<Vec<i32>>;

    // notifications
    async fn create_notifications(&self, batch: Vec<NewNotification>)
        -> StoreResult<usize>;
    /// Newest first.
    async fn list_notifications(&self, recipient: i32, limit: i64)
        -> StoreResult<Vec<Notification>>;
    async fn unread_count(&self, recipient: i32) -> StoreResult<i64>;
    async fn mark_read(&self, recipient: i32, id: i32) -> StoreResult<bool>;
    async fn mark_all_read(&self, recipient: i32) -> StoreResult<usize>;
}
