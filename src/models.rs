use crate::schema::*;
use chrono::{DateTime, Utc};
use diesel::{
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, Output, ToSql},
    sql_types::Text,
    AsExpression, FromSqlRow,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Declares a closed enum stored as a text column, with its wire name used
/// for serde, `Display`, `FromStr` and the diesel mapping.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                s.parse().map_err(Into::into)
            }
        }
    };
}

text_enum! {
    Role {
        Student => "student",
        ClubAdmin => "club_admin",
        Moderator => "moderator",
        SuperAdmin => "super_admin",
    }
}

impl Role {
    /// Moderators and super admins review requests and manage every club.
    pub fn is_operator(self) -> bool {
        matches!(self, Role::Moderator | Role::SuperAdmin)
    }
}

text_enum! {
    RequestStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

impl RequestStatus {
    /// A decision is only taken on a pending request, and only a decided
    /// request can be reopened.
    pub fn can_transition(self, to: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, to),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Pending) | (Rejected, Pending)
        )
    }
}

text_enum! {
    MemberStatus {
        Pending => "pending",
        Active => "active",
        Rejected => "rejected",
    }
}

impl MemberStatus {
    pub fn can_transition(self, to: MemberStatus) -> bool {
        use MemberStatus::*;
        matches!((self, to), (Pending, Active) | (Pending, Rejected))
    }
}

text_enum! {
    NotificationKind {
        ClubApproved => "notification_club_approved",
        ClubRejected => "notification_club_rejected",
        EventCreated => "notification_event_created",
        JoinApproved => "notification_join_approved",
        JoinRejected => "notification_join_rejected",
        AdminPromoted => "notification_admin_promoted",
    }
}

/// Prefix reserved for personal notifications; club notices may not use it.
pub const NOTIFICATION_PREFIX: &str = "notification_";

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct UserCredentials {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: i32,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub user_id: i32,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable)]
#[diesel(table_name = categories)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Identifiable)]
#[serde(rename_all = "camelCase")]
pub struct ClubRequest {
    pub id: i32,
    pub club_name: String,
    pub category: String,
    pub description: String,
    pub contact_name: String,
    pub contact_email: String,
    pub website_url: Option<String>,
    pub social_facebook: Option<String>,
    pub social_instagram: Option<String>,
    pub social_twitter: Option<String>,
    pub status: RequestStatus,
    pub requested_by: Option<i32>,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub club_id: Option<i32>,
    pub partially_provisioned: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = club_requests)]
pub struct NewClubRequest {
    pub club_name: String,
    pub category: String,
    pub description: String,
    pub contact_name: String,
    pub contact_email: String,
    pub website_url: Option<String>,
    pub social_facebook: Option<String>,
    pub social_instagram: Option<String>,
    pub social_twitter: Option<String>,
    pub requested_by: Option<i32>,
}

/// Review columns written together on every status change. `None` clears the
/// column, so reopening a request wipes the previous decision.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = club_requests, treat_none_as_null = true)]
pub struct RequestReview {
    pub status: RequestStatus,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub club_id: Option<i32>,
    pub partially_provisioned: bool,
}

impl RequestReview {
    pub fn decided(
        status: RequestStatus,
        reviewer: i32,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self {
            status,
            reviewed_by: Some(reviewer),
            reviewed_at: Some(at),
            review_notes: notes,
            club_id: None,
            partially_provisioned: false,
        }
    }

    pub fn reopened() -> Self {
        Self {
            status: RequestStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            club_id: None,
            partially_provisioned: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Identifiable)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub short_description: String,
    pub long_description: Option<String>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub website_url: Option<String>,
    pub social_facebook: Option<String>,
    pub social_instagram: Option<String>,
    pub social_twitter: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub website_clicks: i64,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = clubs)]
pub struct NewClub {
    pub name: String,
    pub slug: String,
    pub category: String,
    pub short_description: String,
    pub website_url: Option<String>,
    pub social_facebook: Option<String>,
    pub social_instagram: Option<String>,
    pub social_twitter: Option<String>,
    pub email: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_by: Option<i32>,
}

/// Profile fields a club admin may change. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = clubs)]
#[serde(rename_all = "camelCase")]
pub struct ClubEdit {
    pub name: Option<String>,
    pub category: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub website_url: Option<String>,
    pub social_facebook: Option<String>,
    pub social_instagram: Option<String>,
    pub social_twitter: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

impl ClubEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.short_description.is_none()
            && self.long_description.is_none()
            && self.logo_url.is_none()
            && self.banner_url.is_none()
            && self.website_url.is_none()
            && self.social_facebook.is_none()
            && self.social_instagram.is_none()
            && self.social_twitter.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.is_active.is_none()
    }

    pub(crate) fn apply(self, club: &mut Club) {
        macro_rules! set {
            ($($field:ident),+) => {
                $(if let Some(v) = self.$field { club.$field = v; })+
            };
        }
        macro_rules! set_opt {
            ($($field:ident),+) => {
                $(if let Some(v) = self.$field { club.$field = Some(v); })+
            };
        }
        set!(name, category, short_description, is_active);
        set_opt!(
            long_description,
            logo_url,
            banner_url,
            website_url,
            social_facebook,
            social_instagram,
            social_twitter,
            email,
            phone
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct ClubMember {
    pub club_id: i32,
    pub user_id: i32,
    pub is_admin: bool,
    pub status: MemberStatus,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = club_members)]
pub struct NewClubMember {
    pub club_id: i32,
    pub user_id: i32,
    pub is_admin: bool,
    pub status: MemberStatus,
}

/// A club notice. `kind` is free text chosen by the club ("announcement",
/// "recruitment", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Identifiable)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub id: i32,
    pub club_id: i32,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_published: bool,
    pub is_pinned: bool,
    pub redirect_url: Option<String>,
    pub created_by: Option<i32>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = updates)]
pub struct NewUpdate {
    pub club_id: i32,
    pub title: String,
    pub body: String,
    pub kind: String,
    pub is_published: bool,
    pub is_pinned: bool,
    pub redirect_url: Option<String>,
    pub created_by: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = updates)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEdit {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub is_published: Option<bool>,
    pub is_pinned: Option<bool>,
    pub redirect_url: Option<String>,
}

impl UpdateEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.kind.is_none()
            && self.is_published.is_none()
            && self.is_pinned.is_none()
            && self.redirect_url.is_none()
    }

    pub(crate) fn apply(self, update: &mut Update) {
        if let Some(v) = self.title {
            update.title = v;
        }
        if let Some(v) = self.body {
            update.body = v;
        }
        if let Some(v) = self.kind {
            update.kind = v;
        }
        if let Some(v) = self.is_published {
            update.is_published = v;
        }
        if let Some(v) = self.is_pinned {
            update.is_pinned = v;
        }
        if let Some(v) = self.redirect_url {
            update.redirect_url = Some(v);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Identifiable)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i32,
    pub club_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub is_online: bool,
    pub is_published: bool,
    pub registration_url: Option<String>,
    pub image_url: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = events)]
pub struct NewEvent {
    pub club_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub is_online: bool,
    pub is_published: bool,
    pub registration_url: Option<String>,
    pub image_url: Option<String>,
    pub created_by: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = events)]
#[serde(rename_all = "camelCase")]
pub struct EventEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub is_online: Option<bool>,
    pub is_published: Option<bool>,
    pub registration_url: Option<String>,
    pub image_url: Option<String>,
}

impl EventEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.location.is_none()
            && self.is_online.is_none()
            && self.is_published.is_none()
            && self.registration_url.is_none()
            && self.image_url.is_none()
    }

    pub(crate) fn apply(self, event: &mut Event) {
        if let Some(v) = self.title {
            event.title = v;
        }
        if let Some(v) = self.description {
            event.description = Some(v);
        }
        if let Some(v) = self.start_time {
            event.start_time = v;
        }
        if let Some(v) = self.end_time {
            event.end_time = Some(v);
        }
        if let Some(v) = self.location {
            event.location = Some(v);
        }
        if let Some(v) = self.is_online {
            event.is_online = v;
        }
        if let Some(v) = self.is_published {
            event.is_published = v;
        }
        if let Some(v) = self.registration_url {
            event.registration_url = Some(v);
        }
        if let Some(v) = self.image_url {
            event.image_url = Some(v);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Identifiable)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i32,
    pub recipient: i32,
    pub club_id: Option<i32>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub recipient: i32,
    pub club_id: Option<i32>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub clubs: i64,
    pub events: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RequestStatus::Pending, RequestStatus::Approved, true)]
    #[case(RequestStatus::Pending, RequestStatus::Rejected, true)]
    #[case(RequestStatus::Approved, RequestStatus::Pending, true)]
    #[case(RequestStatus::Rejected, RequestStatus::Pending, true)]
    #[case(RequestStatus::Pending, RequestStatus::Pending, false)]
    #[case(RequestStatus::Approved, RequestStatus::Rejected, false)]
    #[case(RequestStatus::Rejected, RequestStatus::Approved, false)]
    #[case(RequestStatus::Approved, RequestStatus::Approved, false)]
    #[case(RequestStatus::Rejected, RequestStatus::Rejected, false)]
    fn request_transitions(
        #[case] from: RequestStatus,
        #[case] to: RequestStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition(to), allowed);
    }

    #[rstest]
    #[case(MemberStatus::Pending, MemberStatus::Active, true)]
    #[case(MemberStatus::Pending, MemberStatus::Rejected, true)]
    #[case(MemberStatus::Active, MemberStatus::Rejected, false)]
    #[case(MemberStatus::Rejected, MemberStatus::Active, false)]
    #[case(MemberStatus::Active, MemberStatus::Pending, false)]
    fn member_transitions(
        #[case] from: MemberStatus,
        #[case] to: MemberStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition(to), allowed);
    }

    #[test]
    fn roles_parse_from_their_wire_names() {
        assert_eq!("club_admin".parse::<Role>().unwrap(), Role::ClubAdmin);
        assert_eq!(Role::SuperAdmin.to_string(), "super_admin");
        assert!("admin".parse::<Role>().is_err());
        assert!(Role::Moderator.is_operator());
        assert!(!Role::ClubAdmin.is_operator());
    }

    #[test]
    fn notification_kinds_keep_their_prefix() {
        assert_eq!(
            NotificationKind::JoinApproved.as_str(),
            "notification_join_approved"
        );
        let json = serde_json::to_string(&NotificationKind::ClubRejected).unwrap();
        assert_eq!(json, "\"notification_club_rejected\"");
    }
}
