//! Personal notifications. Every builder addresses exactly one recipient.

use crate::{
    models::{Club, ClubRequest, Event, NewNotification, NotificationKind},
    store::{Store, StoreResult},
};

pub fn club_approved(recipient: i32, club: &Club) -> NewNotification {
    NewNotification {
        recipient,
        club_id: Some(club.id),
        kind: NotificationKind::ClubApproved,
        title: "Club Registration Approved".to_string(),
        message: format!(
            "Your request to register {} has been approved. You are now its club admin.",
            club.name
        ),
        link: Some("/dashboard/club_admin".to_string()),
    }
}

pub fn club_rejected(recipient: i32, request: &ClubRequest) -> NewNotification {
    let message = match request.review_notes.as_deref().filter(|n| !n.is_empty()) {
        Some(notes) => format!(
            "Your request to register {} was declined: {notes}",
            request.club_name
        ),
        None => format!("Your request to register {} was declined.", request.club_name),
    };
    NewNotification {
        recipient,
        club_id: None,
        kind: NotificationKind::ClubRejected,
        title: "Club Registration Declined".to_string(),
        message,
        link: Some("/dashboard/student".to_string()),
    }
}

pub fn join_approved(recipient: i32, club: &Club) -> NewNotification {
    NewNotification {
        recipient,
        club_id: Some(club.id),
        kind: NotificationKind::JoinApproved,
        title: "Membership Approved".to_string(),
        message: format!("You are now a member of {}.", club.name),
        link: Some(format!("/club/{}", club.slug)),
    }
}

pub fn join_rejected(recipient: i32, club: &Club) -> NewNotification {
    NewNotification {
        recipient,
        club_id: Some(club.id),
        kind: NotificationKind::JoinRejected,
        title: "Membership Declined".to_string(),
        message: format!("Your request to join {} was declined.", club.name),
        link: Some(format!("/club/{}", club.slug)),
    }
}

pub fn admin_promoted(recipient: i32, club: &Club) -> NewNotification {
    NewNotification {
        recipient,
        club_id: Some(club.id),
        kind: NotificationKind::AdminPromoted,
        title: "Promoted to Club Admin".to_string(),
        message: format!("You can now manage {}.", club.name),
        link: Some("/dashboard/club_admin".to_string()),
    }
}

pub fn event_created(recipient: i32, club: &Club, event: &Event) -> NewNotification {
    NewNotification {
        recipient,
        club_id: Some(club.id),
        kind: NotificationKind::EventCreated,
        title: "New Event".to_string(),
        message: format!("{} posted a new event: {}", club.name, event.title),
        link: Some(format!("/events/{}", event.id)),
    }
}

/// Fans a new event out to everyone subscribed to the club. Returns how many
/// notifications were written.
pub async fn notify_subscribers(store: &dyn Store, club: &Club, event: &Event) -> StoreResult<usize> {
    let subscribers = store.list_subscribers(club.id).await?;
    if subscribers.is_empty() {
        return Ok(0);
    }
    let batch = subscribers
        .into_iter()
        .map(|user_id| event_created(user_id, club, event))
        .collect();
    store.create_notifications(batch).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{NewClub, NewEvent},
        store::MemoryStore,
    };
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn subscribers_each_receive_one_event_notification() {
        let store = MemoryStore::new();
        let club = store
            .create_club(NewClub {
                name: "Chess Club".to_string(),
                slug: "chess-club".to_string(),
                category: "Cultural".to_string(),
                short_description: "Openings and endgames".to_string(),
                website_url: None,
                social_facebook: None,
                social_instagram: None,
                social_twitter: None,
                email: None,
                is_verified: true,
                is_active: true,
                created_by: None,
            })
            .await
            .unwrap();
        store.subscribe(club.id, 41).await.unwrap();
        store.subscribe(club.id, 42).await.unwrap();
        let event = store
            .create_event(NewEvent {
                club_id: club.id,
                title: "Blitz Night".to_string(),
                description: None,
                start_time: Utc::now() + Duration::days(3),
                end_time: None,
                location: Some("Seminar Hall".to_string()),
                is_online: false,
                is_published: true,
                registration_url: None,
                image_url: None,
                created_by: None,
            })
            .await
            .unwrap();

        let sent = notify_subscribers(&store, &club, &event).await.unwrap();
        assert_eq!(sent, 2);

        for user in [41, 42] {
            let inbox = store.list_notifications(user, 10).await.unwrap();
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].kind, NotificationKind::EventCreated);
            assert_eq!(inbox[0].message, "Chess Club posted a new event: Blitz Night");
        }
    }

    #[tokio::test]
    async fn no_subscribers_writes_nothing() {
        let store = MemoryStore::new();
        let club = store
            .create_club(NewClub {
                name: "Quiet Club".to_string(),
                slug: "quiet-club".to_string(),
                category: "Literary".to_string(),
                short_description: "Reading".to_string(),
                website_url: None,
                social_facebook: None,
                social_instagram: None,
                social_twitter: None,
                email: None,
                is_verified: true,
                is_active: true,
                created_by: None,
            })
            .await
            .unwrap();
        let event = store
            .create_event(NewEvent {
                club_id: club.id,
                title: "Book swap".to_string(),
                description: None,
                start_time: Utc::now(),
                end_time: None,
                location: None,
                is_online: true,
                is_published: true,
                registration_url: None,
                image_url: None,
                created_by: None,
            })
            .await
            .unwrap();

        assert_eq!(notify_subscribers(&store, &club, &event).await.unwrap(), 0);
    }
}
