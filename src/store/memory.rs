//! In-process store with the same semantics as the Postgres schema, including
//! the cascades its foreign keys perform. Used by tests and `STORE=memory`.

use super::{Store, StoreError, StoreResult};
use crate::{directory::ClubQuery, models::*};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: BTreeMap<i32, UserCredentials>,
    profiles: BTreeMap<i32, Profile>,
    categories: Vec<Category>,
    requests: BTreeMap<i32, ClubRequest>,
    clubs: BTreeMap<i32, Club>,
    members: BTreeMap<(i32, i32), ClubMember>,
    updates: BTreeMap<i32, Update>,
    events: BTreeMap<i32, Event>,
    subscriptions: BTreeMap<(i32, i32), DateTime<Utc>>,
    notifications: BTreeMap<i32, Notification>,
}

impl Tables {
    fn id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    #[cfg(test)]
    faults: std::sync::Mutex<std::collections::HashSet<&'static str>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of the named operation fail.
    #[cfg(test)]
    pub(crate) fn fail(&self, op: &'static str) {
        self.faults.lock().unwrap().insert(op);
    }

    fn check(&self, _op: &'static str) -> StoreResult<()> {
        #[cfg(test)]
        if self.faults.lock().unwrap().contains(_op) {
            return Err(StoreError::Backend(anyhow::anyhow!("injected failure in {_op}")));
        }
        Ok(())
    }

    pub fn with_categories<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tables = Tables::default();
        for name in names {
            let id = tables.id();
            tables.categories.push(Category {
                id,
                name: name.into(),
            });
        }
        Self {
            tables: Mutex::new(tables),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        full_name: Option<String>,
    ) -> StoreResult<Profile> {
        let mut t = self.tables.lock().await;
        if t.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict("user"));
        }
        let id = t.id();
        let now = Utc::now();
        t.users.insert(
            id,
            UserCredentials {
                id,
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                created_at: now,
            },
        );
        let profile = Profile {
            user_id: id,
            email: email.to_string(),
            full_name,
            role: Role::Student,
            created_at: now,
        };
        t.profiles.insert(id, profile.clone());
        Ok(profile)
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_profile(&self, user_id: i32) -> StoreResult<Option<Profile>> {
        Ok(self.tables.lock().await.profiles.get(&user_id).cloned())
    }

    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        let t = self.tables.lock().await;
        Ok(t.profiles.values().find(|p| p.email == email).cloned())
    }

    async fn upsert_profile_role(&self, profile: NewProfile) -> StoreResult<Profile> {
        self.check("upsert_profile_role")?;
        let mut t = self.tables.lock().await;
        let row = t
            .profiles
            .entry(profile.user_id)
            .and_modify(|p| p.role = profile.role)
            .or_insert_with(|| Profile {
                user_id: profile.user_id,
                email: profile.email.clone(),
                full_name: profile.full_name.clone(),
                role: profile.role,
                created_at: Utc::now(),
            });
        Ok(row.clone())
    }

    async fn set_role(&self, user_id: i32, role: Role) -> StoreResult<Option<Profile>> {
        self.check("set_role")?;
        let mut t = self.tables.lock().await;
        Ok(t.profiles.get_mut(&user_id).map(|p| {
            p.role = role;
            p.clone()
        }))
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        Ok(self.tables.lock().await.categories.clone())
    }

    async fn create_request(&self, request: NewClubRequest) -> StoreResult<ClubRequest> {
        let mut t = self.tables.lock().await;
        let id = t.id();
        let row = ClubRequest {
            id,
            club_name: request.club_name,
            category: request.category,
            description: request.description,
            contact_name: request.contact_name,
            contact_email: request.contact_email,
            website_url: request.website_url,
            social_facebook: request.social_facebook,
            social_instagram: request.social_instagram,
            social_twitter: request.social_twitter,
            status: RequestStatus::Pending,
            requested_by: request.requested_by,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            club_id: None,
            partially_provisioned: false,
            created_at: Utc::now(),
        };
        t.requests.insert(id, row.clone());
        Ok(row)
    }

    async fn get_request(&self, id: i32) -> StoreResult<Option<ClubRequest>> {
        Ok(self.tables.lock().await.requests.get(&id).cloned())
    }

    async fn list_requests(&self) -> StoreResult<Vec<ClubRequest>> {
        let t = self.tables.lock().await;
        Ok(t.requests.values().rev().cloned().collect())
    }

    async fn list_requests_by(&self, user_id: i32) -> StoreResult<Vec<ClubRequest>> {
        let t = self.tables.lock().await;
        Ok(t.requests
            .values()
            .rev()
            .filter(|r| r.requested_by == Some(user_id))
            .cloned()
            .collect())
    }

    async fn transition_request(
        &self,
        id: i32,
        from: RequestStatus,
        review: RequestReview,
    ) -> StoreResult<Option<ClubRequest>> {
        self.check("transition_request")?;
        let mut t = self.tables.lock().await;
        let Some(request) = t.requests.get_mut(&id).filter(|r| r.status == from) else {
            return Ok(None);
        };
        request.status = review.status;
        request.reviewed_by = review.reviewed_by;
        request.reviewed_at = review.reviewed_at;
        request.review_notes = review.review_notes;
        request.club_id = review.club_id;
        request.partially_provisioned = review.partially_provisioned;
        Ok(Some(request.clone()))
    }

    async fn link_request_club(&self, id: i32, club_id: i32) -> StoreResult<()> {
        self.check("link_request_club")?;
        let mut t = self.tables.lock().await;
        let request = t
            .requests
            .get_mut(&id)
            .ok_or(StoreError::NotFound("club request"))?;
        request.club_id = Some(club_id);
        Ok(())
    }

    async fn flag_partially_provisioned(&self, id: i32) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        let request = t
            .requests
            .get_mut(&id)
            .ok_or(StoreError::NotFound("club request"))?;
        request.partially_provisioned = true;
        Ok(())
    }

    async fn create_club(&self, club: NewClub) -> StoreResult<Club> {
        self.check("create_club")?;
        let mut t = self.tables.lock().await;
        if t.clubs.values().any(|c| c.slug == club.slug) {
            return Err(StoreError::Conflict("club"));
        }
        let id = t.id();
        let row = Club {
            id,
            name: club.name,
            slug: club.slug,
            category: club.category,
            short_description: club.short_description,
            long_description: None,
            logo_url: None,
            banner_url: None,
            website_url: club.website_url,
            social_facebook: club.social_facebook,
            social_instagram: club.social_instagram,
            social_twitter: club.social_twitter,
            email: club.email,
            phone: None,
            is_verified: club.is_verified,
            is_active: club.is_active,
            website_clicks: 0,
            created_by: club.created_by,
            created_at: Utc::now(),
        };
        t.clubs.insert(id, row.clone());
        Ok(row)
    }

    async fn get_club(&self, id: i32) -> StoreResult<Option<Club>> {
        Ok(self.tables.lock().await.clubs.get(&id).cloned())
    }

    async fn find_club_by_slug(&self, slug: &str) -> StoreResult<Option<Club>> {
        let t = self.tables.lock().await;
        Ok(t.clubs.values().find(|c| c.slug == slug).cloned())
    }

    async fn list_clubs(&self, query: &ClubQuery) -> StoreResult<Vec<Club>> {
        let t = self.tables.lock().await;
        let limit = query
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        Ok(t.clubs
            .values()
            .rev()
            .filter(|c| query.matches(c))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_club(&self, id: i32, edit: ClubEdit) -> StoreResult<Option<Club>> {
        let mut t = self.tables.lock().await;
        Ok(t.clubs.get_mut(&id).map(|club| {
            edit.apply(club);
            club.clone()
        }))
    }

    async fn set_club_verified(&self, id: i32, verified: bool) -> StoreResult<Option<Club>> {
        let mut t = self.tables.lock().await;
        Ok(t.clubs.get_mut(&id).map(|club| {
            club.is_verified = verified;
            club.clone()
        }))
    }

    async fn increment_website_clicks(&self, id: i32) -> StoreResult<Option<i64>> {
        let mut t = self.tables.lock().await;
        Ok(t.clubs.get_mut(&id).map(|club| {
            club.website_clicks += 1;
            club.website_clicks
        }))
    }

    async fn delete_club(&self, id: i32) -> StoreResult<bool> {
        self.check("delete_club")?;
        let mut t = self.tables.lock().await;
        if t.clubs.remove(&id).is_none() {
            return Ok(false);
        }
        t.members.retain(|(club_id, _), _| *club_id != id);
        t.updates.retain(|_, u| u.club_id != id);
        t.events.retain(|_, e| e.club_id != id);
        t.subscriptions.retain(|(club_id, _), _| *club_id != id);
        for request in t.requests.values_mut() {
            if request.club_id == Some(id) {
                request.club_id = None;
            }
        }
        for notification in t.notifications.values_mut() {
            if notification.club_id == Some(id) {
                notification.club_id = None;
            }
        }
        Ok(true)
    }

    async fn stats(&self) -> StoreResult<RegistryStats> {
        let t = self.tables.lock().await;
        Ok(RegistryStats {
            clubs: t.clubs.len() as i64,
            events: t.events.len() as i64,
        })
    }

    async fn add_member(&self, member: NewClubMember) -> StoreResult<ClubMember> {
        self.check("add_member")?;
        let mut t = self.tables.lock().await;
        let key = (member.club_id, member.user_id);
        if !t.clubs.contains_key(&member.club_id) {
            return Err(StoreError::NotFound("club"));
        }
        if t.members.contains_key(&key) {
            return Err(StoreError::Conflict("membership"));
        }
        let row = ClubMember {
            club_id: member.club_id,
            user_id: member.user_id,
            is_admin: member.is_admin,
            status: member.status,
            joined_at: Utc::now(),
        };
        t.members.insert(key, row.clone());
        Ok(row)
    }

    async fn get_member(&self, club_id: i32, user_id: i32) -> StoreResult<Option<ClubMember>> {
        let t = self.tables.lock().await;
        Ok(t.members.get(&(club_id, user_id)).cloned())
    }

    async fn list_members(&self, club_id: i32) -> StoreResult<Vec<ClubMember>> {
        let t = self.tables.lock().await;
        Ok(t.members
            .values()
            .filter(|m| m.club_id == club_id)
            .cloned()
            .collect())
    }

    async fn list_memberships(&self, user_id: i32) -> StoreResult<Vec<ClubMember>> {
        let t = self.tables.lock().await;
        Ok(t.members
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_admin_club(&self, user_id: i32) -> StoreResult<Option<i32>> {
        let t = self.tables.lock().await;
        Ok(t.members
            .values()
            .find(|m| m.user_id == user_id && m.is_admin && m.status == MemberStatus::Active)
            .map(|m| m.club_id))
    }

    async fn set_member_status(
        &self,
        club_id: i32,
        user_id: i32,
        status: MemberStatus,
    ) -> StoreResult<Option<ClubMember>> {
        let mut t = self.tables.lock().await;
        Ok(t.members.get_mut(&(club_id, user_id)).map(|m| {
            m.status = status;
            m.clone()
        }))
    }

    async fn set_member_admin(
        &self,
        club_id: i32,
        user_id: i32,
        is_admin: bool,
    ) -> StoreResult<Option<ClubMember>> {
        let mut t = self.tables.lock().await;
        Ok(t.members.get_mut(&(club_id, user_id)).map(|m| {
            m.is_admin = is_admin;
            m.clone()
        }))
    }

    async fn remove_member(&self, club_id: i32, user_id: i32) -> StoreResult<bool> {
        self.check("remove_member")?;
        let mut t = self.tables.lock().await;
        Ok(t.members.remove(&(club_id, user_id)).is_some())
    }

    async fn remove_members_of(&self, club_id: i32) -> StoreResult<usize> {
        let mut t = self.tables.lock().await;
        let before = t.members.len();
        t.members.retain(|(id, _), _| *id != club_id);
        Ok(before - t.members.len())
    }

    async fn create_update(&self, update: NewUpdate) -> StoreResult<Update> {
        let mut t = self.tables.lock().await;
        if !t.clubs.contains_key(&update.club_id) {
            return Err(StoreError::NotFound("club"));
        }
        let id = t.id();
        let now = Utc::now();
        let row = Update {
            id,
            club_id: update.club_id,
            title: update.title,
            body: update.body,
            kind: update.kind,
            is_published: update.is_published,
            is_pinned: update.is_pinned,
            redirect_url: update.redirect_url,
            created_by: update.created_by,
            published_at: now,
            created_at: now,
        };
        t.updates.insert(id, row.clone());
        Ok(row)
    }

    async fn get_update(&self, id: i32) -> StoreResult<Option<Update>> {
        Ok(self.tables.lock().await.updates.get(&id).cloned())
    }

    async fn edit_update(&self, id: i32, edit: UpdateEdit) -> StoreResult<Option<Update>> {
        let mut t = self.tables.lock().await;
        Ok(t.updates.get_mut(&id).map(|update| {
            edit.apply(update);
            update.clone()
        }))
    }

    async fn delete_update(&self, id: i32) -> StoreResult<bool> {
        Ok(self.tables.lock().await.updates.remove(&id).is_some())
    }

    async fn list_club_updates(
        &self,
        club_id: i32,
        published_only: bool,
    ) -> StoreResult<Vec<Update>> {
        let t = self.tables.lock().await;
        let mut updates: Vec<Update> = t
            .updates
            .values()
            .rev()
            .filter(|u| u.club_id == club_id && (!published_only || u.is_published))
            .cloned()
            .collect();
        // stable: newest-first order survives within each pin group
        updates.sort_by_key(|u| !u.is_pinned);
        Ok(updates)
    }

    async fn list_notices(&self, kind: Option<&str>) -> StoreResult<Vec<Update>> {
        let t = self.tables.lock().await;
        let mut notices: Vec<Update> = t
            .updates
            .values()
            .rev()
            .filter(|u| u.is_published && kind.map_or(true, |k| u.kind == k))
            .cloned()
            .collect();
        notices.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(notices)
    }

    async fn create_event(&self, event: NewEvent) -> StoreResult<Event> {
        let mut t = self.tables.lock().await;
        if !t.clubs.contains_key(&event.club_id) {
            return Err(StoreError::NotFound("club"));
        }
        let id = t.id();
        let row = Event {
            id,
            club_id: event.club_id,
            title: event.title,
            description: event.description,
            start_time: event.start_time,
            end_time: event.end_time,
            location: event.location,
            is_online: event.is_online,
            is_published: event.is_published,
            registration_url: event.registration_url,
            image_url: event.image_url,
            created_by: event.created_by,
            created_at: Utc::now(),
        };
        t.events.insert(id, row.clone());
        Ok(row)
    }

    async fn get_event(&self, id: i32) -> StoreResult<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn edit_event(&self, id: i32, edit: EventEdit) -> StoreResult<Option<Event>> {
        let mut t = self.tables.lock().await;
        Ok(t.events.get_mut(&id).map(|event| {
            edit.apply(event);
            event.clone()
        }))
    }

    async fn delete_event(&self, id: i32) -> StoreResult<bool> {
        Ok(self.tables.lock().await.events.remove(&id).is_some())
    }

    async fn list_club_events(
        &self,
        club_id: i32,
        published_only: bool,
    ) -> StoreResult<Vec<Event>> {
        let t = self.tables.lock().await;
        let mut events: Vec<Event> = t
            .events
            .values()
            .filter(|e| e.club_id == club_id && (!published_only || e.is_published))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start_time);
        Ok(events)
    }

    async fn list_events(&self, from: Option<DateTime<Utc>>) -> StoreResult<Vec<Event>> {
        let t = self.tables.lock().await;
        let mut events: Vec<Event> = t
            .events
            .values()
            .filter(|e| e.is_published && from.map_or(true, |from| e.start_time >= from))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start_time);
        Ok(events)
    }

    async fn subscribe(&self, club_id: i32, user_id: i32) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        if !t.clubs.contains_key(&club_id) {
            return Err(StoreError::NotFound("club"));
        }
        if t.subscriptions.contains_key(&(club_id, user_id)) {
            return Ok(false);
        }
        t.subscriptions.insert((club_id, user_id), Utc::now());
        Ok(true)
    }

    async fn unsubscribe(&self, club_id: i32, user_id: i32) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        Ok(t.subscriptions.remove(&(club_id, user_id)).is_some())
    }

    async fn list_subscribers(&self, club_id: i32) -> StoreResult<Vec<i32>> {
        let t = self.tables.lock().await;
        Ok(t.subscriptions
            .keys()
            .filter(|(id, _)| *id == club_id)
            .map(|(_, user_id)| *user_id)
            .collect())
    }

    async fn create_notifications(
        &self,
        batch: Vec<NewNotification>,
    ) -> StoreResult<usize> {
        self.check("create_notifications")?;
        let mut t = self.tables.lock().await;
        let count = batch.len();
        for n in batch {
            let id = t.id();
            t.notifications.insert(
                id,
                Notification {
                    id,
                    recipient: n.recipient,
                    club_id: n.club_id,
                    kind: n.kind,
                    title: n.title,
                    message: n.message,
                    link: n.link,
                    is_read: false,
                    created_at: Utc::now(),
                },
            );
        }
        Ok(count)
    }

    async fn list_notifications(
        &self,
        recipient: i32,
        limit: i64,
    ) -> StoreResult<Vec<Notification>> {
        let t = self.tables.lock().await;
        Ok(t.notifications
            .values()
            .rev()
            .filter(|n| n.recipient == recipient)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn unread_count(&self, recipient: i32) -> StoreResult<i64> {
        let t = self.tables.lock().await;
        Ok(t.notifications
            .values()
            .filter(|n| n.recipient == recipient && !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, recipient: i32, id: i32) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        match t.notifications.get_mut(&id) {
            Some(n) if n.recipient == recipient => {
                n.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient: i32) -> StoreResult<usize> {
        let mut t = self.tables.lock().await;
        let mut count = 0;
        for n in t
            .notifications
            .values_mut()
            .filter(|n| n.recipient == recipient && !n.is_read)
        {
            n.is_read = true;
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn club(slug: &str) -> NewClub {
        NewClub {
            name: slug.to_string(),
            slug: slug.to_string(),
            category: "Technical".to_string(),
            short_description: "A club".to_string(),
            website_url: None,
            social_facebook: None,
            social_instagram: None,
            social_twitter: None,
            email: None,
            is_verified: true,
            is_active: true,
            created_by: None,
        }
    }

    fn member(club_id: i32, is_admin: bool, status: MemberStatus) -> NewClubMember {
        NewClubMember {
            club_id,
            user_id: 9,
            is_admin,
            status,
        }
    }

    #[tokio::test]
    async fn admin_club_is_the_lowest_id_active_admin_membership() {
        let store = MemoryStore::new();
        let first = store.create_club(club("first")).await.unwrap();
        let second = store.create_club(club("second")).await.unwrap();
        let third = store.create_club(club("third")).await.unwrap();

        store
            .add_member(member(third.id, true, MemberStatus::Active))
            .await
            .unwrap();
        store
            .add_member(member(first.id, false, MemberStatus::Active))
            .await
            .unwrap();
        assert_eq!(store.find_admin_club(9).await.unwrap(), Some(third.id));

        store
            .add_member(member(second.id, true, MemberStatus::Active))
            .await
            .unwrap();
        assert_eq!(store.find_admin_club(9).await.unwrap(), Some(second.id));
        assert_eq!(store.find_admin_club(10).await.unwrap(), None);
    }
}
