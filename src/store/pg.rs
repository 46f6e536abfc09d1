use super::{Store, StoreError, StoreResult};
use crate::{
    directory::{CategoryFilter, ClubQuery},
    models::*,
    schema::*,
    DbPool,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool::managed::Object;
use diesel::{
    pg::Pg,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::{pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection, RunQueryDsl};

type Conn = Object<AsyncDieselConnectionManager<AsyncPgConnection>>;

impl From<DieselError> for StoreError {
    fn from(e: DieselError) -> Self {
        StoreError::Backend(e.into())
    }
}

/// Maps constraint violations of an insert to the domain errors callers
/// branch on.
fn insert_error(what: &'static str, parent: &'static str) -> impl FnOnce(DieselError) -> StoreError {
    move |e| match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            StoreError::Conflict(what)
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            StoreError::NotFound(parent)
        }
        e => e.into(),
    }
}

fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<Conn> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("database pool: {e}")))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        full_name: Option<String>,
    ) -> StoreResult<Profile> {
        let conn = &mut self.conn().await?;

        let user = diesel::insert_into(users::table)
            .values((
                users::email.eq(email),
                users::password_hash.eq(password_hash),
            ))
            .get_result::<UserCredentials>(conn)
            .await
            .map_err(insert_error("user", "user"))?;

        Ok(diesel::insert_into(profiles::table)
            .values(NewProfile {
                user_id: user.id,
                email: user.email,
                full_name,
                role: Role::Student,
            })
            .get_result::<Profile>(conn)
            .await?)
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        let conn = &mut self.conn().await?;
        Ok(users::table
            .filter(users::email.eq(email))
            .first::<UserCredentials>(conn)
            .await
            .optional()?)
    }

    async fn get_profile(&self, user_id: i32) -> StoreResult<Option<Profile>> {
        let conn = &mut self.conn().await?;
        Ok(profiles::table
            .find(user_id)
            .first::<Profile>(conn)
            .await
            .optional()?)
    }

    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        let conn = &mut self.conn().await?;
        Ok(profiles::table
            .filter(profiles::email.eq(email))
            .first::<Profile>(conn)
            .await
            .optional()?)
    }

    async fn upsert_profile_role(&self, profile: NewProfile) -> StoreResult<Profile> {
        let conn = &mut self.conn().await?;
        Ok(diesel::insert_into(profiles::table)
            .values(&profile)
            .on_conflict(profiles::user_id)
            .do_update()
            .set(profiles::role.eq(profile.role))
            .get_result::<Profile>(conn)
            .await
            .map_err(insert_error("profile", "user"))?)
    }

    async fn set_role(&self, user_id: i32, role: Role) -> StoreResult<Option<Profile>> {
        let conn = &mut self.conn().await?;
        Ok(diesel::update(profiles::table.find(user_id))
            .set(profiles::role.eq(role))
            .get_result::<Profile>(conn)
            .await
            .optional()?)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let conn = &mut self.conn().await?;
        Ok(categories::table
            .order(categories::name.asc())
            .load::<Category>(conn)
            .await?)
    }

    async fn create_request(&self, request: NewClubRequest) -> StoreResult<ClubRequest> {
        let conn = &mut self.conn().await?;
        Ok(diesel::insert_into(club_requests::table)
            .values(request)
            .get_result::<ClubRequest>(conn)
            .await?)
    }

    async fn get_request(&self, id: i32) -> StoreResult<Option<ClubRequest>> {
        let conn = &mut self.conn().await?;
        Ok(club_requests::table
            .find(id)
            .first::<ClubRequest>(conn)
            .await
            .optional()?)
    }

    async fn list_requests(&self) -> StoreResult<Vec<ClubRequest>> {
        let conn = &mut self.conn().await?;
        Ok(club_requests::table
            .order((club_requests::created_at.desc(), club_requests::id.desc()))
            .load::<ClubRequest>(conn)
            .await?)
    }

    async fn list_requests_by(&self, user_id: i32) -> StoreResult<Vec<ClubRequest>> {
        let conn = &mut self.conn().await?;
        Ok(club_requests::table
            .filter(club_requests::requested_by.eq(user_id))
            .order((club_requests::created_at.desc(), club_requests::id.desc()))
            .load::<ClubRequest>(conn)
            .await?)
    }

    async fn transition_request(
        &self,
        id: i32,
        from: RequestStatus,
        review: RequestReview,
    ) -> StoreResult<Option<ClubRequest>> {
        let conn = &mut self.conn().await?;
        Ok(diesel::update(
            club_requests::table
                .filter(club_requests::id.eq(id))
                .filter(club_requests::status.eq(from)),
        )
        .set(&review)
        .get_result::<ClubRequest>(conn)
        .await
        .optional()?)
    }

    async fn link_request_club(&self, id: i32, club_id: i32) -> StoreResult<()> {
        let conn = &mut self.conn().await?;
        let rows = diesel::update(club_requests::table.find(id))
            .set(club_requests::club_id.eq(club_id))
            .execute(conn)
            .await?;
        if rows == 0 {
            return Err(StoreError::NotFound("club request"));
        }
        Ok(())
    }

    async fn flag_partially_provisioned(&self, id: i32) -> StoreResult<()> {
        let conn = &mut self.conn().await?;
        let rows = diesel::update(club_requests::table.find(id))
            .set(club_requests::partially_provisioned.eq(true))
            .execute(conn)
            .await?;
        if rows == 0 {
            return Err(StoreError::NotFound("club request"));
        }
        Ok(())
    }

    async fn create_club(&self, club: NewClub) -> StoreResult<Club> {
        let conn = &mut self.conn().await?;
        diesel::insert_into(clubs::table)
            .values(club)
            .get_result::<Club>(conn)
            .await
            .map_err(insert_error("club", "user"))
    }

    async fn get_club(&self, id: i32) -> StoreResult<Option<Club>> {
        let conn = &mut self.conn().await?;
        Ok(clubs::table.find(id).first::<Club>(conn).await.optional()?)
    }

    async fn find_club_by_slug(&self, slug: &str) -> StoreResult<Option<Club>> {
        let conn = &mut self.conn().await?;
        Ok(clubs::table
            .filter(clubs::slug.eq(slug))
            .first::<Club>(conn)
            .await
            .optional()?)
    }

    async fn list_clubs(&self, query: &ClubQuery) -> StoreResult<Vec<Club>> {
        let conn = &mut self.conn().await?;

        let mut q: clubs::BoxedQuery<'_, Pg> = clubs::table.into_boxed();
        if query.active_only {
            q = q.filter(clubs::is_active.eq(true));
        }
        if query.verified_only {
            q = q.filter(clubs::is_verified.eq(true));
        }
        if let CategoryFilter::Only(category) = &query.filter.category {
            q = q.filter(clubs::category.eq(category.clone()));
        }
        if let Some(term) = query.filter.search() {
            let pattern = like_pattern(term);
            q = q.filter(
                clubs::name
                    .ilike(pattern.clone())
                    .or(clubs::short_description.ilike(pattern)),
            );
        }
        if let Some(limit) = query.limit {
            q = q.limit(limit);
        }

        Ok(q.order((clubs::created_at.desc(), clubs::id.desc()))
            .load::<Club>(conn)
            .await?)
    }

    async fn update_club(&self, id: i32, edit: ClubEdit) -> StoreResult<Option<Club>> {
        if edit.is_empty() {
            return self.get_club(id).await;
        }
        let conn = &mut self.conn().await?;
        Ok(diesel::update(clubs::table.find(id))
            .set(edit)
            .get_result::<Club>(conn)
            .await
            .optional()?)
    }

    async fn set_club_verified(&self, id: i32, verified: bool) -> StoreResult<Option<Club>> {
        let conn = &mut self.conn().await?;
        Ok(diesel::update(clubs::table.find(id))
            .set(clubs::is_verified.eq(verified))
            .get_result::<Club>(conn)
            .await
            .optional()?)
    }

    async fn increment_website_clicks(&self, id: i32) -> StoreResult<Option<i64>> {
        let conn = &mut self.conn().await?;
        Ok(diesel::update(clubs::table.find(id))
            .set(clubs::website_clicks.eq(clubs::website_clicks + 1i64))
            .returning(clubs::website_clicks)
            .get_result::<i64>(conn)
            .await
            .optional()?)
    }

    async fn delete_club(&self, id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;
        let rows = diesel::delete(clubs::table.find(id)).execute(conn).await?;
        Ok(rows > 0)
    }

    async fn stats(&self) -> StoreResult<RegistryStats> {
        let conn = &mut self.conn().await?;
        let clubs = clubs::table.count().get_result::<i64>(conn).await?;
        let events = events::table.count().get_result::<i64>(conn).await?;
        Ok(RegistryStats { clubs, events })
    }

    async fn add_member(&self, member: NewClubMember) -> StoreResult<ClubMember> {
        let conn = &mut self.conn().await?;
        diesel::insert_into(club_members::table)
            .values(member)
            .get_result::<ClubMember>(conn)
            .await
            .map_err(insert_error("membership", "club"))
    }

    async fn get_member(&self, club_id: i32, user_id: i32) -> StoreResult<Option<ClubMember>> {
        let conn = &mut self.conn().await?;
        Ok(club_members::table
            .find((club_id, user_id))
            .first::<ClubMember>(conn)
            .await
            .optional()?)
    }

    async fn list_members(&self, club_id: i32) -> StoreResult<Vec<ClubMember>> {
        let conn = &mut self.conn().await?;
        Ok(club_members::table
            .filter(club_members::club_id.eq(club_id))
            .order(club_members::joined_at.asc())
            .load::<ClubMember>(conn)
            .await?)
    }

    async fn list_memberships(&self, user_id: i32) -> StoreResult<Vec<ClubMember>> {
        let conn = &mut self.conn().await?;
        Ok(club_members::table
            .filter(club_members::user_id.eq(user_id))
            .order(club_members::joined_at.asc())
            .load::<ClubMember>(conn)
            .await?)
    }

    async fn find_admin_club(&self, user_id: i32) -> StoreResult<Option<i32>> {
        let conn = &mut self.conn().await?;
        Ok(club_members::table
            .filter(club_members::user_id.eq(user_id))
            .filter(club_members::is_admin.eq(true))
            .filter(club_members::status.eq(MemberStatus::Active))
            .order(club_members::club_id.asc())
            .select(club_members::club_id)
            .first::<i32>(conn)
            .await
            .optional()?)
    }

    async fn set_member_status(
        &self,
        club_id: i32,
        user_id: i32,
        status: MemberStatus,
    ) -> StoreResult<Option<ClubMember>> {
        let conn = &mut self.conn().await?;
        Ok(diesel::update(club_members::table.find((club_id, user_id)))
            .set(club_members::status.eq(status))
            .get_result::<ClubMember>(conn)
            .await
            .optional()?)
    }

    async fn set_member_admin(
        &self,
        club_id: i32,
        user_id: i32,
        is_admin: bool,
    ) -> StoreResult<Option<ClubMember>> {
        let conn = &mut self.conn().await?;
        Ok(diesel::update(club_members::table.find((club_id, user_id)))
            .set(club_members::is_admin.eq(is_admin))
            .get_result::<ClubMember>(conn)
            .await
            .optional()?)
    }

    async fn remove_member(&self, club_id: i32, user_id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;
        let rows = diesel::delete(club_members::table.find((club_id, user_id)))
            .execute(conn)
            .await?;
        Ok(rows > 0)
    }

    async fn remove_members_of(&self, club_id: i32) -> StoreResult<usize> {
        let conn = &mut self.conn().await?;
        Ok(
            diesel::delete(club_members::table.filter(club_members::club_id.eq(club_id)))
                .execute(conn)
                .await?,
        )
    }

    async fn create_update(&self, update: NewUpdate) -> StoreResult<Update> {
        let conn = &mut self.conn().await?;
        diesel::insert_into(updates::table)
            .values(update)
            .get_result::<Update>(conn)
            .await
            .map_err(insert_error("update", "club"))
    }

    async fn get_update(&self, id: i32) -> StoreResult<Option<Update>> {
        let conn = &mut self.conn().await?;
        Ok(updates::table.find(id).first::<Update>(conn).await.optional()?)
    }

    async fn edit_update(&self, id: i32, edit: UpdateEdit) -> StoreResult<Option<Update>> {
        if edit.is_empty() {
            return self.get_update(id).await;
        }
        let conn = &mut self.conn().await?;
        Ok(diesel::update(updates::table.find(id))
            .set(edit)
            .get_result::<Update>(conn)
            .await
            .optional()?)
    }

    async fn delete_update(&self, id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;
        let rows = diesel::delete(updates::table.find(id)).execute(conn).await?;
        Ok(rows > 0)
    }

    async fn list_club_updates(
        &self,
        club_id: i32,
        published_only: bool,
    ) -> StoreResult<Vec<Update>> {
        let conn = &mut self.conn().await?;
        let mut q: updates::BoxedQuery<'_, Pg> = updates::table
            .filter(updates::club_id.eq(club_id))
            .into_boxed();
        if published_only {
            q = q.filter(updates::is_published.eq(true));
        }
        Ok(q
            .order((
                updates::is_pinned.desc(),
                updates::created_at.desc(),
                updates::id.desc(),
            ))
            .load::<Update>(conn)
            .await?)
    }

    async fn list_notices(&self, kind: Option<&str>) -> StoreResult<Vec<Update>> {
        let conn = &mut self.conn().await?;
        let mut q: updates::BoxedQuery<'_, Pg> = updates::table
            .filter(updates::is_published.eq(true))
            .into_boxed();
        if let Some(kind) = kind {
            q = q.filter(updates::kind.eq(kind.to_string()));
        }
        Ok(q
            .order((updates::published_at.desc(), updates::id.desc()))
            .load::<Update>(conn)
            .await?)
    }

    async fn create_event(&self, event: NewEvent) -> StoreResult<Event> {
        let conn = &mut self.conn().await?;
        diesel::insert_into(events::table)
            .values(event)
            .get_result::<Event>(conn)
            .await
            .map_err(insert_error("event", "club"))
    }

    async fn get_event(&self, id: i32) -> StoreResult<Option<Event>> {
        let conn = &mut self.conn().await?;
        Ok(events::table.find(id).first::<Event>(conn).await.optional()?)
    }

    async fn edit_event(&self, id: i32, edit: EventEdit) -> StoreResult<Option<Event>> {
        if edit.is_empty() {
            return self.get_event(id).await;
        }
        let conn = &mut self.conn().await?;
        Ok(diesel::update(events::table.find(id))
            .set(edit)
            .get_result::<Event>(conn)
            .await
            .optional()?)
    }

    async fn delete_event(&self, id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;
        let rows = diesel::delete(events::table.find(id)).execute(conn).await?;
        Ok(rows > 0)
    }

    async fn list_club_events(
        &self,
        club_id: i32,
        published_only: bool,
    ) -> StoreResult<Vec<Event>> {
        let conn = &mut self.conn().await?;
        let mut q: events::BoxedQuery<'_, Pg> = events::table
            .filter(events::club_id.eq(club_id))
            .into_boxed();
        if published_only {
            q = q.filter(events::is_published.eq(true));
        }
        Ok(q
            .order((events::start_time.asc(), events::id.asc()))
            .load::<Event>(conn)
            .await?)
    }

    async fn list_events(&self, from: Option<DateTime<Utc>>) -> StoreResult<Vec<Event>> {
        let conn = &mut self.conn().await?;
        let mut q: events::BoxedQuery<'_, Pg> = events::table
            .filter(events::is_published.eq(true))
            .into_boxed();
        if let Some(from) = from {
            q = q.filter(events::start_time.ge(from));
        }
        Ok(q
            .order((events::start_time.asc(), events::id.asc()))
            .load::<Event>(conn)
            .await?)
    }

    async fn subscribe(&self, club_id: i32, user_id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;
        let rows = diesel::insert_into(subscriptions::table)
            .values((
                subscriptions::club_id.eq(club_id),
                subscriptions::user_id.eq(user_id),
            ))
            .on_conflict_do_nothing()
            .execute(conn)
            .await
            .map_err(insert_error("subscription", "club"))?;
        Ok(rows > 0)
    }

    async fn unsubscribe(&self, club_id: i32, user_id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;
        let rows = diesel::delete(subscriptions::table.find((club_id, user_id)))
            .execute(conn)
            .await?;
        Ok(rows > 0)
    }

    async fn list_subscribers(&self, club_id: i32) -> StoreResult<Vec<i32>> {
        let conn = &mut self.conn().await?;
        Ok(subscriptions::table
            .filter(subscriptions::club_id.eq(club_id))
            .select(subscriptions::user_id)
            .load::<i32>(conn)
            .await?)
    }

    async fn create_notifications(
        &self,
        batch: Vec<NewNotification>,
    ) -> StoreResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let conn = &mut self.conn().await?;
        Ok(diesel::insert_into(notifications::table)
            .values(&batch)
            .execute(conn)
            .await?)
    }

    async fn list_notifications(
        &self,
        recipient: i32,
        limit: i64,
    ) -> StoreResult<Vec<Notification>> {
        let conn = &mut self.conn().await?;
        Ok(notifications::table
            .filter(notifications::recipient.eq(recipient))
            .order((notifications::created_at.desc(), notifications::id.desc()))
            .limit(limit)
            .load::<Notification>(conn)
            .await?)
    }

    async fn unread_count(&self, recipient: i32) -> StoreResult<i64> {
        let conn = &mut self.conn().await?;
        Ok(notifications::table
            .filter(notifications::recipient.eq(recipient))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result::<i64>(conn)
            .await?)
    }

    async fn mark_read(&self, recipient: i32, id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;
        let rows = diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::recipient.eq(recipient)),
        )
        .set(notifications::is_read.eq(true))
        .execute(conn)
        .await?;
        Ok(rows > 0)
    }

    async fn mark_all_read(&self, recipient: i32) -> StoreResult<usize> {
        let conn = &mut self.conn().await?;
        Ok(diesel::update(
            notifications::table
                .filter(notifications::recipient.eq(recipient))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(conn)
        .await?)
    }
}
