//! Turning a club request into a live club.
//!
//! Approval is a chain of dependent writes against independent tables with
//! no transaction around them. Each completed write records how to undo
//! it; when a later write fails the recorded undos run newest first. If an
//! undo fails too, the request stays approved and is flagged
//! `partially_provisioned` so an operator can reset it.

use crate::{
    models::*,
    notify,
    slug::slugify,
    store::{DynStore, Store, StoreError},
};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateClub,
    AssignAdmin,
    PromoteRole,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::CreateClub => "creating the club",
            Step::AssignAdmin => "assigning the club admin",
            Step::PromoteRole => "promoting the requester",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("club request {0} not found")]
    NotFound(i32),
    #[error("a {from} request cannot be marked {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("the club name does not contain any letters or digits")]
    EmptySlug,
    #[error("{step} failed and the approval was undone: {source}")]
    RolledBack { step: Step, source: StoreError },
    #[error("{step} failed and the request is left partially provisioned: {source}")]
    Partial { step: Step, source: StoreError },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provisioned {
    pub request: ClubRequest,
    pub club: Club,
    pub admin: Option<ClubMember>,
    pub profile: Option<Profile>,
    pub notified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejected {
    pub request: ClubRequest,
    pub notified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reopened {
    pub request: ClubRequest,
    pub removed_club: Option<i32>,
}

enum Undo {
    ReopenRequest,
    DeleteClub(i32),
    RemoveAdmin { club_id: i32, user_id: i32 },
}

struct Saga<'a> {
    store: &'a dyn Store,
    request_id: i32,
    undo: Vec<Undo>,
}

impl<'a> Saga<'a> {
    fn new(store: &'a dyn Store, request_id: i32) -> Self {
        Self {
            store,
            request_id,
            undo: Vec::new(),
        }
    }

    fn done(&mut self, undo: Undo) {
        self.undo.push(undo);
    }

    async fn run(&self, undo: &Undo) -> Result<(), StoreError> {
        match *undo {
            Undo::ReopenRequest => self
                .store
                .transition_request(
                    self.request_id,
                    RequestStatus::Approved,
                    RequestReview::reopened(),
                )
                .await
                .map(drop),
            Undo::DeleteClub(club_id) => self.store.delete_club(club_id).await.map(drop),
            Undo::RemoveAdmin { club_id, user_id } => {
                self.store.remove_member(club_id, user_id).await.map(drop)
            }
        }
    }

    /// Undoes the completed steps, newest first, stopping at the first undo
    /// that fails.
    async fn abort(mut self, step: Step, source: StoreError) -> ProvisionError {
        warn!(request = self.request_id, %step, error = %source, "provisioning failed, undoing");

        while let Some(undo) = self.undo.pop() {
            if let Err(e) = self.run(&undo).await {
                error!(request = self.request_id, error = %e, "undo failed");
                if let Err(e) = self.store.flag_partially_provisioned(self.request_id).await {
                    error!(request = self.request_id, error = %e, "could not flag request");
                }
                return ProvisionError::Partial { step, source };
            }
        }

        ProvisionError::RolledBack { step, source }
    }
}

fn new_club(request: &ClubRequest, slug: String) -> NewClub {
    NewClub {
        name: request.club_name.clone(),
        slug,
        category: request.category.clone(),
        short_description: request.description.clone(),
        website_url: request.website_url.clone(),
        social_facebook: request.social_facebook.clone(),
        social_instagram: request.social_instagram.clone(),
        social_twitter: request.social_twitter.clone(),
        email: Some(request.contact_email.clone()),
        is_verified: true,
        is_active: true,
        created_by: request.requested_by,
    }
}

pub struct Provisioner {
    store: DynStore,
}

impl Provisioner {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    async fn load(&self, id: i32, to: RequestStatus) -> Result<ClubRequest, ProvisionError> {
        let request = self
            .store
            .get_request(id)
            .await?
            .ok_or(ProvisionError::NotFound(id))?;
        if !request.status.can_transition(to) {
            return Err(ProvisionError::InvalidTransition {
                from: request.status,
                to,
            });
        }
        Ok(request)
    }

    async fn transition(
        &self,
        request: &ClubRequest,
        review: RequestReview,
    ) -> Result<ClubRequest, ProvisionError> {
        let to = review.status;
        match self
            .store
            .transition_request(request.id, request.status, review)
            .await?
        {
            Some(updated) => Ok(updated),
            // someone else decided in between
            None => match self.store.get_request(request.id).await? {
                Some(current) => Err(ProvisionError::InvalidTransition {
                    from: current.status,
                    to,
                }),
                None => Err(ProvisionError::NotFound(request.id)),
            },
        }
    }

    pub async fn approve(&self, id: i32, reviewer: i32) -> Result<Provisioned, ProvisionError> {
        let store = self.store.as_ref();
        let request = self.load(id, RequestStatus::Approved).await?;
        let slug = slugify(&request.club_name);
        if slug.is_empty() {
            return Err(ProvisionError::EmptySlug);
        }

        let review = RequestReview::decided(RequestStatus::Approved, reviewer, Utc::now(), None);
        let mut request = self.transition(&request, review).await?;
        info!(request = id, reviewer, %slug, "club request approved");

        let mut saga = Saga::new(store, id);
        saga.done(Undo::ReopenRequest);

        let club = match store.create_club(new_club(&request, slug)).await {
            Ok(club) => club,
            Err(e) => return Err(saga.abort(Step::CreateClub, e).await),
        };
        saga.done(Undo::DeleteClub(club.id));
        if let Err(e) = store.link_request_club(id, club.id).await {
            return Err(saga.abort(Step::CreateClub, e).await);
        }
        request.club_id = Some(club.id);

        let Some(requester) = request.requested_by else {
            warn!(request = id, club = club.id, "request has no requester, club left without an admin");
            return Ok(Provisioned {
                request,
                club,
                admin: None,
                profile: None,
                notified: false,
            });
        };

        let admin = NewClubMember {
            club_id: club.id,
            user_id: requester,
            is_admin: true,
            status: MemberStatus::Active,
        };
        let admin = match store.add_member(admin).await {
            Ok(admin) => admin,
            Err(e) => return Err(saga.abort(Step::AssignAdmin, e).await),
        };
        saga.done(Undo::RemoveAdmin {
            club_id: club.id,
            user_id: requester,
        });

        // last fallible step, so there is nothing to undo after it
        let promotion = NewProfile {
            user_id: requester,
            email: request.contact_email.clone(),
            full_name: Some(request.contact_name.clone()),
            role: Role::ClubAdmin,
        };
        let profile = match store.upsert_profile_role(promotion).await {
            Ok(profile) => profile,
            Err(e) => return Err(saga.abort(Step::PromoteRole, e).await),
        };
        info!(request = id, club = club.id, user = requester, "club provisioned");

        let notified = match store
            .create_notifications(vec![notify::club_approved(requester, &club)])
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(request = id, user = requester, error = %e, "approval notification not sent");
                false
            }
        };

        Ok(Provisioned {
            request,
            club,
            admin: Some(admin),
            profile: Some(profile),
            notified,
        })
    }

    pub async fn reject(
        &self,
        id: i32,
        reviewer: i32,
        notes: Option<String>,
    ) -> Result<Rejected, ProvisionError> {
        let request = self.load(id, RequestStatus::Rejected).await?;
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let review = RequestReview::decided(RequestStatus::Rejected, reviewer, Utc::now(), notes);
        let request = self.transition(&request, review).await?;
        info!(request = id, reviewer, "club request rejected");

        let notified = match request.requested_by {
            Some(requester) => match self
                .store
                .create_notifications(vec![notify::club_rejected(requester, &request)])
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    warn!(request = id, user = requester, error = %e, "rejection notification not sent");
                    false
                }
            },
            None => false,
        };

        Ok(Rejected { request, notified })
    }

    /// Reopens a decided request. The club created by an approval is found
    /// through the request's own link and removed with its members.
    pub async fn reset(&self, id: i32) -> Result<Reopened, ProvisionError> {
        let request = self.load(id, RequestStatus::Pending).await?;

        let mut removed_club = None;
        if let Some(club_id) = request.club_id {
            let members = self.store.remove_members_of(club_id).await?;
            if self.store.delete_club(club_id).await? {
                removed_club = Some(club_id);
            }
            info!(request = id, club = club_id, members, "provisioned club removed");
        }

        let request = self.transition(&request, RequestReview::reopened()).await?;
        info!(request = id, "club request reopened");

        Ok(Reopened {
            request,
            removed_club,
        })
    }
}
