//! Join requests and the roster a club admin manages.

use crate::{
    models::{Club, ClubMember, MemberStatus, NewClubMember, NewNotification},
    notify,
    store::{DynStore, StoreError},
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("club not found")]
    ClubNotFound,
    #[error("membership not found")]
    NotFound,
    #[error("this club is not accepting members")]
    ClubInactive,
    #[error("you already have a membership in this club")]
    AlreadyMember,
    #[error("a {from} membership cannot be marked {to}")]
    InvalidTransition { from: MemberStatus, to: MemberStatus },
    #[error("only active members can be made admins")]
    NotActive,
    #[error("you cannot change your own membership")]
    OwnMembership,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A roster change plus whether the affected member was told about it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberChange {
    #[serde(flatten)]
    pub member: ClubMember,
    pub notified: bool,
}

pub struct Roster {
    store: DynStore,
}

impl Roster {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    async fn club(&self, club_id: i32) -> Result<Club, MembershipError> {
        self.store
            .get_club(club_id)
            .await?
            .ok_or(MembershipError::ClubNotFound)
    }

    async fn member(&self, club_id: i32, user_id: i32) -> Result<ClubMember, MembershipError> {
        self.store
            .get_member(club_id, user_id)
            .await?
            .ok_or(MembershipError::NotFound)
    }

    fn not_self(actor: i32, user_id: i32) -> Result<(), MembershipError> {
        if actor == user_id {
            return Err(MembershipError::OwnMembership);
        }
        Ok(())
    }

    async fn send(&self, notification: NewNotification) -> bool {
        let recipient = notification.recipient;
        match self.store.create_notifications(vec![notification]).await {
            Ok(_) => true,
            Err(e) => {
                warn!(user = recipient, error = %e, "membership notification not sent");
                false
            }
        }
    }

    pub async fn join(&self, club_id: i32, user_id: i32) -> Result<ClubMember, MembershipError> {
        let club = self.club(club_id).await?;
        if !club.is_active {
            return Err(MembershipError::ClubInactive);
        }
        let member = NewClubMember {
            club_id,
            user_id,
            is_admin: false,
            status: MemberStatus::Pending,
        };
        match self.store.add_member(member).await {
            Ok(member) => {
                info!(club = club_id, user = user_id, "join requested");
                Ok(member)
            }
            Err(StoreError::Conflict(_)) => Err(MembershipError::AlreadyMember),
            Err(StoreError::NotFound(_)) => Err(MembershipError::ClubNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Approves or rejects a pending join request and tells the applicant.
    pub async fn decide(
        &self,
        actor: i32,
        club_id: i32,
        user_id: i32,
        to: MemberStatus,
    ) -> Result<MemberChange, MembershipError> {
        Self::not_self(actor, user_id)?;
        let club = self.club(club_id).await?;
        let member = self.member(club_id, user_id).await?;
        if !member.status.can_transition(to) {
            return Err(MembershipError::InvalidTransition {
                from: member.status,
                to,
            });
        }

        let member = self
            .store
            .set_member_status(club_id, user_id, to)
            .await?
            .ok_or(MembershipError::NotFound)?;
        info!(club = club_id, user = user_id, status = %to, "membership decided");

        let notification = match to {
            MemberStatus::Active => notify::join_approved(user_id, &club),
            _ => notify::join_rejected(user_id, &club),
        };
        let notified = self.send(notification).await;
        Ok(MemberChange { member, notified })
    }

    pub async fn set_admin(
        &self,
        actor: i32,
        club_id: i32,
        user_id: i32,
        is_admin: bool,
    ) -> Result<MemberChange, MembershipError> {
        Self::not_self(actor, user_id)?;
        let club = self.club(club_id).await?;
        let member = self.member(club_id, user_id).await?;
        if member.status != MemberStatus::Active {
            return Err(MembershipError::NotActive);
        }
        if member.is_admin == is_admin {
            return Ok(MemberChange {
                member,
                notified: false,
            });
        }

        let member = self
            .store
            .set_member_admin(club_id, user_id, is_admin)
            .await?
            .ok_or(MembershipError::NotFound)?;
        info!(club = club_id, user = user_id, is_admin, "admin flag changed");

        let notified = is_admin && self.send(notify::admin_promoted(user_id, &club)).await;
        Ok(MemberChange { member, notified })
    }

    pub async fn remove(&self, actor: i32, club_id: i32, user_id: i32) -> Result<(), MembershipError> {
        Self::not_self(actor, user_id)?;
        if !self.store.remove_member(club_id, user_id).await? {
            return Err(MembershipError::NotFound);
        }
        info!(club = club_id, user = user_id, "member removed");
        Ok(())
    }
}
