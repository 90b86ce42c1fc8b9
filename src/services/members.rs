use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        team,
        team_member::{self, MemberRole},
        user,
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddMemberRequest {
    #[validate(email)]
    pub email: String,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateMemberRoleRequest {
    pub role: MemberRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberResponse {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

fn to_response(membership: team_member::Model, account: user::Model) -> MemberResponse {
    MemberResponse {
        user_id: account.id,
        name: account.name,
        email: account.email,
        role: membership.role,
        joined_at: membership.joined_at,
    }
}

/// Team membership and the access checks built on it
#[derive(Clone)]
pub struct MemberService {
    db: Arc<DatabaseConnection>,
}

impl MemberService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<team_member::Model>, ServiceError> {
        team_member::Entity::find()
            .filter(team_member::Column::TeamId.eq(team_id))
            .filter(team_member::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Returns the caller's membership or 403. A team that does not exist is 404.
    pub async fn require_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<team_member::Model, ServiceError> {
        if let Some(membership) = self.membership(team_id, user_id).await? {
            return Ok(membership);
        }

        let exists = team::Entity::find_by_id(team_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .is_some();
        if exists {
            warn!(team_id = %team_id, user_id = %user_id, "Rejected non-member access");
            Err(ServiceError::Forbidden(
                "You are not a member of this team".to_string(),
            ))
        } else {
            Err(ServiceError::NotFound(format!("Team {team_id} not found")))
        }
    }

    /// Like [`require_member`](Self::require_member) but also checks the role.
    pub async fn require_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        allowed: &[MemberRole],
    ) -> Result<team_member::Model, ServiceError> {
        let membership = self.require_member(team_id, user_id).await?;
        if allowed.contains(&membership.role) {
            Ok(membership)
        } else {
            Err(ServiceError::Forbidden(format!(
                "This action requires one of the roles: {}",
                allowed
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    pub async fn require_admin(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<team_member::Model, ServiceError> {
        self.require_role(team_id, user_id, &[MemberRole::Admin]).await
    }

    #[instrument(skip(self))]
    pub async fn list_members(&self, team_id: Uuid) -> Result<Vec<MemberResponse>, ServiceError> {
        let rows = team_member::Entity::find()
            .filter(team_member::Column::TeamId.eq(team_id))
            .find_also_related(user::Entity)
            .order_by_asc(team_member::Column::JoinedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(rows
            .into_iter()
            .filter_map(|(membership, account)| account.map(|a| to_response(membership, a)))
            .collect())
    }

    #[instrument(skip(self, request), fields(role = %request.role))]
    pub async fn add_member(
        &self,
        team_id: Uuid,
        request: AddMemberRequest,
    ) -> Result<MemberResponse, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_ascii_lowercase();

        let account = user::Entity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("No account registered for {email}")))?;

        if self.membership(team_id, account.id).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "{email} is already a member of this team"
            )));
        }

        let membership = team_member::ActiveModel {
            id: Set(Uuid::new_v4()),
            team_id: Set(team_id),
            user_id: Set(account.id),
            role: Set(request.role),
            joined_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::DatabaseError)?;

        info!(team_id = %team_id, user_id = %account.id, "Member added");
        Ok(to_response(membership, account))
    }

    /// Changes a member's role. The last admin cannot be demoted.
    #[instrument(skip(self))]
    pub async fn update_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<MemberResponse, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let (membership, account) = team_member::Entity::find()
            .filter(team_member::Column::TeamId.eq(team_id))
            .filter(team_member::Column::UserId.eq(user_id))
            .find_also_related(user::Entity)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .and_then(|(m, u)| u.map(|u| (m, u)))
            .ok_or_else(|| ServiceError::NotFound("Member not found in this team".into()))?;

        if membership.role == MemberRole::Admin && role != MemberRole::Admin {
            let admins = count_admins(&txn, team_id).await?;
            if admins <= 1 {
                return Err(ServiceError::Conflict(
                    "A team must keep at least one admin".into(),
                ));
            }
        }

        let mut active: team_member::ActiveModel = membership.into();
        active.role = Set(role);
        let updated = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;
        info!(team_id = %team_id, user_id = %user_id, role = %role, "Member role changed");
        Ok(to_response(updated, account))
    }

    /// Removes a member. The last admin cannot be removed.
    #[instrument(skip(self))]
    pub async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let membership = team_member::Entity::find()
            .filter(team_member::Column::TeamId.eq(team_id))
            .filter(team_member::Column::UserId.eq(user_id))
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Member not found in this team".into()))?;

        if membership.role == MemberRole::Admin && count_admins(&txn, team_id).await? <= 1 {
            return Err(ServiceError::Conflict(
                "A team must keep at least one admin".into(),
            ));
        }

        team_member::Entity::delete_by_id(membership.id)
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;
        info!(team_id = %team_id, user_id = %user_id, "Member removed");
        Ok(())
    }
}

async fn count_admins<C: sea_orm::ConnectionTrait>(
    conn: &C,
    team_id: Uuid,
) -> Result<u64, ServiceError> {
    team_member::Entity::find()
        .filter(team_member::Column::TeamId.eq(team_id))
        .filter(team_member::Column::Role.eq(MemberRole::Admin))
        .count(conn)
        .await
        .map_err(ServiceError::DatabaseError)
}
