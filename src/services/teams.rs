use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    entities::{
        team::{self, Program},
        team_member::{self, MemberRole},
    },
    errors::{is_unique_violation, ServiceError},
};

static SEASON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{4})$").expect("valid regex"));

/// Seasons are written `YYYY-YYYY` and span consecutive years.
pub fn validate_season(season: &str) -> Result<(), ValidationError> {
    let malformed = || {
        let mut err = ValidationError::new("season");
        err.message = Some("Season must look like 2024-2025".into());
        err
    };

    let caps = SEASON_RE.captures(season).ok_or_else(malformed)?;
    let start: u32 = caps[1].parse().map_err(|_| malformed())?;
    let end: u32 = caps[2].parse().map_err(|_| malformed())?;
    if end == start + 1 {
        Ok(())
    } else {
        Err(malformed())
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateTeamRequest {
    pub program: Program,
    #[validate(range(min = 1, message = "Team number must be positive"))]
    pub number: i32,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(custom = "validate_season")]
    pub season: String,
    pub discord_guild_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(custom = "validate_season")]
    pub season: Option<String>,
    /// Empty string unlinks the Discord server
    pub discord_guild_id: Option<String>,
}

/// A team together with the caller's role in it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamWithRole {
    #[serde(flatten)]
    pub team: team::Model,
    pub role: MemberRole,
}

#[derive(Clone)]
pub struct TeamService {
    db: Arc<DatabaseConnection>,
}

impl TeamService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Creates a team and makes `creator` its first admin, atomically.
    #[instrument(skip(self, request), fields(program = %request.program, number = request.number))]
    pub async fn create_team(
        &self,
        creator: Uuid,
        request: CreateTeamRequest,
    ) -> Result<TeamWithRole, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for team creation");
            ServiceError::DatabaseError(e)
        })?;

        let duplicate = team::Entity::find()
            .filter(team::Column::Program.eq(request.program))
            .filter(team::Column::Number.eq(request.number))
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Team {} {} is already registered",
                request.program, request.number
            )));
        }

        let now = Utc::now();
        let created = team::ActiveModel {
            id: Set(Uuid::new_v4()),
            program: Set(request.program),
            number: Set(request.number),
            name: Set(request.name.trim().to_string()),
            season: Set(request.season),
            discord_guild_id: Set(request.discord_guild_id.filter(|g| !g.trim().is_empty())),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("Team number or Discord server already registered".into())
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        team_member::ActiveModel {
            id: Set(Uuid::new_v4()),
            team_id: Set(created.id),
            user_id: Set(creator),
            role: Set(MemberRole::Admin),
            joined_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit team creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(team_id = %created.id, "Team created");
        Ok(TeamWithRole {
            team: created,
            role: MemberRole::Admin,
        })
    }

    /// Teams the user belongs to, ordered by program and number.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TeamWithRole>, ServiceError> {
        let rows = team_member::Entity::find()
            .filter(team_member::Column::UserId.eq(user_id))
            .find_also_related(team::Entity)
            .order_by_asc(team_member::Column::JoinedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut teams: Vec<TeamWithRole> = rows
            .into_iter()
            .filter_map(|(membership, team)| {
                team.map(|team| TeamWithRole {
                    team,
                    role: membership.role,
                })
            })
            .collect();
        teams.sort_by(|a, b| {
            (a.team.program.to_string(), a.team.number)
                .cmp(&(b.team.program.to_string(), b.team.number))
        });
        Ok(teams)
    }

    #[instrument(skip(self))]
    pub async fn get_team(&self, team_id: Uuid) -> Result<team::Model, ServiceError> {
        team::Entity::find_by_id(team_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Team {team_id} not found")))
    }

    #[instrument(skip(self, request))]
    pub async fn update_team(
        &self,
        team_id: Uuid,
        request: UpdateTeamRequest,
    ) -> Result<team::Model, ServiceError> {
        request.validate()?;
        let current = self.get_team(team_id).await?;

        let mut active: team::ActiveModel = current.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(season) = request.season {
            active.season = Set(season);
        }
        if let Some(guild) = request.discord_guild_id {
            let guild = guild.trim().to_string();
            active.discord_guild_id = Set((!guild.is_empty()).then_some(guild));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("Discord server is already linked to another team".into())
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;
        info!(team_id = %team_id, "Team updated");
        Ok(updated)
    }

    /// Team linked to a Discord server, if any.
    pub async fn find_by_guild(&self, guild_id: &str) -> Result<Option<team::Model>, ServiceError> {
        team::Entity::find()
            .filter(team::Column::DiscordGuildId.eq(guild_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_format() {
        assert!(validate_season("2024-2025").is_ok());
        assert!(validate_season("2024-2026").is_err());
        assert!(validate_season("2024/2025").is_err());
        assert!(validate_season("24-25").is_err());
        assert!(validate_season("2025-2024").is_err());
    }

    #[test]
    fn create_request_validation() {
        let request = CreateTeamRequest {
            program: Program::Ftc,
            number: 0,
            name: "Aperture Science".into(),
            season: "2024-2025".into(),
            discord_guild_id: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("number"));
    }
}
