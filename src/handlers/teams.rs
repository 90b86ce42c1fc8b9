use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use uuid::Uuid;

use super::common::{created_response, require_admin, require_member};
use crate::{
    auth::AuthUser,
    entities::team,
    errors::ServiceError,
    services::teams::{CreateTeamRequest, TeamWithRole, UpdateTeamRequest},
    ApiResponse, ApiResult, AppState,
};

/// Teams the caller belongs to
#[utoipa::path(
    get,
    path = "/api/v1/teams",
    responses(
        (status = 200, description = "Caller's teams with their role in each", body = ApiResponse<Vec<TeamWithRole>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    tag = "teams"
)]
pub async fn list_teams(State(state): State<AppState>, auth_user: AuthUser) -> ApiResult<Vec<TeamWithRole>> {
    let teams = state.services.teams.list_for_user(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(teams)))
}

/// Register a team; the caller becomes its admin
#[utoipa::path(
    post,
    path = "/api/v1/teams",
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Team created", body = ApiResponse<TeamWithRole>),
        (status = 400, description = "Invalid team number or season", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 409, description = "Team number already registered", body = crate::errors::ErrorResponse),
    ),
    tag = "teams"
)]
pub async fn create_team(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateTeamRequest>,
) -> Result<Response, ServiceError> {
    let created = state
        .services
        .teams
        .create_team(auth_user.user_id, request)
        .await?;
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/api/v1/teams/{id}",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Team", body = ApiResponse<TeamWithRole>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
        (status = 404, description = "Team not found", body = crate::errors::ErrorResponse),
    ),
    tag = "teams"
)]
pub async fn get_team(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
) -> ApiResult<TeamWithRole> {
    let membership = require_member(&state, team_id, &auth_user).await?;
    let team = state.services.teams.get_team(team_id).await?;
    Ok(Json(ApiResponse::success(TeamWithRole {
        team,
        role: membership.role,
    })))
}

/// Rename, change season or link a Discord server. Admin only.
#[utoipa::path(
    put,
    path = "/api/v1/teams/{id}",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = UpdateTeamRequest,
    responses(
        (status = 200, description = "Team updated", body = ApiResponse<team::Model>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Discord server linked to another team", body = crate::errors::ErrorResponse),
    ),
    tag = "teams"
)]
pub async fn update_team(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
    Json(request): Json<UpdateTeamRequest>,
) -> ApiResult<team::Model> {
    require_admin(&state, team_id, &auth_user).await?;
    let updated = state.services.teams.update_team(team_id, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}
