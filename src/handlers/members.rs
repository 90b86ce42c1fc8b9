use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use uuid::Uuid;

use super::common::{created_response, no_content_response, require_admin, require_member};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::members::{AddMemberRequest, MemberResponse, UpdateMemberRoleRequest},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/teams/{id}/members",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Team members", body = ApiResponse<Vec<MemberResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "members"
)]
pub async fn list_members(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Vec<MemberResponse>> {
    require_member(&state, team_id, &auth_user).await?;
    let members = state.services.members.list_members(team_id).await?;
    Ok(Json(ApiResponse::success(members)))
}

/// Add a registered user by email. Admin only.
#[utoipa::path(
    post,
    path = "/api/v1/teams/{id}/members",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = ApiResponse<MemberResponse>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "No account for that email", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already a member", body = crate::errors::ErrorResponse),
    ),
    tag = "members"
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
    Json(request): Json<AddMemberRequest>,
) -> Result<Response, ServiceError> {
    require_admin(&state, team_id, &auth_user).await?;
    let added = state.services.members.add_member(team_id, request).await?;
    Ok(created_response(added))
}

/// Change a member's role. Admin only; the last admin cannot be demoted.
#[utoipa::path(
    put,
    path = "/api/v1/teams/{id}/members/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Team id"),
        ("user_id" = Uuid, Path, description = "Member's user id"),
    ),
    request_body = UpdateMemberRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = ApiResponse<MemberResponse>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not a member", body = crate::errors::ErrorResponse),
        (status = 409, description = "Would leave the team without an admin", body = crate::errors::ErrorResponse),
    ),
    tag = "members"
)]
pub async fn update_member_role(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateMemberRoleRequest>,
) -> ApiResult<MemberResponse> {
    require_admin(&state, team_id, &auth_user).await?;
    let updated = state
        .services
        .members
        .update_role(team_id, user_id, request.role)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Remove a member. Admin only; the last admin cannot be removed.
#[utoipa::path(
    delete,
    path = "/api/v1/teams/{id}/members/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Team id"),
        ("user_id" = Uuid, Path, description = "Member's user id"),
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Would leave the team without an admin", body = crate::errors::ErrorResponse),
    ),
    tag = "members"
)]
pub async fn remove_member(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ServiceError> {
    require_admin(&state, team_id, &auth_user).await?;
    state.services.members.remove_member(team_id, user_id).await?;
    Ok(no_content_response())
}
