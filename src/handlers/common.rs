use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{team_member, MemberRole},
    errors::ServiceError,
    ApiResponse, AppState,
};

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Fails with 403 unless the caller belongs to the team.
pub async fn require_member(
    state: &AppState,
    team_id: Uuid,
    user: &AuthUser,
) -> Result<team_member::Model, ServiceError> {
    state.services.members.require_member(team_id, user.user_id).await
}

pub async fn require_admin(
    state: &AppState,
    team_id: Uuid,
    user: &AuthUser,
) -> Result<team_member::Model, ServiceError> {
    state.services.members.require_admin(team_id, user.user_id).await
}

/// Admins and mentors decide on orders.
pub async fn require_manager(
    state: &AppState,
    team_id: Uuid,
    user: &AuthUser,
) -> Result<team_member::Model, ServiceError> {
    state
        .services
        .members
        .require_role(team_id, user.user_id, &[MemberRole::Admin, MemberRole::Mentor])
        .await
}
