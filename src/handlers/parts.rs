use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use uuid::Uuid;

use super::common::{created_response, require_member};
use crate::{
    auth::AuthUser,
    entities::part,
    errors::ServiceError,
    services::parts::{
        AdjustQuantityRequest, AdjustmentResponse, CreatePartRequest, PartQuery, PartResponse,
        UpdatePartRequest,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

async fn load_member_part(
    state: &AppState,
    part_id: Uuid,
    auth_user: &AuthUser,
) -> Result<part::Model, ServiceError> {
    let found = state.services.parts.get_part(part_id).await?;
    require_member(state, found.team_id, auth_user).await?;
    Ok(found)
}

/// Team inventory, searchable and paginated
#[utoipa::path(
    get,
    path = "/api/v1/teams/{id}/parts",
    params(("id" = Uuid, Path, description = "Team id"), PartQuery),
    responses(
        (status = 200, description = "Parts", body = ApiResponse<PaginatedResponse<PartResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "parts"
)]
pub async fn list_parts(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
    Query(query): Query<PartQuery>,
) -> ApiResult<PaginatedResponse<PartResponse>> {
    require_member(&state, team_id, &auth_user).await?;
    let page = state.services.parts.list_parts(team_id, query).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        page.items,
        page.total,
        page.page,
        page.per_page,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/v1/teams/{id}/parts",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = CreatePartRequest,
    responses(
        (status = 201, description = "Part created", body = ApiResponse<PartResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "parts"
)]
pub async fn create_part(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
    Json(request): Json<CreatePartRequest>,
) -> Result<Response, ServiceError> {
    require_member(&state, team_id, &auth_user).await?;
    let created = state.services.parts.create_part(team_id, request).await?;
    Ok(created_response(PartResponse::from(created)))
}

/// Parts at or below their reorder point, emptiest first
#[utoipa::path(
    get,
    path = "/api/v1/teams/{id}/parts/low-stock",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Low-stock parts", body = ApiResponse<Vec<PartResponse>>),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "parts"
)]
pub async fn low_stock_parts(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Vec<PartResponse>> {
    require_member(&state, team_id, &auth_user).await?;
    let parts = state.services.parts.low_stock(team_id).await?;
    Ok(Json(ApiResponse::success(
        parts.into_iter().map(PartResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/parts/{id}",
    params(("id" = Uuid, Path, description = "Part id")),
    responses(
        (status = 200, description = "Part", body = ApiResponse<PartResponse>),
        (status = 403, description = "Not a member of the owning team", body = crate::errors::ErrorResponse),
        (status = 404, description = "Part not found", body = crate::errors::ErrorResponse),
    ),
    tag = "parts"
)]
pub async fn get_part(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(part_id): Path<Uuid>,
) -> ApiResult<PartResponse> {
    let found = load_member_part(&state, part_id, &auth_user).await?;
    Ok(Json(ApiResponse::success(found.into())))
}

/// Update part details. Quantity changes go through `/adjust`.
#[utoipa::path(
    put,
    path = "/api/v1/parts/{id}",
    params(("id" = Uuid, Path, description = "Part id")),
    request_body = UpdatePartRequest,
    responses(
        (status = 200, description = "Part updated", body = ApiResponse<PartResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not a member of the owning team", body = crate::errors::ErrorResponse),
        (status = 404, description = "Part not found", body = crate::errors::ErrorResponse),
    ),
    tag = "parts"
)]
pub async fn update_part(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(part_id): Path<Uuid>,
    Json(request): Json<UpdatePartRequest>,
) -> ApiResult<PartResponse> {
    load_member_part(&state, part_id, &auth_user).await?;
    let updated = state.services.parts.update_part(part_id, request).await?;
    Ok(Json(ApiResponse::success(updated.into())))
}

/// Apply a signed quantity change
#[utoipa::path(
    post,
    path = "/api/v1/parts/{id}/adjust",
    params(("id" = Uuid, Path, description = "Part id")),
    request_body = AdjustQuantityRequest,
    responses(
        (status = 200, description = "Quantity adjusted", body = ApiResponse<AdjustmentResponse>),
        (status = 403, description = "Not a member of the owning team", body = crate::errors::ErrorResponse),
        (status = 404, description = "Part not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Adjustment would make the quantity negative", body = crate::errors::ErrorResponse),
    ),
    tag = "parts"
)]
pub async fn adjust_part(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(part_id): Path<Uuid>,
    Json(request): Json<AdjustQuantityRequest>,
) -> ApiResult<AdjustmentResponse> {
    load_member_part(&state, part_id, &auth_user).await?;
    let adjusted = state.services.parts.adjust_quantity(part_id, request).await?;
    Ok(Json(ApiResponse::success(adjusted)))
}
