use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use uuid::Uuid;

use super::common::{created_response, no_content_response, require_member};
use crate::{
    auth::AuthUser,
    entities::bom_item,
    errors::ServiceError,
    services::bom::{
        BomItemStatus, BomStatusQuery, BomStatusResponse, CreateBomItemRequest,
        UpdateBomItemRequest,
    },
    ApiResponse, ApiResult, AppState,
};

async fn load_member_item(
    state: &AppState,
    item_id: Uuid,
    auth_user: &AuthUser,
) -> Result<bom_item::Model, ServiceError> {
    let item = state.services.bom.get_item(item_id).await?;
    require_member(state, item.team_id, auth_user).await?;
    Ok(item)
}

#[utoipa::path(
    get,
    path = "/api/v1/teams/{id}/bom",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "BOM items", body = ApiResponse<Vec<bom_item::Model>>),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "bom"
)]
pub async fn list_bom_items(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Vec<bom_item::Model>> {
    require_member(&state, team_id, &auth_user).await?;
    let items = state.services.bom.list_items(team_id).await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    post,
    path = "/api/v1/teams/{id}/bom",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = CreateBomItemRequest,
    responses(
        (status = 201, description = "BOM item created", body = ApiResponse<bom_item::Model>),
        (status = 400, description = "Invalid request or part from another team", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "bom"
)]
pub async fn create_bom_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
    Json(request): Json<CreateBomItemRequest>,
) -> Result<Response, ServiceError> {
    require_member(&state, team_id, &auth_user).await?;
    let created = state.services.bom.create_item(team_id, request).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    put,
    path = "/api/v1/bom/{id}",
    params(("id" = Uuid, Path, description = "BOM item id")),
    request_body = UpdateBomItemRequest,
    responses(
        (status = 200, description = "BOM item updated", body = ApiResponse<bom_item::Model>),
        (status = 403, description = "Not a member of the owning team", body = crate::errors::ErrorResponse),
        (status = 404, description = "BOM item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "bom"
)]
pub async fn update_bom_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateBomItemRequest>,
) -> ApiResult<bom_item::Model> {
    load_member_item(&state, item_id, &auth_user).await?;
    let updated = state.services.bom.update_item(item_id, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/bom/{id}",
    params(("id" = Uuid, Path, description = "BOM item id")),
    responses(
        (status = 204, description = "BOM item deleted"),
        (status = 403, description = "Not a member of the owning team", body = crate::errors::ErrorResponse),
        (status = 404, description = "BOM item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "bom"
)]
pub async fn delete_bom_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    load_member_item(&state, item_id, &auth_user).await?;
    state.services.bom.delete_item(item_id).await?;
    Ok(no_content_response())
}

/// Fulfillment per item and subsystem, plus overall progress
#[utoipa::path(
    get,
    path = "/api/v1/teams/{id}/bom/status",
    params(("id" = Uuid, Path, description = "Team id"), BomStatusQuery),
    responses(
        (status = 200, description = "Fulfillment report", body = ApiResponse<BomStatusResponse>),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "bom"
)]
pub async fn bom_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
    Query(query): Query<BomStatusQuery>,
) -> ApiResult<BomStatusResponse> {
    require_member(&state, team_id, &auth_user).await?;
    let status = state
        .services
        .bom
        .status(team_id, query.subsystem.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(status)))
}

/// Items short on stock, largest shortfall first
#[utoipa::path(
    get,
    path = "/api/v1/teams/{id}/bom/shortages",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Shortage report", body = ApiResponse<Vec<BomItemStatus>>),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "bom"
)]
pub async fn bom_shortages(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Vec<BomItemStatus>> {
    require_member(&state, team_id, &auth_user).await?;
    let shortages = state.services.bom.shortages(team_id).await?;
    Ok(Json(ApiResponse::success(shortages)))
}
