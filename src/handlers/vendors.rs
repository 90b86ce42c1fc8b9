use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use uuid::Uuid;

use super::common::{created_response, require_member};
use crate::{
    auth::AuthUser,
    entities::vendor,
    errors::ServiceError,
    services::vendors::{CreateVendorRequest, UpdateVendorRequest},
    ApiResponse, ApiResult, AppState,
};

/// Team-scoped vendors need membership; global ones are open to any signed-in user.
async fn load_accessible(
    state: &AppState,
    vendor_id: Uuid,
    auth_user: &AuthUser,
) -> Result<vendor::Model, ServiceError> {
    let found = state.services.vendors.get_vendor(vendor_id).await?;
    if let Some(team_id) = found.team_id {
        require_member(state, team_id, auth_user).await?;
    }
    Ok(found)
}

#[utoipa::path(
    get,
    path = "/api/v1/teams/{id}/vendors",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Global vendors and the team's own", body = ApiResponse<Vec<vendor::Model>>),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "vendors"
)]
pub async fn list_team_vendors(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Vec<vendor::Model>> {
    require_member(&state, team_id, &auth_user).await?;
    let vendors = state.services.vendors.list_for_team(team_id).await?;
    Ok(Json(ApiResponse::success(vendors)))
}

#[utoipa::path(
    post,
    path = "/api/v1/teams/{id}/vendors",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = CreateVendorRequest,
    responses(
        (status = 201, description = "Team vendor created", body = ApiResponse<vendor::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "vendors"
)]
pub async fn create_team_vendor(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
    Json(request): Json<CreateVendorRequest>,
) -> Result<Response, ServiceError> {
    require_member(&state, team_id, &auth_user).await?;
    let created = state
        .services
        .vendors
        .create_vendor(Some(team_id), request)
        .await?;
    Ok(created_response(created))
}

/// Add a vendor visible to every team
#[utoipa::path(
    post,
    path = "/api/v1/vendors",
    request_body = CreateVendorRequest,
    responses(
        (status = 201, description = "Global vendor created", body = ApiResponse<vendor::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    tag = "vendors"
)]
pub async fn create_global_vendor(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Json(request): Json<CreateVendorRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.vendors.create_vendor(None, request).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/api/v1/vendors/{id}",
    params(("id" = Uuid, Path, description = "Vendor id")),
    responses(
        (status = 200, description = "Vendor", body = ApiResponse<vendor::Model>),
        (status = 403, description = "Vendor belongs to a team you are not in", body = crate::errors::ErrorResponse),
        (status = 404, description = "Vendor not found", body = crate::errors::ErrorResponse),
    ),
    tag = "vendors"
)]
pub async fn get_vendor(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(vendor_id): Path<Uuid>,
) -> ApiResult<vendor::Model> {
    let found = load_accessible(&state, vendor_id, &auth_user).await?;
    Ok(Json(ApiResponse::success(found)))
}

#[utoipa::path(
    put,
    path = "/api/v1/vendors/{id}",
    params(("id" = Uuid, Path, description = "Vendor id")),
    request_body = UpdateVendorRequest,
    responses(
        (status = 200, description = "Vendor updated", body = ApiResponse<vendor::Model>),
        (status = 403, description = "Vendor belongs to a team you are not in", body = crate::errors::ErrorResponse),
        (status = 404, description = "Vendor not found", body = crate::errors::ErrorResponse),
    ),
    tag = "vendors"
)]
pub async fn update_vendor(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(vendor_id): Path<Uuid>,
    Json(request): Json<UpdateVendorRequest>,
) -> ApiResult<vendor::Model> {
    load_accessible(&state, vendor_id, &auth_user).await?;
    let updated = state.services.vendors.update_vendor(vendor_id, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}
