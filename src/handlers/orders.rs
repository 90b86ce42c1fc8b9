use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use uuid::Uuid;

use super::common::{created_response, require_manager, require_member};
use crate::{
    auth::AuthUser,
    entities::{order, OrderStatus},
    errors::ServiceError,
    services::orders::{
        CreateOrderRequest, OrderItemRequest, OrderQuery, OrderWithItems, UpdateOrderRequest,
        UpdateOrderStatusRequest,
    },
    ApiResponse, ApiResult, AppState,
};

async fn load_member_order(
    state: &AppState,
    order_id: Uuid,
    auth_user: &AuthUser,
) -> Result<order::Model, ServiceError> {
    let found = state.services.orders.get_order(order_id).await?;
    require_member(state, found.team_id, auth_user).await?;
    Ok(found)
}

#[utoipa::path(
    get,
    path = "/api/v1/teams/{id}/orders",
    params(("id" = Uuid, Path, description = "Team id"), OrderQuery),
    responses(
        (status = 200, description = "Orders, newest first", body = ApiResponse<Vec<order::Model>>),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Vec<order::Model>> {
    require_member(&state, team_id, &auth_user).await?;
    let orders = state.services.orders.list_orders(team_id, query.status).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Create a draft order, optionally with its first lines
#[utoipa::path(
    post,
    path = "/api/v1/teams/{id}/orders",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Draft order created", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Invalid request, vendor or part", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(team_id): Path<Uuid>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Response, ServiceError> {
    require_member(&state, team_id, &auth_user).await?;
    let created = state
        .services
        .orders
        .create_order(team_id, auth_user.user_id, request)
        .await?;
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its lines", body = ApiResponse<OrderWithItems>),
        (status = 403, description = "Not a member of the owning team", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<OrderWithItems> {
    load_member_order(&state, order_id, &auth_user).await?;
    let order = state.services.orders.get_with_items(order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<order::Model>),
        (status = 403, description = "Not a member of the owning team", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateOrderRequest>,
) -> ApiResult<order::Model> {
    load_member_order(&state, order_id, &auth_user).await?;
    let updated = state.services.orders.update_order(order_id, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/items",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = OrderItemRequest,
    responses(
        (status = 201, description = "Line added; total recomputed", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Order is no longer editable", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not a member of the owning team", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn add_order_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<OrderItemRequest>,
) -> Result<Response, ServiceError> {
    load_member_order(&state, order_id, &auth_user).await?;
    let updated = state.services.orders.add_item(order_id, request).await?;
    Ok(created_response(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("item_id" = Uuid, Path, description = "Order line id"),
    ),
    responses(
        (status = 200, description = "Line removed; total recomputed", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Order is no longer editable", body = crate::errors::ErrorResponse),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn remove_order_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<OrderWithItems> {
    load_member_order(&state, order_id, &auth_user).await?;
    let updated = state.services.orders.remove_item(order_id, item_id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Move an order through its lifecycle. Approving or rejecting needs an admin or mentor.
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<order::Model>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role not allowed to decide on orders", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<order::Model> {
    let current = load_member_order(&state, order_id, &auth_user).await?;
    if matches!(request.status, OrderStatus::Approved | OrderStatus::Rejected) {
        require_manager(&state, current.team_id, &auth_user).await?;
    }
    let updated = state
        .services
        .orders
        .transition(order_id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}
