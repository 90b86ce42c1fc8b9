use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use super::common::{created_response, no_content_response};
use crate::{
    auth::{
        clear_session_cookie, session_cookie, AuthUser, LoginRequest, RegisterRequest,
        UpdateProfileRequest, UserResponse,
    },
    errors::ServiceError,
    ApiResponse, ApiResult, AppState,
};

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email or Discord account already registered", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.auth.register(request).await?;
    Ok(created_response(UserResponse::from(created)))
}

/// Log in and receive a session cookie
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = ApiResponse<UserResponse>,
            headers(("Set-Cookie" = String, description = "HttpOnly session cookie"))
        ),
        (status = 401, description = "Invalid email or password", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ServiceError> {
    let (account, token) = state.services.auth.login(request).await?;
    let cookie = session_cookie(
        &state.config.session_cookie_name,
        &token,
        state.config.session_ttl_secs,
        state.config.session_cookie_secure,
    );
    info!(user_id = %account.id, "User logged in");
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(UserResponse::from(account))),
    )
        .into_response())
}

/// End the current session
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 204, description = "Logged out; session cookie cleared"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> Result<Response, ServiceError> {
    state.services.auth.logout(&auth_user.session_token).await?;
    let cookie = clear_session_cookie(
        &state.config.session_cookie_name,
        state.config.session_cookie_secure,
    );
    let mut response = no_content_response();
    if let Ok(value) = cookie.parse() {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}

/// Current user
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn me(State(state): State<AppState>, auth_user: AuthUser) -> ApiResult<UserResponse> {
    let account = state.services.auth.get_user(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(account.into())))
}

/// Update name or linked Discord account
#[utoipa::path(
    put,
    path = "/api/v1/auth/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 409, description = "Discord account linked elsewhere", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn update_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<UserResponse> {
    let updated = state
        .services
        .auth
        .update_profile(auth_user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::success(updated.into())))
}

/// Delete the current account
#[utoipa::path(
    delete,
    path = "/api/v1/auth/me",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn delete_me(State(state): State<AppState>, auth_user: AuthUser) -> Result<Response, ServiceError> {
    state.services.auth.delete_user(auth_user.user_id).await?;
    let mut response = no_content_response();
    if let Ok(value) = clear_session_cookie(
        &state.config.session_cookie_name,
        state.config.session_cookie_secure,
    )
    .parse()
    {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}
