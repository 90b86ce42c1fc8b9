use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use tracing::warn;

use crate::{
    discord::{
        interactions::{self, Interaction, InteractionResponse},
        signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER},
    },
    errors::ServiceError,
    AppState,
};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ServiceError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized(format!("Missing {name} header")))
}

/// Discord interactions webhook. Requests must carry a valid Ed25519 signature.
#[utoipa::path(
    post,
    path = "/api/v1/discord/interactions",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Interaction response (PONG, message or deferred)"),
        (status = 401, description = "Missing or invalid signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Discord integration not configured", body = crate::errors::ErrorResponse),
    ),
    tag = "discord"
)]
pub async fn interactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InteractionResponse>, ServiceError> {
    let Some(verifier) = state.discord.verifier.as_ref() else {
        return Err(ServiceError::NotFound(
            "Discord integration is not configured".into(),
        ));
    };

    let signature = header(&headers, SIGNATURE_HEADER)?;
    let timestamp = header(&headers, TIMESTAMP_HEADER)?;
    verifier.verify(signature, timestamp, &body).map_err(|e| {
        warn!(error = %e, "Rejected Discord interaction");
        e
    })?;

    let interaction: Interaction = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::InvalidInput(format!("Malformed interaction: {e}")))?;
    let response = interactions::handle(&state, interaction).await?;
    Ok(Json(response))
}
