/*!
 * # Authentication
 *
 * Cookie-backed sessions for the HTTP API.
 *
 * - Passwords are stored as argon2 PHC strings.
 * - Logging in issues a random token that goes to the client in an
 *   `HttpOnly` cookie; only its sha256 digest is stored in `sessions`.
 * - [`AuthUser`] is an extractor that resolves the cookie to a user and
 *   rejects the request with 401 otherwise.
 */

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{session, user},
    errors::{is_unique_violation, ServiceError},
    AppState,
};

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,
    #[validate(length(min = 8, max = 256, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub discord_user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    /// Links a Discord account so the assistant can recognise the user
    #[validate(length(min = 1, max = 32))]
    pub discord_user_id: Option<String>,
}

/// Public view of a user account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub discord_user_id: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            discord_user_id: model.discord_user_id,
            created_at: model.created_at,
        }
    }
}

/// Hashes a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| ServiceError::InternalError(format!("salt encoding failed: {e}")))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {e}")))
}

/// Checks a password against a stored PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Random hex session token handed to the client.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest stored in place of the raw token.
pub fn hash_session_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Reads a single cookie value from the request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.trim().to_string())
        })
        .find(|value| !value.is_empty())
}

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(name: &str, token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}

/// Account and session management
#[derive(Clone)]
pub struct AuthService {
    db: Arc<DatabaseConnection>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(db: Arc<DatabaseConnection>, session_ttl_secs: u64) -> Self {
        Self {
            db,
            session_ttl: Duration::seconds(session_ttl_secs as i64),
        }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<user::Model, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_ascii_lowercase();

        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "An account for {email} already exists"
            )));
        }

        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            name: Set(request.name.trim().to_string()),
            password_hash: Set(hash_password(&request.password)?),
            discord_user_id: Set(request.discord_user_id.filter(|d| !d.trim().is_empty())),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&*self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("Email or Discord account already registered".into())
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        info!(user_id = %created.id, "User registered");
        Ok(created)
    }

    /// Verifies credentials and opens a session. Returns the user and the raw token.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<(user::Model, String), ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_ascii_lowercase();

        let account = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let account = match account {
            Some(account) if verify_password(&request.password, &account.password_hash) => account,
            _ => {
                warn!("Rejected login attempt");
                return Err(ServiceError::Unauthorized(
                    "Invalid email or password".to_string(),
                ));
            }
        };

        let token = generate_session_token();
        let now = Utc::now();
        session::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(account.id),
            token_hash: Set(hash_session_token(&token)),
            expires_at: Set(now + self.session_ttl),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::DatabaseError)?;

        info!(user_id = %account.id, "Session opened");
        Ok((account, token))
    }

    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        session::Entity::delete_many()
            .filter(session::Column::TokenHash.eq(hash_session_token(token)))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    /// Resolves a raw cookie token to its user. Expired sessions are removed on sight.
    pub async fn resolve_session(&self, token: &str) -> Result<user::Model, ServiceError> {
        let unauthorized = || ServiceError::Unauthorized("Session is missing or expired".into());

        let found = session::Entity::find()
            .filter(session::Column::TokenHash.eq(hash_session_token(token)))
            .find_also_related(user::Entity)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let (session, account) = found.ok_or_else(unauthorized)?;
        if session.is_expired(Utc::now()) {
            session::Entity::delete_by_id(session.id)
                .exec(&*self.db)
                .await
                .map_err(ServiceError::DatabaseError)?;
            return Err(unauthorized());
        }

        account.ok_or_else(unauthorized)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {user_id} not found")))
    }

    pub async fn find_by_discord_id(
        &self,
        discord_user_id: &str,
    ) -> Result<Option<user::Model>, ServiceError> {
        user::Entity::find()
            .filter(user::Column::DiscordUserId.eq(discord_user_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<user::Model, ServiceError> {
        request.validate()?;
        let current = self.get_user(user_id).await?;

        let mut active: user::ActiveModel = current.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(discord_user_id) = request.discord_user_id {
            active.discord_user_id = Set(Some(discord_user_id));
        }
        active.updated_at = Set(Utc::now());

        active.update(&*self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("Discord account is linked to another user".into())
            } else {
                ServiceError::DatabaseError(e)
            }
        })
    }

    /// Deletes the account; sessions and memberships go with it.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let result = user::Entity::delete_by_id(user_id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("User {user_id} not found")));
        }
        info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    /// Removes sessions past their expiry. Returns the number removed.
    pub async fn purge_expired_sessions(&self) -> Result<u64, ServiceError> {
        let result = session::Entity::delete_many()
            .filter(session::Column::ExpiresAt.lte(Utc::now()))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(result.rows_affected)
    }
}

/// Authenticated caller resolved from the session cookie
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    /// Raw session token, needed to log out
    pub session_token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = read_cookie(&parts.headers, &state.config.session_cookie_name)
            .ok_or_else(|| ServiceError::Unauthorized("Authentication required".into()))?;

        let account = state.services.auth.resolve_session(&token).await?;
        Ok(AuthUser {
            user_id: account.id,
            email: account.email,
            name: account.name,
            session_token: token,
        })
    }
}
