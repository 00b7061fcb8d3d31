use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{ProfileResponse, Role, User},
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the HS256 session token. Only `user_id` is trusted for identity;
/// role and alumni link are re-read from storage on every request so that a
/// demotion or unlink takes effect before the token expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
    /// Issued At (seconds since epoch).
    pub iat: usize,
    /// Expiration Time (seconds since epoch).
    pub exp: usize,
}

/// issue_token
///
/// Signs a session token for `user` valid for `config.jwt_ttl_hours`.
pub fn issue_token(user: &User, config: &AppConfig) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role,
        iat: now.timestamp().max(0) as usize,
        exp: (now + Duration::hours(config.jwt_ttl_hours)).timestamp().max(0) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

/// decode_token
///
/// Verifies signature and expiry. Every failure is an authentication error; an
/// expired token gets its own message so clients know to log in again.
pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::Authentication("Token has expired".to_string()),
            _ => AppError::Authentication("Token is invalid".to_string()),
        })
}

/// bearer_token
///
/// Extracts `<token>` from `Authorization: Bearer <token>`.
fn bearer_token(parts: &Parts) -> AppResult<&str> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Authentication("Authorization token is required".to_string()))?
        .to_str()
        .map_err(|_| AppError::Authentication("Authorization header is malformed".to_string()))?;

    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.trim().is_empty() && !token.contains(' ') => Ok(token),
        _ => Err(AppError::Authentication(
            "Authorization header must be 'Bearer <token>'".to_string(),
        )),
    }
}

/// AuthUser
///
/// The verified identity of the caller, typed all the way down the call
/// chain. It is only ever produced from a validated token plus a fresh user
/// lookup, never from request bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
    /// Alumni this account manages, if linked.
    pub alumni_id: Option<i32>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// The session claims as returned by `GET /api/profile`.
    pub fn profile(&self) -> ProfileResponse {
        ProfileResponse {
            user_id: self.id,
            username: self.username.clone(),
            role: self.role,
            alumni_id: self.alumni_id,
        }
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            alumni_id: user.alumni_id,
        }
    }
}

/// AuthUser Extractor
///
/// 1. Reuse the identity already resolved by the auth middleware, if any.
/// 2. Otherwise read the Bearer token and validate it.
/// 3. Reload the user so role and alumni link are current; a deleted user's
///    token is rejected.
///
/// Rejection: `AppError::Authentication` (401). Storage failures during the
/// lookup surface as their own errors.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(resolved) = parts.extensions.get::<AuthUser>() {
            return Ok(resolved.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = bearer_token(parts)?;
        let claims = decode_token(token, &config.jwt_secret)?;

        let user = repo
            .get_user(claims.user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("Account no longer exists".to_string()))?;

        let identity = AuthUser::from(user);
        parts.extensions.insert(identity.clone());
        Ok(identity)
    }
}

/// AdminUser
///
/// Route-level role gate: extracting it fails with 403 unless the
/// authenticated caller is an admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = user.id, "non-admin attempted an admin-only action");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
