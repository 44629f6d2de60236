//! Access-token authentication for protected routes.
//!
//! The client sends the raw token as the `Authorization` header value, with
//! no scheme prefix. Every protected request checks the denylist before the
//! signature: a revoked token must fail even while its signature still
//! verifies, and the membership test is cheaper than the crypto.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::db::{Database, User, UserRole};
use crate::jwt::{JwtConfig, JwtError};

/// Authenticated identity extracted from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// User UUID from the token claims
    pub user_uuid: String,
    /// The presented access token, kept for logout denylisting
    pub token: String,
    /// Token expiry (Unix seconds), reused as the denylist entry's expiry
    pub expires_at: u64,
}

/// API authentication errors.
///
/// Expired and invalid are deliberately distinguished: `AccessTokenExpired`
/// is the client's signal to hit the refresh endpoint.
#[derive(Debug)]
pub enum ApiAuthError {
    NotAuthenticated,
    TokenExpired,
    TokenInvalid,
    DatabaseError,
}

impl ApiAuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }
            Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "Access token not found",
            Self::TokenExpired => "Access token expired",
            Self::TokenInvalid => "Access token invalid",
            Self::DatabaseError => "Database error",
        }
    }

    /// Machine-readable code, present only on the 401 variants clients act on.
    fn code(&self) -> Option<&'static str> {
        match self {
            Self::TokenExpired => Some("AccessTokenExpired"),
            Self::TokenInvalid => Some("AccessTokenInvalid"),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct AuthErrorResponse {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(AuthErrorResponse {
                message: self.message(),
                code: self.code(),
            }),
        )
            .into_response()
    }
}

/// Trait for state types that support API authentication.
pub trait HasAuthState {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
}

/// Extractor for endpoints that require a valid, non-revoked access token.
pub struct ApiAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for ApiAuth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiAuthError::NotAuthenticated)?;

        let revoked = state.db().invalid_tokens().contains(token).await.map_err(|e| {
            tracing::error!("Failed to check token denylist: {}", e);
            ApiAuthError::DatabaseError
        })?;
        if revoked {
            return Err(ApiAuthError::TokenInvalid);
        }

        let claims = state
            .jwt()
            .validate_access_token(token)
            .map_err(|e| match e {
                JwtError::Expired => ApiAuthError::TokenExpired,
                _ => ApiAuthError::TokenInvalid,
            })?;

        Ok(ApiAuth(AuthenticatedUser {
            user_uuid: claims.user_id,
            token: token.to_string(),
            expires_at: claims.exp,
        }))
    }
}

/// Authorization failures from the role gate.
#[derive(Debug)]
pub enum AuthzError {
    /// The authenticated identity no longer exists
    NotFound,
    /// The user's current role is not in the required set
    Forbidden,
    DatabaseError,
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound => (StatusCode::NOT_FOUND, "User not found"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Access denied"),
            Self::DatabaseError => (StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
        };
        (
            status,
            Json(AuthErrorResponse {
                message,
                code: None,
            }),
        )
            .into_response()
    }
}

/// Role-based authorization gate.
///
/// The role is re-fetched from the store rather than read from token claims,
/// so role changes take effect without waiting for token expiry. An empty
/// `required` slice admits any authenticated role.
pub async fn authorize(
    db: &Database,
    user_uuid: &str,
    required: &[UserRole],
) -> Result<User, AuthzError> {
    let user = db
        .users()
        .get_by_uuid(user_uuid)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch user for authorization: {}", e);
            AuthzError::DatabaseError
        })?
        .ok_or(AuthzError::NotFound)?;

    if !required.is_empty() && !required.contains(&user.role) {
        return Err(AuthzError::Forbidden);
    }

    Ok(user)
}
