//! JWT issuance and validation for the dual-token scheme.
//!
//! Access and refresh tokens are signed with *different* secrets, so a leaked
//! signing key for one class can never forge the other. The JWT subject claim
//! doubles as the token-kind discriminant.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token kind, carried in the `sub` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Short-lived access token (1 hour), proves identity on protected calls
    #[serde(rename = "accessApi")]
    Access,
    /// Long-lived refresh token (7 days), single-use, tracked in the database
    #[serde(rename = "refreshToken")]
    Refresh,
}

/// Claims shared by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject doubles as the token-kind discriminant
    pub sub: TokenKind,
    /// User UUID
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access token duration: 1 hour
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 60 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Configuration for JWT operations. Holds one key pair per token kind.
#[derive(Clone)]
pub struct JwtConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

/// Result of issuing a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The signed JWT string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

impl JwtConfig {
    /// Create a new JWT configuration from the two signing secrets.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
        }
    }

    /// Issue an access token for a user.
    pub fn issue_access_token(&self, user_uuid: &str) -> Result<IssuedToken, JwtError> {
        self.issue(
            user_uuid,
            TokenKind::Access,
            ACCESS_TOKEN_DURATION_SECS,
            &self.access_encoding,
        )
    }

    /// Issue a refresh token for a user.
    pub fn issue_refresh_token(&self, user_uuid: &str) -> Result<IssuedToken, JwtError> {
        self.issue(
            user_uuid,
            TokenKind::Refresh,
            REFRESH_TOKEN_DURATION_SECS,
            &self.refresh_encoding,
        )
    }

    fn issue(
        &self,
        user_uuid: &str,
        kind: TokenKind,
        duration: u64,
        key: &EncodingKey,
    ) -> Result<IssuedToken, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| JwtError::TimeError)?
            .as_secs();

        let claims = Claims {
            sub: kind,
            user_id: user_uuid.to_string(),
            iat: now,
            exp: now + duration,
        };

        let token =
            jsonwebtoken::encode(&Header::default(), &claims, key).map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at: now + duration,
        })
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        Self::validate(token, TokenKind::Access, &self.access_decoding)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        Self::validate(token, TokenKind::Refresh, &self.refresh_decoding)
    }

    fn validate(token: &str, kind: TokenKind, key: &DecodingKey) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Decoding(e),
            })?;

        if token_data.claims.sub != kind {
            return Err(JwtError::WrongTokenKind);
        }

        Ok(token_data.claims)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Token is malformed or its signature does not verify
    Decoding(jsonwebtoken::errors::Error),
    /// Token signature is valid but the token has expired
    Expired,
    /// System time error
    TimeError,
    /// Wrong token kind (e.g., refresh token presented as access token)
    WrongTokenKind,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::Expired => write!(f, "Token expired"),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenKind => write!(f, "Wrong token kind"),
        }
    }
}

impl std::error::Error for JwtError {}
