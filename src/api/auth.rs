//! Authentication API endpoints.
//!
//! - POST `/register` - Create a user account
//! - POST `/login` - Password step; issues a token pair, or a temporary
//!   token when the account has a confirmed second factor
//! - POST `/login/2fa` - Second-factor step; upgrades a temporary token to
//!   a token pair
//! - POST `/refresh-token` - Rotate a refresh token for a new pair
//! - GET `/2fa/generate` - Enroll a TOTP secret (unconfirmed)
//! - POST `/2fa/validate` - Confirm the secret, enabling the second factor
//! - GET `/logout` - Revoke all refresh tokens and denylist the access token

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use crate::auth::{ApiAuth, HasAuthState};
use crate::db::{Database, User, UserRole};
use crate::jwt::JwtConfig;
use crate::temp_token::TempTokenCache;
use crate::{password, totp};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub temp_tokens: Arc<TempTokenCache>,
    pub totp_issuer: String,
}

impl HasAuthState for AuthState {
    fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    fn db(&self) -> &Database {
        &self.db
    }
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/login/2fa", post(login_2fa))
        .route("/refresh-token", post(refresh_token))
        .route("/2fa/generate", get(generate_2fa))
        .route("/2fa/validate", post(validate_2fa))
        .route("/logout", get(logout))
        .with_state(state)
}

/// Uniform message for unknown email and wrong password, so responses never
/// reveal which one it was.
const INVALID_CREDENTIALS: &str = "Email or password is invalid";

/// Uniform message for every refresh failure mode: bad signature, expired,
/// already used, never issued, foreign token. Distinguishing them would leak
/// validity information.
const INVALID_REFRESH_TOKEN: &str = "Refresh token invalid or expired";

fn require_field(value: Option<String>, missing_msg: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::unprocessable(missing_msg)),
    }
}

/// Issue an access/refresh pair and record the refresh token as live.
async fn issue_session(state: &AuthState, user_uuid: &str) -> Result<TokenPair, ApiError> {
    let access = state
        .jwt
        .issue_access_token(user_uuid)
        .crypto_err("Failed to issue access token")?;
    let refresh = state
        .jwt
        .issue_refresh_token(user_uuid)
        .crypto_err("Failed to issue refresh token")?;

    state
        .db
        .refresh_tokens()
        .create(&refresh.token, user_uuid, refresh.issued_at, refresh.expires_at)
        .await
        .db_err("Failed to record refresh token")?;

    Ok(TokenPair {
        access_token: access.token,
        refresh_token: refresh.token,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

// ---------------------------------------------------------------------------
// Register

#[derive(Deserialize)]
struct RegisterRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<UserRole>,
}

#[derive(Serialize)]
struct RegisterResponse {
    message: &'static str,
    id: String,
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    const MISSING: &str = "Please fill in all fields (name, email and password)";
    let name = require_field(payload.name, MISSING)?;
    let email = require_field(payload.email, MISSING)?;
    let plaintext = require_field(payload.password, MISSING)?;

    if state
        .db
        .users()
        .email_exists(&email)
        .await
        .db_err("Failed to check email")?
    {
        return Err(ApiError::conflict("Email already exists"));
    }

    let password_hash =
        password::hash_password(&plaintext).crypto_err("Failed to hash password")?;

    let uuid = uuid::Uuid::new_v4().to_string();
    let role = payload.role.unwrap_or(UserRole::Member);

    state
        .db
        .users()
        .create(&uuid, &name, &email, &password_hash, role)
        .await
        .db_err("Failed to create user")?;

    info!(user = %uuid, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            id: uuid,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Login (password step)

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    id: String,
    name: String,
    email: String,
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TempTokenResponse {
    temp_token: String,
    expires_in_seconds: u64,
}

async fn session_response(state: &AuthState, user: &User) -> Result<SessionResponse, ApiError> {
    let pair = issue_session(state, &user.uuid).await?;
    Ok(SessionResponse {
        id: user.uuid.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    })
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    const MISSING: &str = "Please fill in all fields (email and password)";
    let email = require_field(payload.email, MISSING)?;
    let plaintext = require_field(payload.password, MISSING)?;

    let user = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    let matches = password::verify_password(&plaintext, &user.password_hash)
        .crypto_err("Failed to verify password")?;
    if !matches {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    if user.totp_enabled {
        // Password verified, but the session is only granted after the
        // second factor. Hand out an opaque short-lived key instead.
        let temp_token = state.temp_tokens.issue(&user.uuid);
        return Ok((
            StatusCode::OK,
            Json(TempTokenResponse {
                temp_token,
                expires_in_seconds: state.temp_tokens.ttl_secs(),
            }),
        )
            .into_response());
    }

    info!(user = %user.uuid, "Login");
    let response = session_response(&state, &user).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

// ---------------------------------------------------------------------------
// Login (second-factor step)

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Login2faRequest {
    temp_token: Option<String>,
    totp: Option<String>,
}

async fn login_2fa(
    State(state): State<AuthState>,
    Json(payload): Json<Login2faRequest>,
) -> Result<impl IntoResponse, ApiError> {
    const MISSING: &str = "Please fill in all fields (tempToken and totp)";
    let temp_token = require_field(payload.temp_token, MISSING)?;
    let code = require_field(payload.totp, MISSING)?;

    const BAD_TEMP_TOKEN: &str = "The provided temporary token is incorrect or expired";

    let user_uuid = state
        .temp_tokens
        .get(&temp_token)
        .ok_or_else(|| ApiError::unauthorized(BAD_TEMP_TOKEN))?;

    // A vanished user is reported like a bad key, not as a distinct case.
    let user = state
        .db
        .users()
        .get_by_uuid(&user_uuid)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::unauthorized(BAD_TEMP_TOKEN))?;

    let verified = user
        .totp_secret
        .as_deref()
        .is_some_and(|secret| totp::verify(&code, secret, &state.totp_issuer, &user.email));
    if !verified {
        return Err(ApiError::unauthorized(
            "The provided TOTP is incorrect or expired",
        ));
    }

    info!(user = %user.uuid, "Login (2FA)");
    let response = session_response(&state, &user).await?;
    Ok((StatusCode::OK, Json(response)))
}

// ---------------------------------------------------------------------------
// Refresh

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

async fn refresh_token(
    State(state): State<AuthState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = payload
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::unauthorized("Refresh token not found"))?;

    let claims = state
        .jwt
        .validate_refresh_token(&token)
        .map_err(|_| ApiError::unauthorized(INVALID_REFRESH_TOKEN))?;

    // Atomic check-and-delete; the replay gate. Exactly one concurrent
    // submission of the same token gets `true`.
    let consumed = state
        .db
        .refresh_tokens()
        .consume(&token, &claims.user_id)
        .await
        .db_err("Failed to consume refresh token")?;
    if !consumed {
        return Err(ApiError::unauthorized(INVALID_REFRESH_TOKEN));
    }

    let pair = issue_session(&state, &claims.user_id).await?;
    Ok((StatusCode::OK, Json(pair)))
}

// ---------------------------------------------------------------------------
// 2FA enrollment and confirmation

#[derive(Serialize)]
struct Generate2faResponse {
    secret: String,
    uri: String,
}

async fn generate_2fa(
    State(state): State<AuthState>,
    ApiAuth(auth): ApiAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_uuid(&auth.user_uuid)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let secret = totp::generate_secret();
    let uri = totp::provisioning_uri(&user.email, &state.totp_issuer, &secret)
        .ok_or_else(|| ApiError::internal("Failed to build provisioning URI"))?;

    // Stored unconfirmed; the second factor only gates login once the user
    // proves possession via /2fa/validate.
    state
        .db
        .users()
        .set_totp_secret(&user.uuid, &secret)
        .await
        .db_err("Failed to store TOTP secret")?;

    Ok((StatusCode::OK, Json(Generate2faResponse { secret, uri })))
}

#[derive(Deserialize)]
struct Validate2faRequest {
    totp: Option<String>,
}

async fn validate_2fa(
    State(state): State<AuthState>,
    ApiAuth(auth): ApiAuth,
    Json(payload): Json<Validate2faRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let code = require_field(payload.totp, "TOTP is required")?;

    let user = state
        .db
        .users()
        .get_by_uuid(&auth.user_uuid)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let verified = user
        .totp_secret
        .as_deref()
        .is_some_and(|secret| totp::verify(&code, secret, &state.totp_issuer, &user.email));
    if !verified {
        return Err(ApiError::bad_request("TOTP is not correct or expired"));
    }

    state
        .db
        .users()
        .enable_totp(&user.uuid)
        .await
        .db_err("Failed to enable TOTP")?;

    info!(user = %user.uuid, "Second factor confirmed");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "TOTP validated successfully" })),
    ))
}

// ---------------------------------------------------------------------------
// Logout

/// Fleet-wide logout: every refresh token of the user dies, and the
/// presented access token is denylisted until its natural expiry. Other
/// sessions' access tokens keep working until they expire, but cannot be
/// renewed.
async fn logout(
    State(state): State<AuthState>,
    ApiAuth(auth): ApiAuth,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .refresh_tokens()
        .revoke_all_for_user(&auth.user_uuid)
        .await
        .db_err("Failed to revoke refresh tokens")?;

    state
        .db
        .invalid_tokens()
        .insert(&auth.token, &auth.user_uuid, auth.expires_at)
        .await
        .db_err("Failed to denylist access token")?;

    info!(user = %auth.user_uuid, "Logout");

    Ok(StatusCode::NO_CONTENT)
}
