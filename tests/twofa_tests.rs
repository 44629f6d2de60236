//! Tests for TOTP enrollment, confirmation, and the 2FA login flow.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

/// Enroll and confirm the second factor for a logged-in user.
/// Returns the base32 secret.
async fn enable_2fa(app: &axum::Router, access: &str) -> String {
    let response = get_auth(app, "/api/auth/2fa/generate", access).await;
    assert_eq!(response.status(), StatusCode::OK);
    let secret = body_json(response).await["secret"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_json_auth(
        app,
        "/api/auth/2fa/validate",
        access,
        json!({ "totp": current_totp_code(&secret) }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    secret
}

// =============================================================================
// Enrollment
// =============================================================================

#[tokio::test]
async fn test_generate_returns_secret_and_uri() {
    let (app, db, _) = create_test_app().await;

    let id = register(&app, "Alice", "alice@example.com", "pw").await;
    let (access, _) = login(&app, "alice@example.com", "pw").await;

    let response = get_auth(&app, "/api/auth/2fa/generate", &access).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let secret = body["secret"].as_str().unwrap();
    let uri = body["uri"].as_str().unwrap();
    assert!(uri.starts_with("otpauth://totp/"));
    assert!(uri.contains("alice"));

    // Secret is persisted, unconfirmed.
    let user = db.users().get_by_uuid(&id).await.unwrap().unwrap();
    assert_eq!(user.totp_secret.as_deref(), Some(secret));
    assert!(!user.totp_enabled);
}

#[tokio::test]
async fn test_generate_requires_authentication() {
    let (app, _, _) = create_test_app().await;

    let response = get_anon(&app, "/api/auth/2fa/generate").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unconfirmed_enrollment_does_not_gate_login() {
    let (app, _, _) = create_test_app().await;

    register(&app, "Alice", "alice@example.com", "pw").await;
    let (access, _) = login(&app, "alice@example.com", "pw").await;

    // Generate but never validate.
    let response = get_auth(&app, "/api/auth/2fa/generate", &access).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Login still hands out a full pair; no partial-enrollment lockout.
    let response = post_json(
        &app,
        "/api/auth/login",
        json!({ "email": "alice@example.com", "password": "pw" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["accessToken"].is_string());
    assert!(body.get("tempToken").is_none());
}

#[tokio::test]
async fn test_validate_with_wrong_code_rejected() {
    let (app, db, _) = create_test_app().await;

    let id = register(&app, "Alice", "alice@example.com", "pw").await;
    let (access, _) = login(&app, "alice@example.com", "pw").await;

    get_auth(&app, "/api/auth/2fa/generate", &access).await;

    let response = post_json_auth(
        &app,
        "/api/auth/2fa/validate",
        &access,
        json!({ "totp": "000000" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let user = db.users().get_by_uuid(&id).await.unwrap().unwrap();
    assert!(!user.totp_enabled);
}

#[tokio::test]
async fn test_validate_missing_code_rejected() {
    let (app, _, _) = create_test_app().await;

    register(&app, "Alice", "alice@example.com", "pw").await;
    let (access, _) = login(&app, "alice@example.com", "pw").await;

    let response = post_json_auth(&app, "/api/auth/2fa/validate", &access, json!({})).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_validate_confirms_enrollment() {
    let (app, db, _) = create_test_app().await;

    let id = register(&app, "Alice", "alice@example.com", "pw").await;
    let (access, _) = login(&app, "alice@example.com", "pw").await;

    enable_2fa(&app, &access).await;

    let user = db.users().get_by_uuid(&id).await.unwrap().unwrap();
    assert!(user.totp_enabled);
}

// =============================================================================
// 2FA login flow
// =============================================================================

#[tokio::test]
async fn test_login_with_2fa_returns_temp_token_not_session() {
    let (app, _, _) = create_test_app().await;

    register(&app, "Alice", "alice@example.com", "pw").await;
    let (access, _) = login(&app, "alice@example.com", "pw").await;
    enable_2fa(&app, &access).await;

    let response = post_json(
        &app,
        "/api/auth/login",
        json!({ "email": "alice@example.com", "password": "pw" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["tempToken"].is_string());
    assert_eq!(body["expiresInSeconds"], 300);
    // Never a session pair at the password step.
    assert!(body.get("accessToken").is_none());
    assert!(body.get("refreshToken").is_none());
}

#[tokio::test]
async fn test_correct_code_upgrades_temp_token_to_session() {
    let (app, _, jwt) = create_test_app().await;

    let id = register(&app, "Alice", "alice@example.com", "pw").await;
    let (access, _) = login(&app, "alice@example.com", "pw").await;
    let secret = enable_2fa(&app, &access).await;

    let response = post_json(
        &app,
        "/api/auth/login",
        json!({ "email": "alice@example.com", "password": "pw" }),
    )
    .await;
    let temp_token = body_json(response).await["tempToken"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_json(
        &app,
        "/api/auth/login/2fa",
        json!({ "tempToken": temp_token, "totp": current_totp_code(&secret) }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let claims = jwt
        .validate_access_token(body["accessToken"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.user_id, id);
}

#[tokio::test]
async fn test_wrong_code_rejected_and_temp_token_survives() {
    let (app, _, _) = create_test_app().await;

    register(&app, "Alice", "alice@example.com", "pw").await;
    let (access, _) = login(&app, "alice@example.com", "pw").await;
    let secret = enable_2fa(&app, &access).await;

    let response = post_json(
        &app,
        "/api/auth/login",
        json!({ "email": "alice@example.com", "password": "pw" }),
    )
    .await;
    let temp_token = body_json(response).await["tempToken"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_json(
        &app,
        "/api/auth/login/2fa",
        json!({ "tempToken": temp_token, "totp": "000000" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The key stays valid until TTL; a correct retry succeeds.
    let response = post_json(
        &app,
        "/api/auth/login/2fa",
        json!({ "tempToken": temp_token, "totp": current_totp_code(&secret) }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_temp_token_rejected() {
    let (app, _, _) = create_test_app().await;

    let response = post_json(
        &app,
        "/api/auth/login/2fa",
        json!({ "tempToken": "no-such-key", "totp": "123456" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_temp_token_rejected() {
    // TTL of zero: every temporary token is expired on arrival.
    let (app, _, _) = create_test_app_with_ttl(0).await;

    register(&app, "Alice", "alice@example.com", "pw").await;
    let (access, _) = login(&app, "alice@example.com", "pw").await;
    let secret = enable_2fa(&app, &access).await;

    let response = post_json(
        &app,
        "/api/auth/login",
        json!({ "email": "alice@example.com", "password": "pw" }),
    )
    .await;
    let temp_token = body_json(response).await["tempToken"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_json(
        &app,
        "/api/auth/login/2fa",
        json!({ "tempToken": temp_token, "totp": current_totp_code(&secret) }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_2fa_missing_fields_rejected() {
    let (app, _, _) = create_test_app().await;

    for body in [
        json!({ "tempToken": "key" }),
        json!({ "totp": "123456" }),
        json!({}),
    ] {
        let response = post_json(&app, "/api/auth/login/2fa", body).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
