//! Tests for the access-token middleware and the role-based gate.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

async fn register_with_role(app: &axum::Router, email: &str, role: &str) -> (String, String) {
    let response = post_json(
        app,
        "/api/auth/register",
        json!({ "name": "User", "email": email, "password": "pw", "role": role }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_str().unwrap().to_string();
    let (access, _) = login(app, email, "pw").await;
    (id, access)
}

// =============================================================================
// Access-token middleware
// =============================================================================

#[tokio::test]
async fn test_missing_token_rejected() {
    let (app, _, _) = create_test_app().await;

    let response = get_anon(&app, "/api/users/current").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Access token not found");
}

#[tokio::test]
async fn test_garbage_token_rejected_with_code() {
    let (app, _, _) = create_test_app().await;

    let response = get_auth(&app, "/api/users/current", "not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "AccessTokenInvalid");
}

#[tokio::test]
async fn test_expired_token_gets_refresh_signal() {
    use authd::jwt::{Claims, TokenKind};
    use jsonwebtoken::{EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let (app, _, _) = create_test_app().await;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        sub: TokenKind::Access,
        user_id: "uuid-123".to_string(),
        iat: now - 100,
        exp: now - 50,
    };
    let expired = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(ACCESS_SECRET),
    )
    .unwrap();

    let response = get_auth(&app, "/api/users/current", &expired).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    // Distinct code: the client's cue to call the refresh endpoint.
    assert_eq!(body_json(response).await["code"], "AccessTokenExpired");
}

#[tokio::test]
async fn test_current_user_returns_identity() {
    let (app, _, _) = create_test_app().await;

    let id = register(&app, "Alice", "alice@example.com", "pw").await;
    let (access, _) = login(&app, "alice@example.com", "pw").await;

    let response = get_auth(&app, "/api/users/current", &access).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["name"], "Alice");
    assert_eq!(body["email"], "alice@example.com");
}

// =============================================================================
// Role gate
// =============================================================================

#[tokio::test]
async fn test_admin_route_rejects_member() {
    let (app, _, _) = create_test_app().await;

    let (_, access) = register_with_role(&app, "m@example.com", "member").await;

    let response = get_auth(&app, "/api/users/admin", &access).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_route_accepts_admin() {
    let (app, _, _) = create_test_app().await;

    let (_, access) = register_with_role(&app, "a@example.com", "admin").await;

    let response = get_auth(&app, "/api/users/admin", &access).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_moderator_route_accepts_both_elevated_roles() {
    let (app, _, _) = create_test_app().await;

    let (_, member) = register_with_role(&app, "m@example.com", "member").await;
    let (_, moderator) = register_with_role(&app, "mod@example.com", "moderator").await;
    let (_, admin) = register_with_role(&app, "a@example.com", "admin").await;

    assert_eq!(
        get_auth(&app, "/api/users/moderator", &member).await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        get_auth(&app, "/api/users/moderator", &moderator).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        get_auth(&app, "/api/users/moderator", &admin).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_role_change_applies_without_token_reissue() {
    let (app, db, _) = create_test_app().await;

    let (id, access) = register_with_role(&app, "m@example.com", "member").await;

    assert_eq!(
        get_auth(&app, "/api/users/admin", &access).await.status(),
        StatusCode::FORBIDDEN
    );

    // Promote; the very same token now passes because the role is read
    // live from the store, not from the claims.
    db.users()
        .set_role(&id, authd::db::UserRole::Admin)
        .await
        .unwrap();

    assert_eq!(
        get_auth(&app, "/api/users/admin", &access).await.status(),
        StatusCode::OK
    );
}
