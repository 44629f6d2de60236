#![allow(dead_code)]

use authd::db::Database;
use authd::jwt::JwtConfig;
use authd::{ServerConfig, create_app};
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"access-secret-long-enough-for-tests";
pub const REFRESH_SECRET: &[u8] = b"refresh-secret-long-enough-for-tests";
pub const TOTP_ISSUER: &str = "authd-test";

/// Create a test app backed by an in-memory database.
/// Returns (app, db, jwt) so tests can inspect state and mint tokens.
pub async fn create_test_app() -> (axum::Router, Database, JwtConfig) {
    create_test_app_with_ttl(300).await
}

/// Same, with a custom temporary-token TTL (0 = every temp token is born
/// expired).
pub async fn create_test_app_with_ttl(ttl_secs: u64) -> (axum::Router, Database, JwtConfig) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let jwt = JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET);
    let config = ServerConfig {
        db: db.clone(),
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        totp_issuer: TOTP_ISSUER.to_string(),
        temp_token_ttl_secs: ttl_secs,
    };
    (create_app(&config), db, jwt)
}

/// POST a JSON body and return the raw response.
pub async fn post_json(app: &axum::Router, uri: &str, body: Value) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// POST a JSON body with a raw access token in the Authorization header.
pub async fn post_json_auth(
    app: &axum::Router,
    uri: &str,
    token: &str,
    body: Value,
) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("authorization", token)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// GET with a raw access token in the Authorization header.
pub async fn get_auth(app: &axum::Router, uri: &str, token: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("authorization", token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// GET without credentials.
pub async fn get_anon(app: &axum::Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Consume a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Register a user; panics unless the API answers 201.
pub async fn register(app: &axum::Router, name: &str, email: &str, password: &str) -> String {
    let response = post_json(
        app,
        "/api/auth/register",
        json!({ "name": name, "email": email, "password": password }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

/// Log in without 2FA; returns (access_token, refresh_token).
pub async fn login(app: &axum::Router, email: &str, password: &str) -> (String, String) {
    let response = post_json(
        app,
        "/api/auth/login",
        json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    (
        body["accessToken"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
    )
}

/// Compute the current TOTP code for a base32 secret, mirroring the
/// server's RFC 6238 parameters.
pub fn current_totp_code(secret: &str) -> String {
    use totp_rs::{Algorithm, Secret, TOTP};
    let secret_bytes = Secret::Encoded(secret.to_string()).to_bytes().unwrap();
    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret_bytes,
        Some(TOTP_ISSUER.to_string()),
        "test@example.com".to_string(),
    )
    .unwrap();
    totp.generate_current().unwrap()
}
