pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod temp_token;
pub mod totp;

use api::create_api_router;
use axum::Router;
use db::Database;
use jwt::JwtConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use temp_token::TempTokenCache;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Signing secret for access tokens
    pub access_secret: Vec<u8>,
    /// Signing secret for refresh tokens (must differ from access)
    pub refresh_secret: Vec<u8>,
    /// Issuer label for TOTP provisioning URIs
    pub totp_issuer: String,
    /// Validity window for 2FA temporary tokens, in seconds
    pub temp_token_ttl_secs: u64,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.access_secret, &config.refresh_secret));
    let temp_tokens = Arc::new(TempTokenCache::new(config.temp_token_ttl_secs));

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        temp_tokens,
        config.totp_issuer.clone(),
    );

    Router::new().nest("/api", api_router)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
