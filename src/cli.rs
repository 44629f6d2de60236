//! CLI argument parsing, validation, and startup helpers.

use clap::Parser;
use tracing::{error, info};

use crate::db::Database;
use crate::temp_token::DEFAULT_TEMP_TOKEN_TTL_SECS;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "authd",
    about = "Credential authentication service with rotating refresh tokens and TOTP 2FA"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "authd.db")]
    pub database: String,

    /// Issuer label embedded in TOTP provisioning URIs
    #[arg(long, default_value = "authd")]
    pub totp_issuer: String,

    /// Validity window for 2FA temporary tokens, in seconds
    #[arg(long, default_value_t = DEFAULT_TEMP_TOKEN_TTL_SECS)]
    pub temp_token_ttl: u64,

    /// Path to file containing the access-token signing secret.
    /// Prefer using the ACCESS_TOKEN_SECRET env var instead
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh-token signing secret.
    /// Prefer using the REFRESH_TOKEN_SECRET env var instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// The two signing secrets. They must differ: a shared secret would let a
/// refresh token with a forged subject masquerade as an access token.
pub struct TokenSecrets {
    pub access: Vec<u8>,
    pub refresh: Vec<u8>,
}

/// Load both signing secrets from environment variables or files.
/// Returns None and logs an error if either secret cannot be loaded.
pub fn load_token_secrets(
    access_secret_file: Option<&str>,
    refresh_secret_file: Option<&str>,
) -> Option<TokenSecrets> {
    let access = load_secret("ACCESS_TOKEN_SECRET", access_secret_file)?;
    let refresh = load_secret("REFRESH_TOKEN_SECRET", refresh_secret_file)?;

    if access == refresh {
        error!("Access and refresh token secrets must differ");
        return None;
    }

    Some(TokenSecrets {
        access: access.into_bytes(),
        refresh: refresh.into_bytes(),
    })
}

fn load_secret(env_var: &str, file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or use the matching --*-secret-file flag",
            env_var
        );
        return None;
    };

    if secret.len() < MIN_TOKEN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_TOKEN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
