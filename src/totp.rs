//! TOTP secret provisioning and code verification.
//!
//! Standard RFC 6238 parameters: SHA-1, 6 digits, 30 second step, one step
//! of clock-drift tolerance in either direction.

use totp_rs::{Algorithm, Secret, TOTP};

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1;
const TOTP_STEP: u64 = 30;

/// Generate a fresh random shared secret, base32-encoded.
pub fn generate_secret() -> String {
    Secret::generate_secret().to_encoded().to_string()
}

/// Build the otpauth provisioning URI for an enrollment.
///
/// The URI is what the client renders as a QR code; we only produce the
/// string.
pub fn provisioning_uri(account: &str, issuer: &str, secret: &str) -> Option<String> {
    let totp = build(secret, issuer, account)?;
    Some(totp.get_url())
}

/// Verify a submitted code against a stored base32 secret.
///
/// Fails closed: an undecodable secret, an out-of-spec code, or a clock
/// error all yield `false` rather than an error.
pub fn verify(code: &str, secret: &str, issuer: &str, account: &str) -> bool {
    let Some(totp) = build(secret, issuer, account) else {
        return false;
    };
    totp.check_current(code).unwrap_or(false)
}

fn build(secret: &str, issuer: &str, account: &str) -> Option<TOTP> {
    let secret_bytes = Secret::Encoded(secret.to_string()).to_bytes().ok()?;
    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        TOTP_STEP,
        secret_bytes,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .ok()
}
