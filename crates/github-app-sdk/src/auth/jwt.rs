//! RS256 app assertion signing.
//!
//! GitHub requires RS256 for app-level JWTs, a maximum lifetime of 10
//! minutes, and `iss`/`iat`/`exp` claims. The issued-at claim is backdated
//! by 60 seconds to absorb clock skew between us and GitHub.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AppAssertion, GitHubAppId};
use crate::error::AuthError;

/// Maximum assertion lifetime accepted by GitHub.
const MAX_LIFETIME_MINUTES: i64 = 10;

/// Clock-skew allowance subtracted from the issued-at claim.
const CLOCK_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Issuer: the GitHub App id.
    iss: String,
    /// Issued at (Unix timestamp, backdated for clock skew).
    iat: i64,
    /// Expiration (Unix timestamp, at most 10 minutes after iat).
    exp: i64,
}

/// Sign a short-lived app assertion with the app's RSA private key.
///
/// # Arguments
///
/// * `app_id` - The GitHub App numeric id (the `iss` claim)
/// * `private_key_pem` - PEM-encoded RSA private key
///
/// # Errors
///
/// Returns [`AuthError::InvalidPrivateKey`] when the PEM cannot be parsed
/// and [`AuthError::AssertionFailed`] when encoding fails.
pub fn sign_app_assertion(
    app_id: GitHubAppId,
    private_key_pem: &str,
) -> Result<AppAssertion, AuthError> {
    let now = Utc::now();
    let expires_at = now + Duration::minutes(MAX_LIFETIME_MINUTES);

    let claims = Claims {
        iss: app_id.to_string(),
        iat: now.timestamp() - CLOCK_SKEW_SECONDS,
        exp: expires_at.timestamp(),
    };

    let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).map_err(|e| {
        AuthError::InvalidPrivateKey {
            message: format!("failed to parse RSA private key: {e}"),
        }
    })?;

    let header = Header::new(Algorithm::RS256);

    let token = encode(&header, &claims, &encoding_key).map_err(|e| AuthError::AssertionFailed {
        message: format!("failed to encode JWT: {e}"),
    })?;

    debug!(app_id = %app_id, exp = claims.exp, "signed app assertion");

    Ok(AppAssertion::new(token, app_id, expires_at))
}

#[cfg(test)]
#[path = "jwt_tests.rs"]
mod tests;
