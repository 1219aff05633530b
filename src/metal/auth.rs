//! Request authentication for the metal-api.
//!
//! HMAC-authenticated requests carry an `X-Date` header with an RFC 3339 UTC
//! timestamp and an `Authorization: <user> <mac>` header, where the MAC is the
//! hex-encoded HMAC-SHA256 over the request method followed by that timestamp.

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::Credentials;
use crate::error::{MetalError, Result};

/// HMAC-SHA256 type alias.
type HmacSha256 = Hmac<Sha256>;

/// Timestamp header used by HMAC authentication.
pub const DATE_HEADER: &str = "X-Date";

/// Computes the authentication headers for one request.
///
/// Returns the `Authorization` value and, for HMAC, the `X-Date` value.
///
/// # Errors
///
/// Returns an error if the HMAC key is rejected.
pub fn auth_headers(
    credentials: &Credentials,
    method: &str,
    now: DateTime<Utc>,
) -> Result<(String, Option<String>)> {
    match credentials {
        Credentials::Token(token) => Ok((format!("Bearer {token}"), None)),
        Credentials::Hmac { user, key } => {
            let date = now.to_rfc3339_opts(SecondsFormat::Secs, true);
            let mac = sign(key, method, &date)?;
            Ok((format!("{user} {mac}"), Some(date)))
        }
    }
}

fn sign(key: &str, method: &str, date: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| MetalError::internal(format!("Invalid HMAC key: {e}")))?;
    mac.update(method.as_bytes());
    mac.update(date.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
