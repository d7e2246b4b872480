//! Session token signing and verification
//!
//! Session tokens are HS256 JWTs binding the client IP that passed a Turnstile
//! check. They are self-contained: nothing is stored server-side, so only the
//! signature, the expiry and the IP binding are checked.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    /// Client IP the token was issued to
    pub ip: String,

    /// Expiration timestamp (Unix epoch)
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch)
    pub iat: i64,

    /// Unique token id
    pub jti: String,
}

impl SessionClaims {
    /// Create claims for `ip` expiring `ttl_seconds` from now
    ///
    /// # Errors
    /// * `JwtError::Generation` - Expiry falls outside the representable range
    pub fn new(ip: impl Into<String>, ttl_seconds: i64) -> Result<Self, JwtError> {
        let now = Utc::now();
        let exp = Duration::try_seconds(ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                JwtError::Generation(format!("token lifetime out of range: {}s", ttl_seconds))
            })?
            .timestamp();

        Ok(Self {
            ip: ip.into(),
            exp,
            iat: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Signs and verifies session tokens
pub struct SessionTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl SessionTokenCodec {
    /// Create a codec with the given secret and token lifetime
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }

    /// Lifetime of freshly issued tokens
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue a new token bound to `ip`
    pub fn issue(&self, ip: &str) -> Result<String, JwtError> {
        self.sign(&SessionClaims::new(ip, self.ttl_seconds)?)
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &SessionClaims) -> Result<String, JwtError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| JwtError::Generation(e.to_string()))
    }

    /// Verify signature and expiry, returning the claims
    ///
    /// # Errors
    /// * `JwtError::Expired` - Token has expired
    /// * `JwtError::InvalidSignature` - Token signature is invalid
    /// * `JwtError::InvalidFormat` - Token format is invalid
    pub fn verify(&self, token: &str) -> Result<SessionClaims, JwtError> {
        let mut validation = Validation::default();
        // No leeway for expiration checks - tokens expire at exactly the exp time
        validation.leeway = 0;

        let token_data = decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidFormat(e.to_string()),
            })?;

        Ok(token_data.claims)
    }

    /// Verify a token and check that it was issued to `ip`
    ///
    /// # Errors
    /// * `JwtError::IpMismatch` - Token was issued to a different client
    pub fn verify_for_ip(&self, token: &str, ip: &str) -> Result<SessionClaims, JwtError> {
        let claims = self.verify(token)?;

        if claims.ip != ip {
            return Err(JwtError::IpMismatch {
                request_ip: ip.to_string(),
                token_ip: claims.ip,
            });
        }

        Ok(claims)
    }
}

/// Session token errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid token format: {0}")]
    InvalidFormat(String),

    #[error("Token IP mismatch: request from {request_ip}, token issued to {token_ip}")]
    IpMismatch { request_ip: String, token_ip: String },

    #[error("Token generation failed: {0}")]
    Generation(String),
}
