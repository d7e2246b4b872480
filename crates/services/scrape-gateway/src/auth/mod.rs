//! Request authentication
//!
//! Clients present one opaque credential string, either a Turnstile response
//! (`turnstile|<response>`) or a session token issued earlier
//! (`jwt|<token>`). The broker classifies it once, dispatches to the matching
//! check and collapses the result into a single [`AuthDecision`].
//!
//! ```text
//!   "turnstile|..." ──▶ TurnstileVerifier ──ok──▶ issue session token ──▶ Granted { new_token }
//!   "jwt|..."       ──▶ SessionTokenCodec ──ok──────────────────────────▶ Granted { None }
//!   anything else   ──────────────────────────────────────────────────▶ Denied [invalid-token-type]
//! ```

pub mod jwt;
pub mod turnstile;

use std::sync::Arc;

use self::jwt::{JwtError, SessionTokenCodec};
use self::turnstile::AttestationVerifier;

/// Credential string had no known prefix
pub const INVALID_TOKEN_TYPE: &str = "invalid-token-type";
/// Session token was forged, malformed or expired
pub const JWT_INVALID: &str = "jwt-invalid";
/// Session token was issued to another client IP
pub const JWT_IP_INVALID: &str = "jwt-ip-invalid";
/// Attestation service could not be reached or answered garbage
pub const ATTESTATION_UNAVAILABLE: &str = "internal-error";

const TURNSTILE_PREFIX: &str = "turnstile|";
const JWT_PREFIX: &str = "jwt|";

/// A classified client credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Turnstile response to verify with the third-party service
    Attestation { secret_response: String },

    /// Session token previously issued by this gateway
    Session { signed_token: String },
}

impl Credential {
    /// Classify a raw credential string by its prefix
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(token) = raw.strip_prefix(JWT_PREFIX) {
            return Some(Credential::Session {
                signed_token: token.to_string(),
            });
        }

        raw.strip_prefix(TURNSTILE_PREFIX)
            .map(|response| Credential::Attestation {
                secret_response: response.to_string(),
            })
    }

    /// Kind label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Attestation { .. } => "turnstile",
            Credential::Session { .. } => "jwt",
        }
    }
}

/// Result of authenticating a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Request may proceed; `new_token` is set when a session was just issued
    Granted { new_token: Option<String> },

    /// Request is rejected with machine-readable codes
    Denied { error_codes: Vec<String> },
}

impl AuthDecision {
    fn denied(code: &str) -> Self {
        AuthDecision::Denied {
            error_codes: vec![code.to_string()],
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, AuthDecision::Granted { .. })
    }
}

/// Turnstile + session token authentication broker
pub struct AuthBroker {
    verifier: Arc<dyn AttestationVerifier>,
    codec: SessionTokenCodec,
}

impl AuthBroker {
    /// Create a broker from an attestation verifier and a session codec
    pub fn new(verifier: Arc<dyn AttestationVerifier>, codec: SessionTokenCodec) -> Self {
        Self { verifier, codec }
    }

    /// Session token codec used for issuing and checking sessions
    pub fn codec(&self) -> &SessionTokenCodec {
        &self.codec
    }

    /// Authenticate a raw credential presented by `client_ip`
    pub async fn authenticate(&self, raw: &str, client_ip: &str) -> AuthDecision {
        let credential = match Credential::parse(raw) {
            Some(credential) => credential,
            None => {
                tracing::debug!(client_ip = %client_ip, "Credential has no known prefix");
                return AuthDecision::denied(INVALID_TOKEN_TYPE);
            }
        };

        match credential {
            Credential::Session { signed_token } => self.check_session(&signed_token, client_ip),
            Credential::Attestation { secret_response } => {
                self.check_attestation(&secret_response, client_ip).await
            }
        }
    }

    fn check_session(&self, token: &str, client_ip: &str) -> AuthDecision {
        match self.codec.verify_for_ip(token, client_ip) {
            Ok(_) => AuthDecision::Granted { new_token: None },
            Err(JwtError::IpMismatch {
                request_ip,
                token_ip,
            }) => {
                tracing::warn!(
                    client_ip = %request_ip,
                    token_ip = %token_ip,
                    "Session token presented from another IP"
                );
                AuthDecision::denied(JWT_IP_INVALID)
            }
            Err(JwtError::Expired) => {
                tracing::debug!(client_ip = %client_ip, "Session token expired");
                AuthDecision::denied(JWT_INVALID)
            }
            Err(e) => {
                tracing::warn!(client_ip = %client_ip, error = %e, "Session token rejected");
                AuthDecision::denied(JWT_INVALID)
            }
        }
    }

    async fn check_attestation(&self, response: &str, client_ip: &str) -> AuthDecision {
        let outcome = match self.verifier.verify(response, client_ip).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(client_ip = %client_ip, error = %e, "Turnstile verification unavailable");
                return AuthDecision::denied(ATTESTATION_UNAVAILABLE);
            }
        };

        if !outcome.success {
            return AuthDecision::Denied {
                error_codes: outcome.error_codes,
            };
        }

        match self.codec.issue(client_ip) {
            Ok(token) => {
                tracing::info!(client_ip = %client_ip, "Issued session token");
                AuthDecision::Granted {
                    new_token: Some(token),
                }
            }
            Err(e) => {
                // Attestation passed; the client just has to attest again next time
                tracing::error!(client_ip = %client_ip, error = %e, "Failed to issue session token");
                AuthDecision::Granted { new_token: None }
            }
        }
    }
}
