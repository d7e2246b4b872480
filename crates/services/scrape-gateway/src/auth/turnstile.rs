//! Cloudflare Turnstile verification
//!
//! Posts the client's Turnstile response to the siteverify endpoint and
//! reports the outcome. One outbound call per check.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Outcome of an attestation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationOutcome {
    pub success: bool,

    /// Error codes reported by the verification service
    pub error_codes: Vec<String>,
}

/// Third-party attestation check
#[async_trait]
pub trait AttestationVerifier: Send + Sync {
    /// Verify `response` as submitted by a client at `remote_ip`
    async fn verify(
        &self,
        response: &str,
        remote_ip: &str,
    ) -> Result<AttestationOutcome, TurnstileError>;
}

/// Body returned by siteverify
#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,

    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// Turnstile siteverify client
pub struct TurnstileVerifier {
    client: Client,
    secret: String,
    verify_url: String,
}

impl TurnstileVerifier {
    /// Create a verifier posting to `verify_url` with `secret`
    pub fn new(secret: String, verify_url: String) -> Result<Self, TurnstileError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TurnstileError::Request(e.to_string()))?;

        Ok(Self {
            client,
            secret,
            verify_url,
        })
    }
}

#[async_trait]
impl AttestationVerifier for TurnstileVerifier {
    async fn verify(
        &self,
        response: &str,
        remote_ip: &str,
    ) -> Result<AttestationOutcome, TurnstileError> {
        let form = [
            ("secret", self.secret.as_str()),
            ("response", response),
            ("remoteip", remote_ip),
        ];

        let reply = self
            .client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TurnstileError::Request(e.to_string()))?;

        let status = reply.status().as_u16();
        let body: SiteVerifyResponse = reply
            .json()
            .await
            .map_err(|e| TurnstileError::Decode(format!("HTTP {}: {}", status, e)))?;

        tracing::debug!(
            remote_ip = %remote_ip,
            success = body.success,
            error_codes = ?body.error_codes,
            "Turnstile verification finished"
        );

        Ok(AttestationOutcome {
            success: body.success,
            error_codes: body.error_codes,
        })
    }
}

/// Turnstile client errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TurnstileError {
    #[error("Turnstile request failed: {0}")]
    Request(String),

    #[error("Invalid Turnstile response: {0}")]
    Decode(String),
}
