//! Typed HTTP client for the external identity provider.
//!
//! The provider owns login and session issuance; this client only validates
//! session tokens and forwards sign-out. Provider outages fail closed — an
//! unreachable provider is treated the same as an invalid session.

use async_trait::async_trait;
use serde::Deserialize;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Login page users are redirected to when no valid session is present.
    fn login_url(&self) -> String;
    /// Check whether a session token is valid.
    async fn validate(&self, token: &str) -> Result<bool, String>;
    /// Invalidate a session at the provider.
    async fn sign_out(&self, token: &str) -> Result<(), String>;
}

pub struct IdentityClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SessionStatus {
    #[serde(default)]
    active: bool,
}

impl IdentityClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    fn login_url(&self) -> String {
        format!("{}/login", self.base_url)
    }

    async fn validate(&self, token: &str) -> Result<bool, String> {
        let resp = self
            .client
            .get(format!("{}/session", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| format!("Session validation request failed: {}", e))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(false);
        }
        if !resp.status().is_success() {
            return Err(format!("Identity provider returned HTTP {}", resp.status()));
        }

        let status: SessionStatus = resp
            .json()
            .await
            .map_err(|e| format!("Parse session response: {}", e))?;
        Ok(status.active)
    }

    async fn sign_out(&self, token: &str) -> Result<(), String> {
        let resp = self
            .client
            .post(format!("{}/session/signout", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| format!("Sign-out request failed: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("Sign-out HTTP {}: {}", status, body));
        }
        Ok(())
    }
}
