//! Service principal authentication against Microsoft Entra ID.
//!
//! Implements the OAuth2 client-credentials grant at
//! `{authority}/{tenant}/oauth2/v2.0/token` and caches the access token
//! until shortly before it expires.

use acr_sample_core::error::{Result, SampleError};
use acr_sample_core::{CredentialConfig, EndpointConfig};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

/// Tokens are refreshed when they have less than this left.
const REFRESH_MARGIN_SECS: i64 = 300;

/// Source of bearer tokens for a given scope.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Return a valid bearer token for `scope`.
    async fn token(&self, scope: &str) -> Result<String>;
}

/// A bearer token with its absolute expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token is still usable at `now`, keeping the refresh margin.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_on - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Token endpoint error body.
#[derive(Debug, Default, Deserialize)]
struct TokenError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Client-secret credential for a service principal.
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<(String, AccessToken)>>,
}

impl ClientSecretCredential {
    /// Create a credential from sample configuration.
    pub fn new(credentials: &CredentialConfig, endpoints: &EndpointConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            authority_host: endpoints.authority_host.trim_end_matches('/').to_string(),
            tenant_id: credentials.tenant_id.clone(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            cached: Mutex::new(None),
        }
    }

    /// Token endpoint URL for this tenant.
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host, self.tenant_id
        )
    }

    async fn request_token(&self, scope: &str) -> Result<AccessToken> {
        let url = self.token_url();
        tracing::debug!(url = %url, client_id = %self.client_id, "Requesting access token");

        let auth_error = |message: String| SampleError::AuthError {
            authority: self.authority_host.clone(),
            message,
        };

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|e| auth_error(format!("Failed to reach token endpoint: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| auth_error(format!("Failed to read token response: {}", e)))?;

        if !status.is_success() {
            let err: TokenError = serde_json::from_str(&body).unwrap_or_default();
            let message = if err.error.is_empty() {
                format!("token endpoint returned {}", status)
            } else {
                format!("{}: {}", err.error, first_line(&err.error_description))
            };
            return Err(auth_error(message));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| auth_error(format!("Malformed token response: {}", e)))?;

        Ok(AccessToken {
            token: parsed.access_token,
            expires_on: Utc::now() + Duration::seconds(parsed.expires_in as i64),
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn token(&self, scope: &str) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some((cached_scope, token)) = cached.as_ref() {
            if cached_scope == scope && token.is_fresh(Utc::now()) {
                return Ok(token.token.clone());
            }
        }

        let token = self.request_token(scope).await?;
        tracing::debug!(expires_on = %token.expires_on, "Access token acquired");
        let value = token.token.clone();
        *cached = Some((scope.to_string(), token));
        Ok(value)
    }
}

/// Entra error descriptions carry trace IDs on following lines.
fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("").trim()
}

/// Management scope for a Resource Manager endpoint.
pub fn management_scope(resource_manager: &str) -> String {
    format!("{}/.default", resource_manager.trim_end_matches('/'))
}
