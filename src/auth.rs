use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const COGNITIVE_SERVICES_RESOURCE: &str = "https://cognitiveservices.azure.com";
pub const COSMOS_RESOURCE: &str = "https://cosmos.azure.com";

const IDENTITY_API_VERSION: &str = "2019-08-01";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity endpoint request failed: {0}")]
    Endpoint(String),
    #[error("identity endpoint returned a malformed token response: {0}")]
    Malformed(String),
}

/// Credential used against the Azure services. One variant per auth mode,
/// selected by [`crate::config::Config`] at startup.
#[derive(Debug)]
pub enum Credential {
    ApiKey(String),
    ManagedIdentity(TokenProvider),
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Fetches bearer tokens from the platform identity endpoint and caches them
/// until shortly before expiry.
#[derive(Debug)]
pub struct TokenProvider {
    http: reqwest::Client,
    endpoint: String,
    identity_header: Option<String>,
    resource: String,
    cached: RwLock<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Unix seconds; App Service historically returned this as a string.
    expires_on: serde_json::Value,
}

impl TokenProvider {
    pub fn new(endpoint: String, identity_header: Option<String>, resource: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            identity_header,
            resource: resource.to_string(),
            cached: RwLock::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, AuthError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.expires_at - Duration::minutes(2) > Utc::now() {
                return Ok(cached.token.clone());
            }
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        debug!(resource = %self.resource, "fetching managed identity token");
        let mut req = self
            .http
            .get(&self.endpoint)
            .query(&[("resource", self.resource.as_str()), ("api-version", IDENTITY_API_VERSION)]);
        if let Some(header) = &self.identity_header {
            req = req.header("X-IDENTITY-HEADER", header);
        }

        let resp = req.send().await.map_err(|e| AuthError::Endpoint(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            warn!(%status, "identity endpoint rejected token request");
            return Err(AuthError::Endpoint(format!("HTTP {}", status)));
        }

        let body: TokenResponse =
            resp.json().await.map_err(|e| AuthError::Malformed(e.to_string()))?;
        let expires_on = parse_expires_on(&body.expires_on)
            .ok_or_else(|| AuthError::Malformed(format!("expires_on: {}", body.expires_on)))?;

        let cached = CachedToken {
            token: body.access_token.clone(),
            expires_at: DateTime::from_timestamp(expires_on, 0)
                .unwrap_or_else(|| Utc::now() + Duration::minutes(5)),
        };
        *self.cached.write().await = Some(cached);
        Ok(body.access_token)
    }
}

fn parse_expires_on(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
