use crate::auth::{Credential, TokenProvider, COGNITIVE_SERVICES_RESOURCE, COSMOS_RESOURCE};
use anyhow::Context;
use std::env;
use std::path::PathBuf;

/// How the process authenticates against the Azure services. Decided once at
/// startup; call sites never inspect the environment themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    ApiKey,
    ManagedIdentity,
}

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub deployment: String,
    pub dalle_deployment: String,
    pub api_version: String,
}

#[derive(Clone, Debug)]
pub struct CosmosConfig {
    pub endpoint: String,
    pub database: String,
    pub container: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub auth_mode: AuthMode,
    pub openai: OpenAiConfig,
    openai_key: Option<String>,
    /// `None` means no document store is configured and the in-memory store
    /// is used instead (local development).
    pub cosmos: Option<CosmosConfig>,
    cosmos_key: Option<String>,
    identity_endpoint: Option<String>,
    identity_header: Option<String>,
    pub media_dir: PathBuf,
    pub port: u16,
}

/// Values pasted into .env files routinely arrive wrapped in quotes.
fn clean(value: String) -> String {
    value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()
}

fn env_clean(name: &str) -> Option<String> {
    env::var(name).ok().map(clean).filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let identity_endpoint =
            env_clean("IDENTITY_ENDPOINT").or_else(|| env_clean("MSI_ENDPOINT"));
        let identity_header = env_clean("IDENTITY_HEADER");

        let auth_mode = match env_clean("AUTH_MODE").as_deref() {
            Some("api_key") => AuthMode::ApiKey,
            Some("managed_identity") => AuthMode::ManagedIdentity,
            Some(other) => anyhow::bail!("unknown AUTH_MODE {:?}", other),
            None => {
                let platform_managed = identity_endpoint.is_some()
                    || env_clean("WEBSITE_SITE_NAME").is_some()
                    || env_clean("CONTAINER_APP_NAME").is_some()
                    || env_clean("AZURE_CLIENT_ID").is_some();
                if platform_managed {
                    AuthMode::ManagedIdentity
                } else {
                    AuthMode::ApiKey
                }
            }
        };

        let openai = OpenAiConfig {
            endpoint: env_clean("AZURE_OPENAI_ENDPOINT")
                .context("AZURE_OPENAI_ENDPOINT is not set")?,
            deployment: env_clean("AZURE_OPENAI_DEPLOYMENT").unwrap_or_else(|| "gpt-4o".into()),
            dalle_deployment: env_clean("AZURE_DALLE_DEPLOYMENT_NAME")
                .unwrap_or_else(|| "dall-e-3".into()),
            api_version: env_clean("AZURE_OPENAI_API_VERSION")
                .unwrap_or_else(|| "2024-02-01".into()),
        };

        let cosmos = env_clean("COSMOS_DB_ENDPOINT").map(|endpoint| CosmosConfig {
            endpoint,
            database: env_clean("COSMOS_DB_DATABASE").unwrap_or_else(|| "vibestory".into()),
            container: env_clean("COSMOS_DB_CONTAINER").unwrap_or_else(|| "stories".into()),
        });

        Ok(Config {
            auth_mode,
            openai,
            openai_key: env_clean("AZURE_OPENAI_KEY").or_else(|| env_clean("AZURE_OPENAI_API_KEY")),
            cosmos,
            cosmos_key: env_clean("COSMOS_DB_KEY"),
            identity_endpoint,
            identity_header,
            media_dir: env_clean("MEDIA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/media")),
            port: env_clean("PORT").and_then(|s| s.parse().ok()).unwrap_or(8000),
        })
    }

    pub fn openai_credential(&self) -> anyhow::Result<Credential> {
        self.credential_for(self.openai_key.clone(), "AZURE_OPENAI_KEY", COGNITIVE_SERVICES_RESOURCE)
    }

    pub fn cosmos_credential(&self) -> anyhow::Result<Credential> {
        self.credential_for(self.cosmos_key.clone(), "COSMOS_DB_KEY", COSMOS_RESOURCE)
    }

    fn credential_for(
        &self,
        key: Option<String>,
        key_var: &str,
        resource: &str,
    ) -> anyhow::Result<Credential> {
        match self.auth_mode {
            AuthMode::ApiKey => {
                let key = key.with_context(|| format!("{} is not set", key_var))?;
                Ok(Credential::ApiKey(key))
            }
            AuthMode::ManagedIdentity => {
                let endpoint = self
                    .identity_endpoint
                    .clone()
                    .context("managed identity selected but no identity endpoint is available")?;
                Ok(Credential::ManagedIdentity(TokenProvider::new(
                    endpoint,
                    self.identity_header.clone(),
                    resource,
                )))
            }
        }
    }
}
