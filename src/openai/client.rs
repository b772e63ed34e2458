use super::GenerationError;
use crate::auth::Credential;
use crate::config::OpenAiConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Chat-completions client for the Azure OpenAI dialect
/// (`{endpoint}/openai/deployments/{deployment}/chat/completions`).
#[derive(Debug)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    deployment: String,
    api_version: String,
    credential: Arc<Credential>,
}

#[derive(Serialize, Debug)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: ChatContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: "system", content: ChatContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: "user", content: ChatContent::Text(text.into()) }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self { role: "user", content: ChatContent::Parts(parts) }
    }
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Debug)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig, credential: Arc<Credential>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            deployment: config.deployment.clone(),
            api_version: config.api_version.clone(),
            credential,
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    /// Sends a chat completion request and returns the first choice's
    /// message content, trimmed.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let mut req = self
            .http
            .post(self.completions_url())
            .json(&ChatRequest { messages, max_tokens, temperature });

        req = match &*self.credential {
            Credential::ApiKey(key) => req.header("api-key", key),
            Credential::ManagedIdentity(provider) => req.bearer_auth(provider.token().await?),
        };

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, "completion request failed");
            return Err(match status.as_u16() {
                401 | 403 => GenerationError::Auth,
                429 => GenerationError::RateLimit,
                code => GenerationError::Api { status: code, message: api_error_message(&body) },
            });
        }

        let body: ChatResponse = resp.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::MalformedResponse("no choices returned".into()))?;
        debug!(chars = content.len(), "completion received");
        Ok(content.trim().to_string())
    }

    /// Cheap probe used by the health endpoint.
    pub async fn check_connection(&self) -> bool {
        self.chat(&[ChatMessage::user("Hello")], 5, 0.0).await.is_ok()
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}
