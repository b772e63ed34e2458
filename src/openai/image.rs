use crate::auth::Credential;
use crate::config::OpenAiConfig;
use crate::files::MediaStore;
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Provider latency for image generation runs to minutes.
const IMAGE_TIMEOUT: Duration = Duration::from_secs(180);
const FIRST_SENTENCE_MAX: usize = 200;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("content policy violation detected")]
    ContentPolicy,
    #[error("authentication failed - check API key")]
    Auth,
    #[error("image deployment '{0}' not found")]
    MissingDeployment(String),
    #[error("rate limit exceeded, try again later")]
    RateLimit,
    #[error("image generation failed: {0}")]
    Generation(String),
}

impl ImageError {
    /// Marker stored on the story record; only the policy rejection is a
    /// distinct user-facing condition.
    pub fn error_type(&self) -> &'static str {
        match self {
            ImageError::ContentPolicy => "content_policy",
            _ => "generation_error",
        }
    }
}

/// A generated illustration persisted under the media directory.
#[derive(Debug)]
pub struct SavedIllustration {
    pub filename: String,
    pub url: String,
}

/// Calls the image-generation API and stores the result locally.
#[derive(Debug)]
pub struct ImageGenerator {
    http: reqwest::Client,
    endpoint: String,
    deployment: String,
    api_version: String,
    credential: Arc<Credential>,
    media: MediaStore,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

impl ImageGenerator {
    pub fn new(config: &OpenAiConfig, credential: Arc<Credential>, media: MediaStore) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(IMAGE_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            deployment: config.dalle_deployment.clone(),
            api_version: config.api_version.clone(),
            credential,
            media,
        }
    }

    fn generations_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/images/generations?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    fn build_prompt(story_text: &str, style: &str) -> String {
        let first_sentence: String = story_text
            .split('.')
            .next()
            .unwrap_or("")
            .chars()
            .take(FIRST_SENTENCE_MAX)
            .collect();
        if first_sentence.trim().is_empty() {
            format!("A {} style illustration inspired by a story", style)
        } else {
            format!("A {} style artistic illustration of: {}", style, first_sentence)
        }
    }

    pub async fn illustrate(
        &self,
        story_text: &str,
        style: &str,
        size: &str,
        quality: &str,
    ) -> Result<SavedIllustration, ImageError> {
        let prompt = Self::build_prompt(story_text, style);
        let mut payload = serde_json::json!({ "prompt": prompt, "n": 1, "size": size });
        if quality == "hd" {
            payload["quality"] = serde_json::json!("hd");
        }

        info!(deployment = %self.deployment, style, size, "generating illustration");
        let mut req = self.http.post(self.generations_url()).json(&payload);
        req = match &*self.credential {
            Credential::ApiKey(key) => req.header("api-key", key),
            Credential::ManagedIdentity(provider) => {
                req.bearer_auth(provider.token().await.map_err(|_| ImageError::Auth)?)
            }
        };

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ImageError::Generation("request timed out".into())
            } else {
                ImageError::Generation(format!("network error: {}", e))
            }
        })?;

        let status = resp.status();
        match status.as_u16() {
            200 => {}
            400 => {
                let body = resp.text().await.unwrap_or_default();
                error!(detail = %body, "image request rejected");
                return Err(classify_bad_request(&body));
            }
            401 | 403 => return Err(ImageError::Auth),
            404 => return Err(ImageError::MissingDeployment(self.deployment.clone())),
            429 => {
                warn!("image generation rate limited");
                return Err(ImageError::RateLimit);
            }
            code => return Err(ImageError::Generation(format!("HTTP {}", code))),
        }

        let body: ImageResponse = resp
            .json()
            .await
            .map_err(|e| ImageError::Generation(format!("invalid response: {}", e)))?;
        let data = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ImageError::Generation("empty response data".into()))?;

        let bytes = if let Some(encoded) = data.b64_json {
            base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| ImageError::Generation(format!("invalid inline image: {}", e)))?
        } else if let Some(url) = data.url {
            self.download(&url).await?
        } else {
            return Err(ImageError::Generation("response carried neither url nor data".into()));
        };

        let filename = self
            .media
            .save_generated(&bytes)
            .await
            .map_err(|e| ImageError::Generation(format!("failed to store image: {}", e)))?;
        info!(%filename, bytes = bytes.len(), "illustration saved");

        Ok(SavedIllustration { url: format!("/media/generated/{}", filename), filename })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ImageError::Generation(format!("download failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(ImageError::Generation("failed to download generated image".into()));
        }
        Ok(resp
            .bytes()
            .await
            .map_err(|e| ImageError::Generation(format!("download failed: {}", e)))?
            .to_vec())
    }
}

fn classify_bad_request(body: &str) -> ImageError {
    #[derive(Deserialize)]
    struct ErrBody {
        error: Option<ErrDetail>,
    }
    #[derive(Deserialize)]
    struct ErrDetail {
        message: Option<String>,
        #[serde(default)]
        code: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrBody>(body) {
        if let Some(detail) = parsed.error {
            let message = detail.message.unwrap_or_default();
            let code = detail.code.unwrap_or_default();
            if message.to_lowercase().contains("content policy")
                || code == "content_policy_violation"
                || code == "contentFilter"
            {
                return ImageError::ContentPolicy;
            }
            return ImageError::Generation(format!("request error: {}", message));
        }
    }
    ImageError::Generation("bad request - check story content".into())
}
