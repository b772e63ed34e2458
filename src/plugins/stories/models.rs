use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoryType {
    Text,
    Image,
}

/// Metadata of an illustrative-image generation attempt. Either the stored
/// file or the classified failure; never both.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub style: String,
    pub size: String,
    pub quality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The persisted unit of output. Records are append/delete only; nothing is
/// ever updated in place, so `word_count` stays consistent with `content`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Story {
    pub id: String,
    pub story_type: StoryType,
    pub title: String,
    pub content: String,
    pub genre: String,
    pub tone: String,
    pub length: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image: Option<GeneratedImage>,
    pub word_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Story {
    pub fn new_text(
        title: String,
        content: String,
        genre: String,
        tone: String,
        length: String,
        prompt: String,
    ) -> Self {
        let word_count = content.split_whitespace().count() as u64;
        Self {
            id: Uuid::new_v4().to_string(),
            story_type: StoryType::Text,
            title,
            content,
            genre,
            tone,
            length,
            prompt: Some(prompt),
            image_filename: None,
            image_description: None,
            generated_image: None,
            word_count,
            created_at: Utc::now(),
        }
    }

    pub fn new_image(
        title: String,
        content: String,
        theme: String,
        tone: String,
        length: String,
        image_filename: String,
        image_description: Option<String>,
    ) -> Self {
        let word_count = content.split_whitespace().count() as u64;
        Self {
            id: Uuid::new_v4().to_string(),
            story_type: StoryType::Image,
            title,
            content,
            genre: theme,
            tone,
            length,
            prompt: None,
            image_filename: Some(image_filename),
            image_description,
            generated_image: None,
            word_count,
            created_at: Utc::now(),
        }
    }
}

impl GeneratedImage {
    pub fn saved(
        filename: String,
        url: String,
        style: String,
        size: String,
        quality: String,
    ) -> Self {
        Self {
            filename: Some(filename),
            url: Some(url),
            style,
            size,
            quality,
            error_type: None,
            error: None,
        }
    }

    pub fn failed(
        style: String,
        size: String,
        quality: String,
        error_type: &str,
        error: String,
    ) -> Self {
        Self {
            filename: None,
            url: None,
            style,
            size,
            quality,
            error_type: Some(error_type.to_string()),
            error: Some(error),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct StoryRequest {
    pub prompt: String,
    pub genre: Option<String>,
    pub length: Option<String>,
    pub tone: Option<String>,
    pub generate_image: Option<bool>,
    pub image_style: Option<String>,
    pub image_size: Option<String>,
    pub image_quality: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ListQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Serialize, Debug)]
pub struct StoryResponse {
    pub success: bool,
    pub story: Story,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct StoriesListResponse {
    pub success: bool,
    pub stories: Vec<Story>,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct StatsResponse {
    pub success: bool,
    pub total: u64,
    pub text: u64,
    pub image: u64,
    pub avg_words: u64,
}

#[derive(Serialize, Debug)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
