use super::client::{ChatMessage, ContentPart, ImageUrl, OpenAiClient};
use super::normalize::normalize;
use super::GenerationError;
use base64::Engine;
use std::sync::Arc;
use tracing::{debug, info};

/// Normalized output of a generation call; the HTTP layer assembles the
/// persisted record from it.
#[derive(Debug)]
pub struct StoryDraft {
    pub title: String,
    pub content: String,
}

/// Builds prompts, invokes the completion API and normalizes the response.
#[derive(Debug)]
pub struct StoryGenerator {
    client: Arc<OpenAiClient>,
}

const TEMPERATURE: f32 = 0.8;

fn token_budget(length: &str) -> u32 {
    match length {
        "long" => 2500,
        "medium" => 1500,
        _ => 800,
    }
}

fn length_guide(length: &str) -> &'static str {
    match length {
        "long" => "Create a detailed story of 900-1500 words",
        "medium" => "Write 500-800 words",
        _ => "Keep it between 200-400 words",
    }
}

fn theme_instruction(theme: &str) -> &'static str {
    match theme {
        "horror" => "Write a spine-chilling horror story inspired by this image. Include suspense, mystery, and eerie elements.",
        "sci-fi" => "Write a science fiction story inspired by this image. Include futuristic technology, space, or advanced concepts.",
        "kids" => "Write a fun, wholesome children's story inspired by this image. Keep it age-appropriate and imaginative.",
        "romance" => "Write a romantic story inspired by this image. Include love, relationships, and emotional connections.",
        "mystery" => "Write a mystery story inspired by this image. Include clues, investigation, and suspenseful reveals.",
        "adventure" => "Write an exciting adventure story inspired by this image. Include exploration, challenges, and heroic journeys.",
        "fantasy" => "Write a fantasy story inspired by this image. Include magic, mythical creatures, or enchanted worlds.",
        "comedy" => "Write a humorous, funny story inspired by this image. Include wit, amusing situations, and light-hearted elements.",
        _ => "Write an engaging, creative story inspired by this image.",
    }
}

impl StoryGenerator {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        genre: &str,
        length: &str,
        tone: &str,
    ) -> Result<StoryDraft, GenerationError> {
        let system = format!(
            "You are a creative story writer. Generate a {length} {genre} story with a {tone} tone.\n\
             \n\
             Guidelines:\n\
             - {guide}\n\
             - Make the story engaging, well-structured, and complete.\n\
             \n\
             Respond with a JSON object containing a \"title\" and \"content\" field.",
            length = length,
            genre = genre,
            tone = tone,
            guide = length_guide(length),
        );
        let user = format!("Write a story based on this prompt: {}", prompt);

        info!(genre, length, tone, "generating story");
        let raw = self
            .client
            .chat(
                &[ChatMessage::system(system), ChatMessage::user(user)],
                token_budget(length),
                TEMPERATURE,
            )
            .await?;

        let (title, content) = normalize(&raw, prompt, genre);
        debug!(title = %title, words = content.split_whitespace().count(), "story normalized");
        Ok(StoryDraft { title, content })
    }

    pub async fn generate_from_image(
        &self,
        image_bytes: &[u8],
        theme: &str,
        length: &str,
        tone: &str,
        additional_context: &str,
    ) -> Result<StoryDraft, GenerationError> {
        let mut system = format!(
            "You are a creative storyteller. Look at the image provided and {instruction}\n\
             \n\
             Guidelines:\n\
             - {guide}\n\
             - Use a {tone} tone\n\
             - Create engaging characters and dialogue\n\
             - Include vivid descriptions inspired by what you see\n\
             - Make the story complete with a beginning, middle, and end\n\
             \n\
             Respond with a JSON object containing a \"title\" and \"content\" field.",
            instruction = theme_instruction(theme).to_lowercase(),
            guide = length_guide(length),
            tone = tone,
        );
        if !additional_context.is_empty() {
            system.push_str(&format!("\n\nAdditional context: {}", additional_context));
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let user = ChatMessage::user_parts(vec![
            ContentPart::Text { text: "Please write a story based on this image:".into() },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: format!("data:image/jpeg;base64,{}", encoded) },
            },
        ]);

        info!(theme, length, tone, image_bytes = image_bytes.len(), "generating story from image");
        let raw = self
            .client
            .chat(&[ChatMessage::system(system), user], token_budget(length), TEMPERATURE)
            .await?;

        let (title, content) = normalize(&raw, additional_context, theme);
        Ok(StoryDraft { title, content })
    }
}
