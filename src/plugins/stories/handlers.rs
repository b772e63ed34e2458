use crate::files::MediaStore;
use crate::http_error::AppError;
use crate::openai::{ImageGenerator, StoryGenerator};
use crate::plugins::stories::models::*;
use crate::store::{self, DynStoryStore};
use axum::extract::{Multipart, Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 100;

/// Dependencies handed to every handler; constructed once at startup.
#[derive(Clone)]
pub struct StoriesState {
    pub store: DynStoryStore,
    pub generator: Arc<StoryGenerator>,
    pub illustrator: Arc<ImageGenerator>,
    pub media: MediaStore,
}

fn or_default(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

pub async fn create_story(
    Extension(state): Extension<StoriesState>,
    Json(req): Json<StoryRequest>,
) -> Result<Json<StoryResponse>, AppError> {
    let prompt = req.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(AppError::new(StatusCode::BAD_REQUEST, "prompt must not be empty")
            .with_code("empty_prompt"));
    }
    let genre = or_default(req.genre, "general");
    let length = or_default(req.length, "short");
    let tone = or_default(req.tone, "neutral");

    let draft = state.generator.generate(&prompt, &genre, &length, &tone).await?;
    let mut story = Story::new_text(draft.title, draft.content, genre, tone, length, prompt);

    if req.generate_image.unwrap_or(false) {
        let style = or_default(req.image_style, "digital-art");
        let size = or_default(req.image_size, "1024x1024");
        let quality = or_default(req.image_quality, "standard");
        // illustration is a secondary operation: a failure becomes record
        // metadata, never a failed response
        story.generated_image = match state
            .illustrator
            .illustrate(&story.content, &style, &size, &quality)
            .await
        {
            Ok(saved) => {
                Some(GeneratedImage::saved(saved.filename, saved.url, style, size, quality))
            }
            Err(e) => {
                warn!(error = %e, error_type = e.error_type(), "illustration failed");
                Some(GeneratedImage::failed(style, size, quality, e.error_type(), e.to_string()))
            }
        };
    }

    let saved = store::upsert_best_effort(&state.store, &story).await;
    let message = if saved.persisted {
        "Story generated successfully".to_string()
    } else {
        "Story generated successfully (not persisted)".to_string()
    };
    info!(story_id = %story.id, words = story.word_count, persisted = saved.persisted, "story created");

    Ok(Json(StoryResponse { success: true, story, message: Some(message) }))
}

pub async fn create_story_from_image(
    Extension(state): Extension<StoriesState>,
    mut multipart: Multipart,
) -> Result<Json<StoryResponse>, AppError> {
    let mut image_bytes: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;
    let mut theme = "general".to_string();
    let mut length = "short".to_string();
    let mut tone = "creative".to_string();
    let mut image_description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::from((StatusCode::BAD_REQUEST, format!("multipart error: {}", e)))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let is_image = field
                    .content_type()
                    .map(|ct| ct.starts_with("image/"))
                    .unwrap_or(false);
                if !is_image {
                    return Err(AppError::new(
                        StatusCode::BAD_REQUEST,
                        "Please upload a valid image file",
                    )
                    .with_code("invalid_image"));
                }
                original_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    AppError::from((StatusCode::BAD_REQUEST, format!("multipart read error: {}", e)))
                })?;
                image_bytes = Some(data.to_vec());
            }
            "theme" => theme = or_default(field.text().await.ok(), "general"),
            "length" => length = or_default(field.text().await.ok(), "short"),
            "tone" => tone = or_default(field.text().await.ok(), "creative"),
            "image_description" => {
                image_description = field.text().await.ok().filter(|t| !t.trim().is_empty())
            }
            _ => {}
        }
    }

    let image_bytes = image_bytes.ok_or_else(|| {
        AppError::new(StatusCode::BAD_REQUEST, "Please upload a valid image file")
            .with_code("missing_image")
    })?;

    let filename = state
        .media
        .save_upload(original_name.as_deref(), &image_bytes)
        .await
        .map_err(|e| {
            AppError::from((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to store upload: {}", e),
            ))
        })?;

    let context = image_description.clone().unwrap_or_default();
    let draft = match state
        .generator
        .generate_from_image(&image_bytes, &theme, &length, &tone, &context)
        .await
    {
        Ok(draft) => draft,
        Err(e) => {
            // the upload only exists to feed this generation
            state.media.remove_upload(&filename).await;
            return Err(e.into());
        }
    };

    let story =
        Story::new_image(draft.title, draft.content, theme, tone, length, filename, image_description);
    let saved = store::upsert_best_effort(&state.store, &story).await;
    let message = if saved.persisted {
        "Story generated from image successfully".to_string()
    } else {
        "Story generated from image successfully (not persisted)".to_string()
    };
    info!(story_id = %story.id, words = story.word_count, "image story created");

    Ok(Json(StoryResponse { success: true, story, message: Some(message) }))
}

pub async fn list_stories(
    Extension(state): Extension<StoriesState>,
    Query(q): Query<ListQuery>,
) -> Json<StoriesListResponse> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = q.offset.unwrap_or(0);

    // listing is non-critical: a store failure degrades to an empty page
    match state.store.list(limit, offset).await {
        Ok((stories, total)) => Json(StoriesListResponse {
            success: true,
            stories,
            total,
            message: None,
        }),
        Err(e) => {
            warn!(error = %e, "listing degraded to empty result");
            Json(StoriesListResponse {
                success: true,
                stories: Vec::new(),
                total: 0,
                message: Some("Stories are temporarily unavailable".into()),
            })
        }
    }
}

pub async fn get_story(
    Extension(state): Extension<StoriesState>,
    Path(id): Path<String>,
) -> Result<Json<StoryResponse>, AppError> {
    let story = state
        .store
        .get(&id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Story not found").with_code("not_found"))?;
    Ok(Json(StoryResponse { success: true, story, message: None }))
}

pub async fn delete_story(
    Extension(state): Extension<StoriesState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let story = state
        .store
        .get(&id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Story not found").with_code("not_found"))?;

    // associated files go best-effort; failures are logged inside MediaStore
    let mut deleted_files = Vec::new();
    if let Some(name) = &story.image_filename {
        if state.media.remove_upload(name).await {
            deleted_files.push(format!("uploads/{}", name));
        }
    }
    if let Some(name) = story.generated_image.as_ref().and_then(|g| g.filename.as_ref()) {
        if state.media.remove_generated(name).await {
            deleted_files.push(format!("generated/{}", name));
        }
    }

    let key = store::delete_with_fallback(state.store.as_ref(), &story).await?;
    Ok(Json(DeleteResponse {
        success: true,
        deleted_files,
        message: Some(format!("Story deleted (partition key {})", key)),
    }))
}

pub async fn stats(Extension(state): Extension<StoriesState>) -> Json<StatsResponse> {
    // stats are non-critical: a store failure degrades to zeroes
    let stats = match state.store.stats().await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "stats degraded to zero result");
            Default::default()
        }
    };
    Json(StatsResponse {
        success: true,
        total: stats.total,
        text: stats.text,
        image: stats.image,
        avg_words: stats.avg_words(),
    })
}
