use crate::kernel::Plugin;
use crate::plugins::stories::handlers::*;
use axum::extract::DefaultBodyLimit;
use axum::{routing::delete, routing::get, routing::post, Extension, Router};

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub struct StoriesPlugin {
    pub state: StoriesState,
}

impl StoriesPlugin {
    pub fn new(state: StoriesState) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl Plugin for StoriesPlugin {
    async fn router(&self) -> Router {
        Router::new()
            .route("/", post(create_story))
            .route("/", get(list_stories))
            .route("/image", post(create_story_from_image))
            .route("/stats", get(stats))
            .route("/:id", get(get_story))
            .route("/:id", delete(delete_story))
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
            .layer(Extension(self.state.clone()))
    }

    fn name(&self) -> &'static str {
        "api/stories"
    }
}
