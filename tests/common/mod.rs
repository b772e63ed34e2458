#![allow(dead_code)]

use std::sync::Arc;

use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vibestory_api::config::OpenAiConfig;
use vibestory_api::auth::Credential;
use vibestory_api::files::MediaStore;
use vibestory_api::kernel::{build_app, Plugin};
use vibestory_api::openai::{ImageGenerator, OpenAiClient, StoryGenerator};
use vibestory_api::plugins::health::HealthPlugin;
use vibestory_api::plugins::stories::handlers::StoriesState;
use vibestory_api::plugins::stories::StoriesPlugin;
use vibestory_api::store::{DynStoryStore, MemoryStore};

pub const DEPLOYMENT: &str = "gpt-4o";
pub const DALLE_DEPLOYMENT: &str = "dall-e-3";

pub struct TestApp {
    pub base: String,
    pub server_handle: tokio::task::JoinHandle<()>,
    pub mock: MockServer,
    pub store: Arc<MemoryStore>,
    pub media: MediaStore,
    _media_dir: tempfile::TempDir,
}

pub fn chat_path() -> String {
    format!("/openai/deployments/{}/chat/completions", DEPLOYMENT)
}

pub fn images_path() -> String {
    format!("/openai/deployments/{}/images/generations", DALLE_DEPLOYMENT)
}

/// Response body in the shape the completions endpoint returns.
pub fn chat_completion_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [
            { "message": { "role": "assistant", "content": content } }
        ]
    })
}

/// Mounts a catch-all completion mock returning `content`.
pub async fn mock_chat(mock: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path(chat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body(content)))
        .mount(mock)
        .await;
}

pub async fn spawn_app_with_plugins(
    plugins: Vec<Box<dyn Plugin>>,
) -> anyhow::Result<(String, tokio::task::JoinHandle<()>)> {
    let app = build_app(&plugins, None).await;
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server error");
    });
    Ok((format!("http://{}", addr), server_handle))
}

/// Spawns the full app against a wiremock model API and an in-memory store.
pub async fn spawn_story_app(store: MemoryStore) -> anyhow::Result<TestApp> {
    let mock = MockServer::start().await;
    let openai = OpenAiConfig {
        endpoint: mock.uri(),
        deployment: DEPLOYMENT.into(),
        dalle_deployment: DALLE_DEPLOYMENT.into(),
        api_version: "2024-02-01".into(),
    };
    let credential = Arc::new(Credential::ApiKey("test-key".into()));

    let media_dir = tempfile::tempdir()?;
    let media = MediaStore::new(media_dir.path());
    media.ensure_dirs().await?;

    let store = store.into_arc();
    let dyn_store: DynStoryStore = store.clone();

    let client = Arc::new(OpenAiClient::new(&openai, credential.clone()));
    let state = StoriesState {
        store: dyn_store.clone(),
        generator: Arc::new(StoryGenerator::new(client.clone())),
        illustrator: Arc::new(ImageGenerator::new(&openai, credential, media.clone())),
        media: media.clone(),
    };

    let plugins: Vec<Box<dyn Plugin>> = vec![
        Box::new(HealthPlugin::new(client, dyn_store)),
        Box::new(StoriesPlugin::new(state)),
    ];
    let (base, server_handle) = spawn_app_with_plugins(plugins).await?;

    Ok(TestApp { base, server_handle, mock, store, media, _media_dir: media_dir })
}
