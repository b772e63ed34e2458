use axum::Router;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use vibestory_api::config::Config;
use vibestory_api::files::MediaStore;
use vibestory_api::kernel::{build_app, Plugin};
use vibestory_api::openai::{ImageGenerator, OpenAiClient, StoryGenerator};
use vibestory_api::plugins::health::HealthPlugin;
use vibestory_api::plugins::metrics::MetricsPlugin;
use vibestory_api::plugins::stories::handlers::StoriesState;
use vibestory_api::plugins::stories::StoriesPlugin;
use vibestory_api::store::{CosmosStore, DynStoryStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // load environment and build the dependency graph once
    dotenv().ok();
    let config = Config::from_env()?;
    info!(auth_mode = ?config.auth_mode, "configuration loaded");

    // one credential per resource, shared so its token cache is too
    let openai_credential = Arc::new(config.openai_credential()?);
    let openai_client = Arc::new(OpenAiClient::new(&config.openai, openai_credential.clone()));

    let store: DynStoryStore = match &config.cosmos {
        Some(cosmos) => Arc::new(CosmosStore::new(cosmos, Arc::new(config.cosmos_credential()?))),
        None => {
            warn!("COSMOS_DB_ENDPOINT not set; stories are kept in memory only");
            MemoryStore::new().into_arc()
        }
    };

    let media = MediaStore::new(&config.media_dir);
    media.ensure_dirs().await?;

    let state = StoriesState {
        store: store.clone(),
        generator: Arc::new(StoryGenerator::new(openai_client.clone())),
        illustrator: Arc::new(ImageGenerator::new(
            &config.openai,
            openai_credential,
            media.clone(),
        )),
        media,
    };

    let metrics_plugin = MetricsPlugin::new();
    let plugins_vec: Vec<Box<dyn Plugin>> = vec![
        Box::new(HealthPlugin::new(openai_client, store)),
        Box::new(StoriesPlugin::new(state)),
    ];

    let plugin_names: Vec<&'static str> = plugins_vec.iter().map(|p| p.name()).collect();
    info!("mounting plugins: {:?}", plugin_names);

    let mut app: Router = build_app(&plugins_vec, Some(metrics_plugin.clone())).await;

    // expose metrics at /metrics (not instrumented to avoid double-counting)
    app = app.nest("/metrics", metrics_plugin.router());

    for p in plugins_vec.iter() {
        info!("mounted plugin: {}", p.name());
    }

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            // call plugin shutdown hooks
            for p in plugins_vec.iter() {
                p.on_shutdown().await;
            }
        })
        .await?;

    Ok(())
}
