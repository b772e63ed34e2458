use crate::plugins::metrics::MetricsPlugin;
use async_trait::async_trait;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[async_trait]
pub trait Plugin: Send + Sync {
    async fn router(&self) -> Router;

    fn name(&self) -> &'static str;
    /// Optional lifecycle hook called when the kernel starts.
    async fn on_start(&self) {}
    /// Optional lifecycle hook called on shutdown.
    async fn on_shutdown(&self) {}
}

/// Builds the application router by mounting each plugin under `/{plugin.name()}`.
///
/// When a metrics plugin is supplied, every plugin router is wrapped so that
/// request counts and latencies are recorded with the plugin name as the path
/// label.
pub async fn build_app(plugins: &Vec<Box<dyn Plugin>>, metrics: Option<MetricsPlugin>) -> Router {
    let mut app = Router::new();

    for plugin in plugins.iter() {
        info!("starting plugin {}", plugin.name());
        plugin.on_start().await;
        let mut router = plugin.router().await;
        if let Some(m) = metrics.as_ref() {
            router = m.instrument(router, plugin.name());
        }
        // mount plugin under its name to namespace routes
        app = app.nest(&format!("/{}", plugin.name()), router);
    }

    // permissive CORS for local dev; the UI is served from a different origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.layer(cors)
}
