use crate::kernel::Plugin;
use crate::openai::OpenAiClient;
use crate::store::DynStoryStore;
use axum::{routing::get, Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    timestamp: DateTime<Utc>,
    services: BTreeMap<&'static str, &'static str>,
}

#[derive(Clone)]
struct HealthState {
    openai: Arc<OpenAiClient>,
    store: DynStoryStore,
}

pub struct HealthPlugin {
    state: HealthState,
}

impl HealthPlugin {
    pub fn new(openai: Arc<OpenAiClient>, store: DynStoryStore) -> Self {
        Self { state: HealthState { openai, store } }
    }
}

/// Each dependency is probed independently so a single outage is visible as
/// such rather than as a blanket failure.
async fn health_handler(Extension(state): Extension<HealthState>) -> Json<Health> {
    let openai_ok = state.openai.check_connection().await;
    let store_ok = state.store.check_connection().await;

    let mut services = BTreeMap::new();
    services.insert("azure_openai", if openai_ok { "healthy" } else { "unhealthy" });
    services.insert("cosmos_db", if store_ok { "healthy" } else { "unhealthy" });

    Json(Health {
        status: if openai_ok && store_ok { "healthy" } else { "unhealthy" },
        timestamp: Utc::now(),
        services,
    })
}

#[async_trait::async_trait]
impl Plugin for HealthPlugin {
    async fn router(&self) -> Router {
        Router::new()
            .route("/", get(health_handler))
            .layer(Extension(self.state.clone()))
    }

    fn name(&self) -> &'static str {
        "health"
    }

    async fn on_start(&self) {
        tracing::info!("health plugin started");
    }
}
