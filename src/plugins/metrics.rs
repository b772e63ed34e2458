use axum::extract::Request;
use axum::middleware::Next;
use axum::{routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct MetricsPlugin {
    registry: Arc<Registry>,
    pub request_counter: Arc<IntCounterVec>,
    pub request_duration: Arc<HistogramVec>,
}

impl MetricsPlugin {
    pub fn new() -> Self {
        let registry = Registry::new();
        let ctr_opts = Opts::new("requests_total", "Total HTTP requests");
        let counter = IntCounterVec::new(ctr_opts, &["method", "path", "status"]).expect("counter");
        registry.register(Box::new(counter.clone())).ok();

        let hist_opts =
            HistogramOpts::new("request_duration_seconds", "HTTP request latencies in seconds");
        let histogram = HistogramVec::new(hist_opts, &["method", "path"]).expect("histogram");
        registry.register(Box::new(histogram.clone())).ok();

        #[cfg(target_os = "linux")]
        {
            let collector = prometheus::process_collector::ProcessCollector::for_self();
            registry.register(Box::new(collector)).ok();
        }

        MetricsPlugin {
            registry: Arc::new(registry),
            request_counter: Arc::new(counter),
            request_duration: Arc::new(histogram),
        }
    }

    /// Wraps a plugin router so its requests are counted and timed under the
    /// plugin name.
    pub fn instrument(&self, router: Router, path: &'static str) -> Router {
        let counter = self.request_counter.clone();
        let histogram = self.request_duration.clone();
        router.layer(axum::middleware::from_fn(move |req: Request, next: Next| {
            let counter = counter.clone();
            let histogram = histogram.clone();
            async move {
                let method = req.method().to_string();
                let timer = histogram.with_label_values(&[&method, path]).start_timer();
                let response = next.run(req).await;
                timer.observe_duration();
                counter
                    .with_label_values(&[&method, path, response.status().as_str()])
                    .inc();
                response
            }
        }))
    }

    pub fn router(&self) -> Router {
        let reg = self.registry.clone();
        Router::new().route(
            "/",
            get(move || {
                let encoder = TextEncoder::new();
                let metric_families = reg.gather();
                let mut buffer = Vec::new();
                let body = match encoder.encode(&metric_families, &mut buffer) {
                    Ok(()) => String::from_utf8_lossy(&buffer).into_owned(),
                    Err(e) => format!("# encoding error: {}\n", e),
                };
                async move { (axum::http::StatusCode::OK, body) }
            }),
        )
    }
}

impl Default for MetricsPlugin {
    fn default() -> Self {
        Self::new()
    }
}
