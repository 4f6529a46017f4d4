use crate::aggregator::HealthAggregator;
use crate::metrics::Metrics;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub aggregator: Arc<HealthAggregator>,
}

pub fn build_router(metrics: Arc<Metrics>, aggregator: Arc<HealthAggregator>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .with_state(HttpAppState {
            metrics,
            aggregator,
        })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn health_handler(State(state): State<HttpAppState>) -> Response {
    let computed = state.aggregator.compute().await;
    state.metrics.observe(&computed);
    let code = if computed.report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(computed.report)).into_response()
}

async fn status_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    Json(state.aggregator.service_status())
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    let computed = state.aggregator.compute().await;
    state.metrics.observe(&computed);
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => {
            error!(error = %err, "metrics encoding failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("metrics encoding failed: {err}"),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::testing::{aggregator, complete_fs, snapshot};
    use crate::collectors::fs::OsFileSystem;
    use crate::collectors::process::fake::{Canned, FakeLister};
    use crate::collectors::system::fake::FixedProbe;
    use crate::config::Config;
    use axum::body::to_bytes;
    use axum::http::Request;
    use std::path::Path;
    use tower::ServiceExt;

    fn app(running: Canned) -> Router {
        let metrics = Metrics::new().expect("metrics init");
        build_router(metrics, Arc::new(aggregator(Arc::new(complete_fs()), running)))
    }

    /// A real bot working directory on disk with every default path present.
    fn bot_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for f in ["bot.py", "Dockerfile", "requirements.txt", "keys.json", "bot_data.pkl"] {
            std::fs::write(dir.path().join(f), "x\n").unwrap();
        }
        for d in ["logs", "Generated_Results", "database", "backups", "temp"] {
            std::fs::create_dir(dir.path().join(d)).unwrap();
        }
        dir
    }

    fn disk_aggregator(root: &Path) -> Arc<HealthAggregator> {
        let cfg = Config {
            root: root.to_path_buf(),
            ..Config::default()
        };
        Arc::new(HealthAggregator::new(
            Arc::new(cfg),
            Arc::new(FakeLister(Canned::Running(true))),
            Arc::new(OsFileSystem),
            Arc::new(FixedProbe(snapshot())),
        ))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<HeaderValue>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (status, _, body) = get(app(Canned::Running(false)), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn health_is_200_json_when_healthy() {
        let (status, content_type, body) = get(app(Canned::Running(true)), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.unwrap(), "application/json");
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["bot_process"], "running");
    }

    #[tokio::test]
    async fn api_health_matches_health() {
        let (status, _, body) = get(app(Canned::Running(false)), "/api/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], "unhealthy");
        assert_eq!(value["error"], "Bot process is not running");
    }

    #[tokio::test]
    async fn api_status_returns_identity() {
        let (status, _, body) = get(app(Canned::Fails), "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], "online");
        assert_eq!(value["service"], "telegram-bot");
        assert_eq!(value["version"], "1.0.0");
        assert_eq!(value["bot"]["username"], "PremiumGeneratorBot");
    }

    #[tokio::test]
    async fn metrics_contains_health_status() {
        let (status, _, body) = get(app(Canned::Running(true)), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("botwatch_health_status 1"));
        assert!(body.contains("botwatch_scrape_count_total 1"));
    }

    #[tokio::test]
    async fn removing_critical_file_flips_to_503() {
        let dir = bot_dir();
        let metrics = Metrics::new().expect("metrics init");
        let app = build_router(metrics, disk_aggregator(dir.path()));

        let (status, _, _) = get(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);

        std::fs::remove_file(dir.path().join("Dockerfile")).unwrap();
        let (status, _, body) = get(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        let docker = value["checks"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == "Dockerfile")
            .unwrap();
        assert_eq!(docker["passed"], false);

        std::fs::write(dir.path().join("Dockerfile"), "FROM python:3.11\n").unwrap();
        let (status, _, _) = get(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn non_critical_removal_keeps_200() {
        let dir = bot_dir();
        std::fs::remove_file(dir.path().join("keys.json")).unwrap();
        std::fs::remove_dir(dir.path().join("temp")).unwrap();
        let metrics = Metrics::new().expect("metrics init");
        let (status, _, _) = get(build_router(metrics, disk_aggregator(dir.path())), "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn serves_over_real_socket() {
        let dir = bot_dir();
        let metrics = Metrics::new().expect("metrics init");
        let app = build_router(metrics, disk_aggregator(dir.path()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();
        let url = format!("http://{addr}/health");
        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);

        std::fs::remove_file(dir.path().join("bot.py")).unwrap();
        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 503);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Critical file missing: bot.py");

        server.abort();
    }
}
