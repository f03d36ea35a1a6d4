//! Task-facing HTTP API.
//!
//! Routes:
//! - `/api/sessions`: create and delete conversations
//! - `/api/music/generate`: submit a generation and poll it
//! - `/api/tasks`: generic task records
//! - `/health` and `/static/*` for stored artifacts

pub mod music;
pub mod sessions;
pub mod tasks;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::orchestrator::Pipeline;
use crate::tasks::TaskRegistry;

/// Shared state of the task API.
pub struct AppState {
    pub pipeline: Pipeline,
    /// Idle time after which a processing generation task is failed on read.
    pub stale_after: Duration,
    /// Duration used when a generation request omits one.
    pub default_duration_sec: u32,
}

impl AppState {
    pub fn tasks(&self) -> &TaskRegistry {
        self.pipeline.tasks()
    }
}

/// Builds the API router, serving artifacts from `static_dir` under `/static`.
pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    let api = Router::new()
        .merge(sessions::router())
        .merge(music::router())
        .merge(tasks::router());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let storage = match state.tasks().store().ping().await {
        Ok(()) => "ok",
        Err(_) => "unavailable",
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "storage": storage,
    }))
}


#[cfg(test)]
mod tests {
    use super::test_support::{get, TestApp};
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_storage() {
        let app = TestApp::new().await;
        let (status, body) = app.send(get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"], "ok");
    }

    #[tokio::test]
    async fn static_files_are_served() {
        let app = TestApp::new().await;
        let generated = app.static_dir.path().join("generated");
        std::fs::create_dir_all(&generated).unwrap();
        std::fs::write(generated.join("a.wav"), b"RIFF").unwrap();

        let response = app
            .router()
            .oneshot(get("/static/generated/a.wav"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"RIFF");

        let (status, _) = app.send(get("/static/generated/missing.wav")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
