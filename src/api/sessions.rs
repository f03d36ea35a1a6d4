//! Session endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::error::{DaemonError, Result};
use crate::types::{Message, Session};

const DEFAULT_TITLE: &str = "New session";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", delete(delete_session))
        .route("/sessions/{id}/messages", get(list_messages))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<Session>> {
    let session = Session {
        id: Uuid::new_v4().to_string(),
        owner_id: req.owner_id,
        title: req
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        created_at: Utc::now(),
    };
    state.tasks().store().create_session(&session).await?;
    info!(session_id = %session.id, "session created");
    Ok(Json(session))
}

/// Deletes a session and its messages. Running generations for it fail
/// when they next check the session.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.tasks().store().delete_session(&id).await? {
        return Err(DaemonError::not_found(format!("session {}", id)));
    }
    info!(session_id = %id, "session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Conversation of a session, oldest message first.
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>> {
    let store = state.tasks().store();
    if !store.session_exists(&id).await? {
        return Err(DaemonError::not_found(format!("session {}", id)));
    }
    Ok(Json(store.list_messages(&id).await?))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{get, json_request, TestApp};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn create_then_delete() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(json_request("POST", "/api/sessions", json!({ "title": "Night drive" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Night drive");
        let id = body["id"].as_str().unwrap().to_string();

        let (status, _) = app.send(delete(&format!("/api/sessions/{id}"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = app.send(delete(&format!("/api/sessions/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn messages_of_a_session() {
        let app = TestApp::new().await;
        let (_, body) = app
            .send(json_request("POST", "/api/sessions", json!({})))
            .await;
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = app.send(get(&format!("/api/sessions/{id}/messages"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = app.send(get("/api/sessions/missing/messages")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_title_gets_default() {
        let app = TestApp::new().await;
        let (_, body) = app
            .send(json_request("POST", "/api/sessions", json!({ "title": "  " })))
            .await;
        assert_eq!(body["title"], "New session");
    }
}
