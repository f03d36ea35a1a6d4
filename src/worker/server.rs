//! HTTP surface of the job worker.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::debug;

use super::registry::{JobRegistry, ReferenceAudio};
use crate::error::{DaemonError, Result};
use crate::types::{AudioFormat, GenerationRequest, JobStatus, JobView};

/// Largest accepted request body (reference audio included).
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Builds the worker router.
pub fn router(registry: Arc<JobRegistry>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/jobs", post(submit_job))
        .route("/v1/jobs/with-audio", post(submit_job_with_audio))
        .route("/v1/jobs/{job_id}", get(job_status))
        .route("/v1/jobs/{job_id}/audio", get(job_audio))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

async fn health(State(registry): State<Arc<JobRegistry>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "jobs": registry.len(),
        "slots": registry.slot_count(),
        "availableSlots": registry.available_slots(),
    }))
}

fn accepted(view: JobView) -> Json<Value> {
    Json(json!({ "jobId": view.job_id, "status": view.status }))
}

async fn submit_job(
    State(registry): State<Arc<JobRegistry>>,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<Value>> {
    let view = registry.submit(request, None).await?;
    Ok(accepted(view))
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(DaemonError::validation(format!("invalid boolean: {}", other))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DaemonError::validation(format!("invalid {}: {}", name, value)))
}

/// Applies one text form field to the request. Unknown fields are ignored.
fn apply_form_field(request: &mut GenerationRequest, name: &str, value: String) -> Result<()> {
    let blank = value.trim().is_empty();
    match name {
        "prompt" => request.prompt = value,
        "style" => request.style = (!blank).then_some(value),
        "lyrics" => request.lyrics = (!blank).then_some(value),
        "durationSec" => request.duration_sec = parse_number("durationSec", &value)?,
        "seed" if blank => request.seed = None,
        "seed" => request.seed = Some(parse_number("seed", &value)?),
        "format" => {
            request.format = AudioFormat::from_extension(value.trim())
                .ok_or_else(|| DaemonError::validation(format!("unsupported format: {}", value)))?
        }
        "separate" => request.separate = parse_flag(&value)?,
        "instrumental" => request.instrumental = parse_flag(&value)?,
        "vocalOnly" => request.vocal_only = parse_flag(&value)?,
        other => debug!(field = other, "ignoring unknown form field"),
    }
    Ok(())
}

async fn submit_job_with_audio(
    State(registry): State<Arc<JobRegistry>>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let mut request = GenerationRequest::new("", 30);
    let mut reference = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DaemonError::validation(format!("failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "promptAudio" {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| DaemonError::validation(format!("failed to read promptAudio: {}", e)))?;
            debug!(size_bytes = bytes.len(), "received reference audio");
            reference = Some(ReferenceAudio {
                file_name,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| DaemonError::validation(format!("failed to read {}: {}", name, e)))?;
            apply_form_field(&mut request, &name, value)?;
        }
    }

    let view = registry.submit(request, reference).await?;
    Ok(accepted(view))
}

async fn job_status(
    State(registry): State<Arc<JobRegistry>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>> {
    Ok(Json(registry.view(&job_id)?))
}

async fn job_audio(
    State(registry): State<Arc<JobRegistry>>,
    Path(job_id): Path<String>,
) -> Result<Response> {
    let job = registry
        .get(&job_id)
        .ok_or_else(|| DaemonError::not_found(format!("job {}", job_id)))?;
    if job.status != JobStatus::Succeeded {
        return Err(DaemonError::conflict(format!(
            "job {} is {}, audio not available",
            job_id, job.status
        )));
    }
    let path = job
        .audio_path
        .ok_or_else(|| DaemonError::not_found("audio file"))?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DaemonError::not_found("audio file"))
        }
        Err(e) => return Err(e.into()),
    };

    let content_type = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(AudioFormat::from_extension)
        .map(|f| f.mime_type())
        .unwrap_or("application/octet-stream");
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| job_id.clone());

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::worker::runner::JobRunner;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const WRITE_MIX: &str = "mkdir -p \"$3/audios\" && printf RIFF > \"$3/audios/out_bgm.wav\"";

    fn setup(command: &str) -> (TempDir, Arc<JobRegistry>) {
        let dir = tempdir().unwrap();
        let config = WorkerConfig {
            generate_command: vec!["sh".into(), "-c".into(), command.into(), "gen".into()],
            extra_args: Vec::new(),
            trim_to_duration: false,
            fade_out: false,
            ..WorkerConfig::default()
        };
        let registry = Arc::new(JobRegistry::new(
            JobRunner::new(Arc::new(config)),
            dir.path().to_path_buf(),
            1,
        ));
        (dir, registry)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn wait_terminal(registry: &JobRegistry, id: &str) {
        for _ in 0..200 {
            if registry.get(id).unwrap().status.is_terminal() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job did not finish");
    }

    #[tokio::test]
    async fn submit_poll_download() {
        let (_dir, registry) = setup(WRITE_MIX);
        let app = router(Arc::clone(&registry));

        let (status, body) = send(
            app.clone(),
            json_post("/v1/jobs", json!({ "prompt": "lofi", "durationSec": 10, "format": "wav" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "queued");
        let job_id = value["jobId"].as_str().unwrap().to_string();

        wait_terminal(&registry, &job_id).await;

        let (status, body) = send(
            app.clone(),
            Request::get(format!("/v1/jobs/{}", job_id)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let view: JobView = serde_json::from_slice(&body).unwrap();
        assert_eq!(view.status, JobStatus::Succeeded);

        let response = app
            .oneshot(
                Request::get(format!("/v1/jobs/{}/audio", job_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"RIFF");
    }

    #[tokio::test]
    async fn conflicting_flags_are_rejected() {
        let (dir, registry) = setup(WRITE_MIX);
        let (status, body) = send(
            router(registry),
            json_post("/v1/jobs", json!({ "prompt": "x", "instrumental": true, "vocalOnly": true })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["code"], "VALIDATION");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unknown_job_is_404() {
        let (_dir, registry) = setup(WRITE_MIX);
        let app = router(registry);
        let (status, _) = send(
            app.clone(),
            Request::get("/v1/jobs/missing").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            app,
            Request::get("/v1/jobs/missing/audio").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn audio_of_unfinished_job_is_conflict() {
        let (_dir, registry) = setup(&format!("sleep 2; {}", WRITE_MIX));
        let app = router(Arc::clone(&registry));
        let (_, body) = send(app.clone(), json_post("/v1/jobs", json!({ "prompt": "x" }))).await;
        let value: Value = serde_json::from_slice(&body).unwrap();
        let job_id = value["jobId"].as_str().unwrap();

        let (status, _) = send(
            app,
            Request::get(format!("/v1/jobs/{}/audio", job_id)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn multipart_submission_saves_reference() {
        let (dir, registry) = setup(WRITE_MIX);
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"prompt\"\r\n\r\nhumming\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"durationSec\"\r\n\r\n12\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"format\"\r\n\r\nwav\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"promptAudio\"; filename=\"ref.wav\"\r\n\
             Content-Type: audio/wav\r\n\r\nRIFFDATA\r\n\
             --{b}--\r\n",
            b = boundary
        );
        let request = Request::post("/v1/jobs/with-audio")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, body) = send(router(Arc::clone(&registry)), request).await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_slice(&body).unwrap();
        let job_id = value["jobId"].as_str().unwrap();

        let job = registry.get(job_id).unwrap();
        assert_eq!(job.request.duration_sec, 12);
        assert_eq!(job.request.prompt, "humming");
        let saved = dir.path().join(job_id).join("prompt_audio.wav");
        assert_eq!(std::fs::read(saved).unwrap(), b"RIFFDATA");
    }

    #[test]
    fn form_fields_parse() {
        let mut request = GenerationRequest::new("", 30);
        apply_form_field(&mut request, "instrumental", "false".into()).unwrap();
        apply_form_field(&mut request, "vocalOnly", "1".into()).unwrap();
        apply_form_field(&mut request, "seed", "42".into()).unwrap();
        apply_form_field(&mut request, "style", "  ".into()).unwrap();
        apply_form_field(&mut request, "unknown", "x".into()).unwrap();
        assert!(!request.instrumental);
        assert!(request.vocal_only);
        assert_eq!(request.seed, Some(42));
        assert!(request.style.is_none());
        assert!(apply_form_field(&mut request, "durationSec", "long".into()).is_err());
    }

    #[tokio::test]
    async fn health_reports_slots() {
        let (_dir, registry) = setup(WRITE_MIX);
        let (status, body) = send(
            router(registry),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["slots"], 1);
    }
}
