use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::pipeline::ProcessResponse;
use crate::storage::VideoId;

use super::AppState;
use super::files::{not_found, serve_attachment};

const VIDEO_MP4: &str = "video/mp4";

#[derive(Debug, Deserialize)]
pub struct VideoRequest {
    pub id: String,
    pub url: String,
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ProcessResponse::error(message)),
    )
        .into_response()
}

/// Root endpoint: service description.
pub async fn index() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /process",
            "GET /download/{video_id}",
            "GET /tiktok/{video_id}",
            "GET /jobs",
        ],
    }))
}

/// In-flight jobs.
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "jobs": state.jobs.list() }))
}

/**
    Sniff, download and compress the video behind `url`.

    Pipeline failures are still answered with 200 and `status: "error"`;
    only malformed requests get a 4xx.
*/
pub async fn process_video(
    State(state): State<AppState>,
    Json(req): Json<VideoRequest>,
) -> Response {
    let id = match VideoId::parse(&req.id) {
        Ok(id) => id,
        Err(e) => return bad_request(e.to_string()),
    };

    if !(req.url.starts_with("http://") || req.url.starts_with("https://")) {
        return bad_request(format!("Unsupported URL: {}", req.url));
    }

    tracing::info!("[server] Process request for {}: {}", id, req.url);

    let job = {
        let pipeline = Arc::clone(&state.pipeline);
        let id = id.clone();
        let url = req.url.clone();
        async move { pipeline.process(&id, &url).await }
    };

    let response = state.jobs.submit(id, req.url, job).await;
    Json(response).into_response()
}

/// Processed output download.
pub async fn download_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Response {
    let Ok(id) = VideoId::parse(&video_id) else {
        return not_found();
    };
    let path = state.pipeline.store().output_path(&id);
    serve_attachment(&path, VIDEO_MP4, &id.output_file_name()).await
}

/// Tiktok variant download.
pub async fn tiktok_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Response {
    let Ok(id) = VideoId::parse(&video_id) else {
        return not_found();
    };
    let path = state.pipeline.store().tiktok_path(&id);
    serve_attachment(&path, VIDEO_MP4, &id.tiktok_file_name()).await
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, header},
    };
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::jobs::JobStore;
    use crate::pipeline::Pipeline;

    use super::super::{AppState, router};
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        app: Router,
        state: AppState,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.downloads_dir = dir.path().join("downloads");
        config.storage.temp_dir = dir.path().join("temp");
        config.storage.tiktok_dir = dir.path().join("tiktok");

        let state = AppState {
            pipeline: Arc::new(Pipeline::new(&config)),
            jobs: Arc::new(JobStore::new(1)),
        };
        state.pipeline.store().ensure_dirs().await.unwrap();

        Fixture {
            _dir: dir,
            app: router(state.clone()),
            state,
        }
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Body) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_download_existing() {
        let fx = fixture().await;
        let id = VideoId::parse("match1").unwrap();
        tokio::fs::write(fx.state.pipeline.store().output_path(&id), b"mp4data")
            .await
            .unwrap();

        let response = send(&fx.app, Method::GET, "/download/match1", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"match1_futebol.mp4\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"mp4data");
    }

    #[tokio::test]
    async fn test_head_download() {
        let fx = fixture().await;
        let id = VideoId::parse("match2").unwrap();
        tokio::fs::write(fx.state.pipeline.store().output_path(&id), b"12345")
            .await
            .unwrap();

        let response = send(&fx.app, Method::HEAD, "/download/match2", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
    }

    #[tokio::test]
    async fn test_download_missing() {
        let fx = fixture().await;
        let response = send(&fx.app, Method::GET, "/download/nothing", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "File not found" })
        );
    }

    #[tokio::test]
    async fn test_download_rejects_traversal() {
        let fx = fixture().await;
        let response = send(
            &fx.app,
            Method::GET,
            "/download/..%2F..%2Fetc%2Fpasswd",
            Body::empty(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tiktok_download() {
        let fx = fixture().await;
        let id = VideoId::parse("clip9").unwrap();
        tokio::fs::write(fx.state.pipeline.store().tiktok_path(&id), b"tt")
            .await
            .unwrap();

        let response = send(&fx.app, Method::GET, "/tiktok/clip9", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"tiktok_clip9_futebol.mp4\""
        );

        // Processed output with the same id is a different file
        let response = send(&fx.app, Method::GET, "/download/clip9", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_process_invalid_id() {
        let fx = fixture().await;
        let body = Body::from(r#"{"id": "../x", "url": "https://example.com"}"#);
        let response = send(&fx.app, Method::POST, "/process", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn test_process_invalid_url() {
        let fx = fixture().await;
        let body = Body::from(r#"{"id": "ok", "url": "file:///etc/passwd"}"#);
        let response = send(&fx.app, Method::POST, "/process", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "status": "error", "message": "Unsupported URL: file:///etc/passwd" })
        );
    }

    #[tokio::test]
    async fn test_process_malformed_body() {
        let fx = fixture().await;
        let response = send(&fx.app, Method::POST, "/process", Body::from(r#"{"id": 1}"#)).await;
        assert!(response.status().is_client_error());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_requests_traced_at_info() {
        let fx = fixture().await;
        let captured = Captured::default();
        let subscriber = {
            let captured = captured.clone();
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::INFO)
                .with_ansi(false)
                .with_writer(move || captured.clone())
                .finish()
        };
        let _guard = tracing::subscriber::set_default(subscriber);

        let response = send(&fx.app, Method::GET, "/download/absent", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let logs = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert!(logs.contains("finished processing request"), "{logs}");
        assert!(logs.contains("/download/absent"), "{logs}");
    }

    #[tokio::test]
    async fn test_index_and_jobs() {
        let fx = fixture().await;
        let response = send(&fx.app, Method::GET, "/", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["name"], "vidfetch");

        let response = send(&fx.app, Method::GET, "/jobs", Body::empty()).await;
        assert_eq!(body_json(response).await, json!({ "jobs": [] }));
    }
}
