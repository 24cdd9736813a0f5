//! HTTP 接口（axum）
//!
//! - GET  /                         问候语
//! - POST /command                  {key, query, files} -> {response, files}
//! - POST /upload                   multipart 字段 files -> {urls}（workspace 相对路径，可作文件引用）
//! - POST /api/execute/async        {prompt, session, files} -> {id}
//! - GET  /api/execute/async/:id    {status, result, info}
//! - GET  /static/*                 已上传的产物
//! - GET  /api/health               健康检查

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::services::ServeDir;

use crate::agent::{AgentService, CommandRequest, CommandResponse};
use crate::core::AgentError;
use crate::execution::{spawn_execution, ExecutionRecord, ExecutionStore};
use crate::files::save_upload;

/// 单次 multipart 上传的大小上限
const UPLOAD_LIMIT_BYTES: usize = 32 * 1024 * 1024;

pub struct AppState {
    pub bot_name: String,
    pub service: Arc<AgentService>,
    pub executions: ExecutionStore,
    pub workspace: PathBuf,
    pub static_dir: PathBuf,
}

/// AgentError -> HTTP 状态码：文件引用问题为 400，其余 500
pub struct ApiError(AgentError);

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AgentError::UnsupportedFileType(_) | AgentError::FileFetch(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(status = %status, kind = self.0.kind(), error = %self.0, "request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// POST /api/execute/async 请求体
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub prompt: String,
    pub session: String,
    #[serde(default)]
    pub files: Vec<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    Router::new()
        .route("/", get(index))
        .route("/command", post(command))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/api/execute/async", post(execute_async))
        .route("/api/execute/async/:id", get(execution_status))
        .route("/api/health", get(|| async { "OK" }))
        .nest_service("/static", static_files)
        .with_state(state)
}

async fn index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "message": format!("Hello World. I'm {}.", state.bot_name) }))
}

async fn command(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    Ok(Json(state.service.handle_command(&req).await?))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut urls = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AgentError::FileFetch(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AgentError::FileFetch(format!("{}: {}", file_name, e)))?;
        urls.push(save_upload(&state.workspace, &file_name, &bytes).await?);
    }
    Ok(Json(json!({ "urls": urls })))
}

async fn execute_async(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Json<serde_json::Value> {
    let command = CommandRequest {
        key: req.session,
        query: req.prompt,
        files: req.files,
    };
    let id = spawn_execution(state.service.clone(), state.executions.clone(), command);
    Json(json!({ "id": id }))
}

async fn execution_status(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> Result<Json<ExecutionRecord>, StatusCode> {
    state.executions.get(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::llm::MockLlmClient;

    fn app(dir: &Path) -> Router {
        let mut cfg = AppConfig::default();
        cfg.app.workspace_root = Some(dir.to_path_buf());
        let service = AgentService::from_config(&cfg, Arc::new(MockLlmClient)).unwrap();
        router(Arc::new(AppState {
            bot_name: "EVAL".to_string(),
            service: Arc::new(service),
            executions: ExecutionStore::new(100, 60),
            workspace: dir.to_path_buf(),
            static_dir: dir.to_path_buf(),
        }))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn greeting_names_the_bot() {
        let dir = tempfile::tempdir().unwrap();
        let resp = app(dir.path())
            .oneshot(get_req("/"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["message"], "Hello World. I'm EVAL.");
    }

    #[tokio::test]
    async fn command_round_trips_through_mock_llm() {
        let dir = tempfile::tempdir().unwrap();
        let req = post_json("/command", r#"{"key": "s1", "query": "hello", "files": []}"#);
        let resp = app(dir.path()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["response"], "Echo from Mock: hello");
        assert_eq!(body["files"], json!([]));
    }

    #[tokio::test]
    async fn unsupported_file_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let req = post_json("/command", r#"{"key": "s1", "query": "read", "files": ["notes.txt"]}"#);
        let resp = app(dir.path()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"].as_str().unwrap().contains("notes.txt"));
    }

    #[tokio::test]
    async fn static_files_are_served_by_name_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.png"), &b"png"[..]).unwrap();
        let router = app(dir.path());

        let resp = router
            .clone()
            .oneshot(get_req("/static/out.png"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");

        let resp = router
            .oneshot(get_req("/static/..%2Fsecret"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    fn multipart(parts: &[(&str, &str, &[u8])]) -> Request<Body> {
        let boundary = "eval-boundary";
        let mut body = Vec::new();
        for (field, file_name, bytes) in parts {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_saves_files_by_type() {
        let dir = tempfile::tempdir().unwrap();
        let req = multipart(&[
            ("files", "cat.png", &b"png"[..]),
            ("other", "ignored.csv", &b"x"[..]),
            ("files", "wines.csv", &b"a,b\n1,2\n"[..]),
        ]);
        let resp = app(dir.path()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        let urls: Vec<String> = serde_json::from_value(body["urls"].clone()).unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].starts_with("image/") && urls[0].ends_with(".png"));
        assert!(urls[1].starts_with("dataframe/") && urls[1].ends_with(".csv"));
        assert_eq!(std::fs::read(dir.path().join(&urls[0])).unwrap(), &b"png"[..]);
    }

    #[tokio::test]
    async fn upload_rejects_unsupported_type() {
        let dir = tempfile::tempdir().unwrap();
        let resp = app(dir.path())
            .oneshot(multipart(&[("files", "notes.txt", &b"x"[..])]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn async_execution_is_polled_to_success() {
        let dir = tempfile::tempdir().unwrap();
        let router = app(dir.path());

        let resp = router
            .clone()
            .oneshot(post_json(
                "/api/execute/async",
                r#"{"prompt": "hello", "session": "s1", "files": []}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let id = body_json(resp).await["id"].as_str().unwrap().to_string();

        let mut last = serde_json::Value::Null;
        for _ in 0..200 {
            let resp = router
                .clone()
                .oneshot(get_req(&format!("/api/execute/async/{id}")))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            last = body_json(resp).await;
            if last["status"] == "SUCCESS" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(last["status"], "SUCCESS");
        assert_eq!(last["result"]["answer"], "Echo from Mock: hello");
        assert_eq!(last["result"]["files"], json!([]));
        assert_eq!(last["info"]["action"], "Final Answer");
        assert_eq!(last["info"]["index"], 1);
    }

    #[tokio::test]
    async fn unknown_execution_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let resp = app(dir.path())
            .oneshot(get_req("/api/execute/async/does-not-exist"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
