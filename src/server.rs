//! HTTP façade over the agent CLI.
//!
//! `GET /healthz` answers `{"ok":true}`. `POST /claude` runs one prompt and
//! relays the agent's JSON output; with `"verbose": true` the event stream is
//! rendered to this process's console while the request runs.

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::claude::client::{self, AgentRequest};
use crate::config::Config;
use crate::output::{formatter, logger};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
}

/// Body of `POST /claude`.
#[derive(Debug, Deserialize)]
pub struct ClaudeRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Stream and render events instead of a one-shot JSON run.
    #[serde(default)]
    pub verbose: bool,
}

/// Build the router with its state attached.
pub fn router(config: Config) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/claude", post(claude_handler))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;
    tracing::info!(agent = %config.agent, "starting relay on {}", addr);

    let app = router(config);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn claude_handler(
    State(state): State<AppState>,
    payload: Result<Json<ClaudeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let prompt = body.prompt.unwrap_or_default();
    if prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt is required".to_string()));
    }

    let request = AgentRequest {
        prompt,
        args: body.args,
        cwd: body.cwd,
    };
    let verbose = body.verbose;
    tracing::info!(verbose, args = request.args.len(), "POST /claude");

    let config = Arc::clone(&state.config);
    let reply = tokio::task::spawn_blocking(move || run_agent(&config, &request, verbose))
        .await
        .map_err(|e| ApiError::Internal(format!("agent task failed: {}", e)))??;

    Ok(([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], reply).into_response())
}

/// Run the agent to completion and return the response body.
fn run_agent(config: &Config, request: &AgentRequest, verbose: bool) -> Result<String, ApiError> {
    if !verbose {
        let output = client::run_json(&config.agent, &config.extra_args, request)
            .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;
        if !output.success() {
            return Err(ApiError::Agent {
                code: output.code,
                stderr: output.stderr,
            });
        }
        return Ok(output.stdout);
    }

    let mut raw_log = logger::open_run_log(config.raw_log);

    let outcome = client::run_streaming(
        &config.agent,
        &config.extra_args,
        request,
        raw_log.as_mut(),
        formatter::print_rendered,
    )
    .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;

    if !outcome.success() {
        return Err(ApiError::Agent {
            code: outcome.code,
            stderr: outcome.stderr,
        });
    }
    outcome.result_line.ok_or(ApiError::NoResult {
        stderr: outcome.stderr,
    })
}

/// Errors returned to HTTP clients.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    /// The agent ran but exited unsuccessfully.
    Agent { code: Option<i32>, stderr: String },
    /// A verbose run finished without a `result` event.
    NoResult { stderr: String },
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Agent { code, stderr } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "claude failed", "code": code, "stderr": stderr }),
            ),
            ApiError::NoResult { stderr } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "claude produced no result", "stderr": stderr }),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
        };

        tracing::error!("request failed: {} - {}", status, body);

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn state(agent: &str) -> AppState {
        AppState {
            config: Arc::new(Config {
                bind: "127.0.0.1".to_string(),
                port: 0,
                agent: agent.to_string(),
                extra_args: Vec::new(),
                log_level: "info".to_string(),
                raw_log: false,
                project_root: None,
            }),
        }
    }

    fn request(prompt: &str, verbose: bool) -> ClaudeRequest {
        ClaudeRequest {
            prompt: Some(prompt.to_string()),
            args: Vec::new(),
            cwd: None,
            verbose,
        }
    }

    async fn call(state: AppState, body: ClaudeRequest) -> (StatusCode, Option<String>, String) {
        let response = match claude_handler(State(state), Ok(Json(body))).await {
            Ok(r) => r,
            Err(e) => e.into_response(),
        };
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let Json(body) = healthz().await;
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn missing_prompt_is_bad_request() {
        let body = ClaudeRequest {
            prompt: None,
            args: Vec::new(),
            cwd: None,
            verbose: false,
        };
        let (status, _, text) = call(state("claude"), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["error"], "prompt is required");
    }

    #[tokio::test]
    async fn blank_prompt_is_bad_request() {
        let (status, _, _) = call(state("claude"), request("   ", false)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn spawn_failure_is_internal_error() {
        let (status, _, text) = call(state("definitely-not-a-real-agent-binary"), request("hi", false)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = serde_json::from_str(&text).unwrap();
        assert!(json["error"].as_str().unwrap().contains("Failed to spawn"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_relays_stdout_verbatim() {
        let agent = r#"sh -c 'echo "{\"result\":\"hi\"}"' relay"#;
        let (status, content_type, text) = call(state(agent), request("hi", false)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(JSON_CONTENT_TYPE));
        assert_eq!(text, "{\"result\":\"hi\"}\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_reports_code_and_stderr() {
        let agent = "sh -c 'echo boom >&2; exit 2' relay";
        let (status, _, text) = call(state(agent), request("hi", false)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["error"], "claude failed");
        assert_eq!(json["code"], 2);
        assert_eq!(json["stderr"], "boom\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn verbose_returns_final_result_event() {
        let agent = r#"sh -c 'echo "{\"type\":\"assistant\",\"message\":{\"content\":[]}}"; echo "{\"type\":\"result\",\"result\":\"done\"}"' relay"#;
        let (status, _, text) = call(state(agent), request("hi", true)).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["result"], "done");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn verbose_without_result_is_error() {
        let (status, _, text) = call(state("sh -c 'echo not-json' relay"), request("hi", true)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["error"], "claude produced no result");
    }

    #[test]
    fn request_body_defaults() {
        let body: ClaudeRequest = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(body.prompt.as_deref(), Some("hi"));
        assert!(body.args.is_empty());
        assert!(body.cwd.is_none());
        assert!(!body.verbose);
    }
}
