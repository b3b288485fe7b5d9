//! In-process upstreams for the integration tests.

#![allow(dead_code)]

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Image endpoint stand-in. Records every decoded prompt and query.
#[derive(Clone, Default)]
pub struct ImageUpstream {
    pub status: Option<StatusCode>,
    pub seen: Arc<Mutex<Vec<(String, HashMap<String, String>)>>>,
}

impl ImageUpstream {
    pub fn failing(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/prompt/{prompt}", get(image_handler))
            .with_state(self.clone())
    }
}

async fn image_handler(
    State(upstream): State<ImageUpstream>,
    Path(prompt): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    upstream.seen.lock().unwrap().push((prompt, query));
    match upstream.status {
        Some(status) => (status, [(header::CONTENT_TYPE, "text/plain")], b"nope".to_vec()),
        None => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/png; charset=binary")],
            PNG_BYTES.to_vec(),
        ),
    }
}

/// `generateContent` stand-in answering with a fixed status and body.
#[derive(Clone)]
pub struct GeminiUpstream {
    pub status: StatusCode,
    pub body: serde_json::Value,
    pub requests: Arc<Mutex<Vec<(String, Option<String>, serde_json::Value)>>>,
}

impl GeminiUpstream {
    pub fn new(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            body,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(
            StatusCode::OK,
            serde_json::json!({
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
            }),
        )
    }

    pub fn function_call(prompt: &str) -> Self {
        Self::new(
            StatusCode::OK,
            serde_json::json!({
                "candidates": [{ "content": { "role": "model", "parts": [
                    { "functionCall": { "name": "generate_image", "args": { "prompt": prompt } } }
                ] } }]
            }),
        )
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1beta/models/{call}", post(gemini_handler))
            .with_state(self.clone())
    }
}

async fn gemini_handler(
    State(upstream): State<GeminiUpstream>,
    Path(call): Path<String>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<serde_json::Value>,
) -> impl IntoResponse {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    upstream.requests.lock().unwrap().push((call, key, body));
    (upstream.status, axum::Json(upstream.body.clone()))
}
