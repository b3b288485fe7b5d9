//! HTTP surface: `POST /chat` and `GET /chat`.
//!
//! Stateless apart from the shared adapters. Tool calls are executed here, so
//! clients only ever see text or a finished image.

use crate::ai::{AiReply, ChatBackend, ChatError, FolioAI};
use crate::config::Settings;
use crate::image::{ImageClient, ImageGenerator};
use crate::orchestrator::{IMAGE_FAILED_TEXT, IMAGE_READY_TEXT};
use crate::tools::{GenerateImageArgs, GenerateImageTool};
use crate::types::{ChatRequest, ChatResult};
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rig::tool::Tool;
use serde_json::json;
use std::sync::Arc;

pub const HEALTH_MESSAGE: &str = "API chat aktif (GET OK)";
const MESSAGE_REQUIRED: &str = "Message is required";

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn ChatBackend>,
    pub images: Arc<dyn ImageGenerator>,
}

impl AppState {
    pub fn new(backend: Arc<dyn ChatBackend>, images: Arc<dyn ImageGenerator>) -> Self {
        Self { backend, images }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(FolioAI::gemini(settings)),
            Arc::new(ImageClient::from_settings(settings)),
        )
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", get(health_handler).post(chat_handler))
        .route("/api/chat", get(health_handler).post(chat_handler))
        .with_state(state)
}

/// Bind `settings.bind` and serve until the process exits.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let app = router(AppState::from_settings(settings));
    let listener = tokio::net::TcpListener::bind(&settings.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, model = settings.gemini_model.as_str(), "chat server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "message": HEALTH_MESSAGE }))
}

async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<ChatResult>, ChatError> {
    let request = parse_request(&body)?;
    tracing::info!(
        chars = request.message.chars().count(),
        history = request.history.len(),
        "chat request"
    );

    let reply = state.backend.complete(&request).await.inspect_err(|err| {
        tracing::warn!(status = err.status().as_u16(), "chat request failed: {err:?}");
    })?;

    let result = match reply {
        AiReply::Text(text) => ChatResult::text(text),
        AiReply::Image {
            text,
            image,
            prompt,
        } => ChatResult::with_image(text, image, prompt),
        AiReply::GenerateImage { prompt, caption } => {
            let tool = GenerateImageTool::new(state.images.clone());
            match tool.call(GenerateImageArgs { prompt }).await {
                Ok(generated) => ChatResult::with_image(
                    caption.unwrap_or_else(|| IMAGE_READY_TEXT.to_string()),
                    generated.image,
                    generated.image_prompt,
                ),
                Err(err) => {
                    tracing::warn!("{} failed: {err}", <GenerateImageTool as Tool>::NAME);
                    ChatResult::text(IMAGE_FAILED_TEXT)
                }
            }
        }
    };
    Ok(Json(result))
}

/// A body that is not JSON, or has no usable `message`, is a validation error.
fn parse_request(body: &[u8]) -> Result<ChatRequest, ChatError> {
    let request: ChatRequest = serde_json::from_slice(body).map_err(|err| {
        tracing::debug!("rejecting chat body: {err}");
        ChatError::Validation(MESSAGE_REQUIRED.to_string())
    })?;
    if request.message.trim().is_empty() {
        return Err(ChatError::Validation(MESSAGE_REQUIRED.to_string()));
    }
    Ok(request)
}
