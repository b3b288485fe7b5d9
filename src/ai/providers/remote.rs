use crate::ai::client::{AiReply, ChatBackend, ChatError, ChatResult, trim_history};
use crate::types::{ChatRequest, ChatResult as ChatPayload};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Client for a deployed `POST /chat` route.
pub struct RemoteBackend {
    client: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

impl RemoteBackend {
    pub fn new(client: Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

/// Map a success body onto a reply. The server has already run any tool call.
pub fn payload_to_reply(payload: ChatPayload) -> AiReply {
    match payload.image {
        Some(image) => AiReply::Image {
            text: payload.message,
            image,
            prompt: payload.image_prompt.unwrap_or_default(),
        },
        None => AiReply::Text(payload.message),
    }
}

#[async_trait]
impl ChatBackend for RemoteBackend {
    async fn complete(&self, request: &ChatRequest) -> ChatResult<AiReply> {
        let body = ChatRequest {
            message: request.message.clone(),
            history: trim_history(&request.history).to_vec(),
        };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            let payload: ChatPayload = serde_json::from_str(&text)?;
            Ok(payload_to_reply(payload))
        } else {
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            tracing::warn!(%status, "chat endpoint error: {detail}");
            Err(ChatError::from_status(status, &detail))
        }
    }
}
