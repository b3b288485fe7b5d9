use crate::ai::client::{AiReply, ChatBackend, ChatError, ChatResult, EMPTY_REPLY, persona_prompt, trim_history};
use crate::config::Settings;
use crate::tools::GenerateImageTool;
use crate::types::{ChatMessage, ChatRequest, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Acknowledgement turn that follows the persona prompt.
pub const PERSONA_ACK: &str = "Baik, saya mengerti instruksi Anda. Silakan sampaikan pesan Anda.";

/// Gemini `generateContent` backend.
///
/// Gemini only knows `user` and `model` turns, so the persona goes in as a
/// leading user turn answered by [`PERSONA_ACK`].
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    persona: String,
}

impl GeminiBackend {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            persona: persona.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let persona = settings
            .persona
            .clone()
            .unwrap_or_else(|| persona_prompt(&settings.owner));
        Self::new(
            settings.http_client(),
            settings.gemini_base_url.clone(),
            settings.gemini_model.clone(),
            settings.gemini_api_key.clone(),
            persona,
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

// Gemini wire types
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclarations {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub tools: Vec<ToolDeclarations>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

fn turn(role: &str, text: &str) -> Content {
    Content {
        role: Some(role.to_string()),
        parts: vec![Part {
            text: Some(text.to_string()),
            function_call: None,
        }],
    }
}

/// Persona pair, trimmed history, then the new message.
pub fn build_contents(persona: &str, history: &[ChatMessage], message: &str) -> Vec<Content> {
    let history = trim_history(history);
    let mut contents = Vec::with_capacity(history.len() + 3);
    contents.push(turn("user", persona));
    contents.push(turn("model", PERSONA_ACK));
    contents.extend(history.iter().map(|msg| {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        turn(role, &msg.content)
    }));
    contents.push(turn("user", message));
    contents
}

pub fn build_request(persona: &str, history: &[ChatMessage], message: &str) -> GenerateContentRequest {
    let tool = GenerateImageTool::declaration();
    GenerateContentRequest {
        contents: build_contents(persona, history, message),
        tools: vec![ToolDeclarations {
            function_declarations: vec![FunctionDeclaration {
                name: tool.name,
                description: tool.description,
                parameters: tool.parameters,
            }],
        }],
    }
}

/// Turn a successful response body into a reply.
///
/// Only the first `generate_image` call counts; text parts become the reply
/// or, next to a call, its caption.
pub fn parse_reply(body: &str) -> ChatResult<AiReply> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)?;
    let parts = parsed
        .candidates
        .into_iter()
        .find_map(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default();

    let mut text = String::new();
    let mut image_prompt = None;
    for part in parts {
        if let Some(piece) = part.text {
            text.push_str(&piece);
        }
        if image_prompt.is_none()
            && let Some(call) = part.function_call
            && call.name == "generate_image"
            && let Some(prompt) = call.args.get("prompt").and_then(|p| p.as_str())
            && !prompt.trim().is_empty()
        {
            image_prompt = Some(prompt.trim().to_string());
        }
    }

    let text = text.trim().to_string();
    if let Some(prompt) = image_prompt {
        let caption = (!text.is_empty()).then_some(text);
        return Ok(AiReply::GenerateImage { prompt, caption });
    }
    if text.is_empty() {
        return Ok(AiReply::Text(EMPTY_REPLY.to_string()));
    }
    Ok(AiReply::Text(text))
}

/// Map an error response. Gemini reports a bad key as a 400 with an
/// `API_KEY_INVALID` reason, which is a credential problem, not validation.
pub fn map_error(status: reqwest::StatusCode, body: &str) -> ChatError {
    let (message, details) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.details),
        Err(_) => (body.to_string(), Vec::new()),
    };
    let bad_key = message.contains("API key")
        || details
            .iter()
            .any(|d| d.get("reason").and_then(|r| r.as_str()) == Some("API_KEY_INVALID"));
    if bad_key {
        return ChatError::Credential;
    }
    match ChatError::from_status(status, &message) {
        // a 400 from upstream is our request's fault, not the user's
        ChatError::Validation(detail) => ChatError::Upstream(detail),
        other => other,
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    async fn complete(&self, request: &ChatRequest) -> ChatResult<AiReply> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(ChatError::Validation("Message is required".to_string()));
        }
        let Some(api_key) = &self.api_key else {
            return Err(ChatError::Credential);
        };

        let body = build_request(&self.persona, &request.history, message);
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            parse_reply(&text)
        } else {
            tracing::warn!(%status, "gemini request failed: {text}");
            Err(map_error(status, &text))
        }
    }
}
