use crate::config::Settings;
use crate::types::{ChatMessage, ChatRequest, FailureKind, InlineImage};
use async_trait::async_trait;
use reqwest::StatusCode;

use super::providers::ProviderClient;

/// Prior turns sent along with a new message.
pub const HISTORY_LIMIT: usize = 10;

/// Reply used when the model answers with no text at all.
pub const EMPTY_REPLY: &str = "Maaf, saya tidak bisa memberikan jawaban saat ini.";

// ============================================
// Error Types
// ============================================

/// Failure categories of the AI adapter. `Display` is the `{ error }` body of
/// the HTTP route; [`ChatError::user_message`] is the chat bubble text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("API key tidak valid. Periksa konfigurasi server.")]
    Credential,

    #[error("Terlalu banyak permintaan ke AI. Coba lagi sebentar lagi.")]
    RateLimited,

    #[error("Layanan AI sedang tidak tersedia. Coba lagi nanti.")]
    Unavailable,

    #[error("Gagal mendapatkan response dari AI. Coba lagi nanti.")]
    Upstream(String),
}

impl ChatError {
    /// Map an upstream HTTP status onto the taxonomy.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::BAD_REQUEST => ChatError::Validation(body.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ChatError::Credential,
            StatusCode::TOO_MANY_REQUESTS => ChatError::RateLimited,
            StatusCode::SERVICE_UNAVAILABLE => ChatError::Unavailable,
            other => ChatError::Upstream(format!("{other}: {body}")),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Credential => StatusCode::UNAUTHORIZED,
            ChatError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ChatError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ChatError::Validation(_) => FailureKind::Validation,
            ChatError::Credential => FailureKind::Credential,
            ChatError::RateLimited => FailureKind::RateLimited,
            ChatError::Unavailable => FailureKind::Unavailable,
            ChatError::Upstream(_) => FailureKind::Upstream,
        }
    }

    /// Apology shown in the conversation for this category.
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatError::Validation(_) => "Maaf, pesannya tidak bisa diproses. Coba kirim ulang ya.",
            ChatError::Credential => {
                "Maaf, asisten sedang tidak bisa dipakai karena masalah konfigurasi server 🙏"
            }
            ChatError::RateLimited => {
                "Maaf, kuota AI sedang penuh 😅 Tunggu sebentar lalu coba lagi ya."
            }
            ChatError::Unavailable => {
                "Maaf, layanan AI sedang sibuk atau tidak tersedia. Coba lagi beberapa saat lagi ya."
            }
            ChatError::Upstream(_) => "Maaf, terjadi kesalahan. Coba lagi nanti ya 🙏",
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Upstream(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Upstream(err.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

// ============================================
// Replies and the backend seam
// ============================================

#[derive(Clone, Debug, PartialEq)]
pub enum AiReply {
    /// Plain text answer.
    Text(String),
    /// The model asked for the `generate_image` tool.
    GenerateImage {
        prompt: String,
        caption: Option<String>,
    },
    /// The image was already produced upstream (remote `/chat`).
    Image {
        text: String,
        image: InlineImage,
        prompt: String,
    },
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> ChatResult<AiReply>;
}

/// The trailing [`HISTORY_LIMIT`] turns; older turns are dropped first.
pub fn trim_history(history: &[ChatMessage]) -> &[ChatMessage] {
    let start = history.len().saturating_sub(HISTORY_LIMIT);
    &history[start..]
}

/// Persona for the portfolio assistant. Sent as a leading user turn.
pub fn persona_prompt(owner: &str) -> String {
    format!(
        r#"Kamu adalah asisten virtual bernama {owner} Bot.
Kamu adalah AI assistant yang ramah dan helpful untuk website portfolio {owner}.

Cara kamu menjawab:
- Gunakan bahasa Indonesia yang santai tapi sopan, atau bahasa Inggris kalau pengguna memakai bahasa Inggris
- Jawab dengan singkat dan jelas (maksimal 2-3 paragraf)
- Kalau ditanya tentang hal teknis, jelaskan dengan sederhana
- Kalau ditanya hal yang tidak kamu tahu, bilang dengan jujur
- Tambahkan emoji sesekali untuk membuat percakapan lebih friendly 😊
- Gunakan Markdown seperti **bold**, *italic*, list, dan [link](url) jika diperlukan
- Jika memberikan kode, gunakan block code Markdown dengan bahasa yang sesuai
- Jika pengguna meminta gambar, panggil fungsi generate_image dengan prompt bahasa Inggris yang deskriptif

Kamu TIDAK boleh:
- Menjawab pertanyaan yang tidak pantas
- Berpura-pura menjadi orang lain
- Memberikan informasi pribadi yang sensitif"#
    )
}

/// Unified AI client wrapper for folio
pub struct FolioAI {
    client: ProviderClient,
}

impl FolioAI {
    /// Remote `/chat` when `FOLIO_CHAT_URL` is set, Gemini otherwise.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            client: ProviderClient::from_settings(settings),
        }
    }

    /// Always talk to Gemini directly. Used by the server itself.
    pub fn gemini(settings: &Settings) -> Self {
        Self {
            client: ProviderClient::gemini(settings),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match &self.client {
            ProviderClient::Gemini(_) => "gemini",
            ProviderClient::Remote(_) => "remote",
        }
    }
}

#[async_trait]
impl ChatBackend for FolioAI {
    async fn complete(&self, request: &ChatRequest) -> ChatResult<AiReply> {
        match &self.client {
            ProviderClient::Gemini(backend) => backend.complete(request).await,
            ProviderClient::Remote(backend) => backend.complete(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn turns(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| ChatMessage {
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                content: format!("turn {i}"),
            })
            .collect()
    }

    #[test]
    fn history_keeps_the_newest_turns() {
        let history = turns(13);
        let window = trim_history(&history);
        assert_eq!(window.len(), HISTORY_LIMIT);
        assert_eq!(window[0].content, "turn 3");
        assert_eq!(window[9].content, "turn 12");
        assert_eq!(trim_history(&turns(4)).len(), 4);
    }

    #[test]
    fn statuses_map_to_categories() {
        let cases = [
            (StatusCode::TOO_MANY_REQUESTS, ChatError::RateLimited),
            (StatusCode::SERVICE_UNAVAILABLE, ChatError::Unavailable),
            (StatusCode::UNAUTHORIZED, ChatError::Credential),
            (StatusCode::FORBIDDEN, ChatError::Credential),
        ];
        for (status, expected) in cases {
            assert_eq!(ChatError::from_status(status, ""), expected);
        }
        let generic = ChatError::from_status(StatusCode::BAD_GATEWAY, "boom");
        assert_eq!(generic.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(generic.kind(), FailureKind::Upstream);
    }

    #[test]
    fn every_category_has_its_own_apology() {
        let errors = [
            ChatError::Validation(String::new()),
            ChatError::Credential,
            ChatError::RateLimited,
            ChatError::Unavailable,
            ChatError::Upstream(String::new()),
        ];
        let mut seen: Vec<&str> = errors.iter().map(ChatError::user_message).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), errors.len());
    }

    #[test]
    fn persona_names_the_owner_and_the_tool() {
        let persona = persona_prompt("Rina");
        assert!(persona.contains("Rina Bot"));
        assert!(persona.contains("generate_image"));
    }
}
