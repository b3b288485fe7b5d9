/// AI module for folio
///
/// This module wraps the upstream chat-completion API behind the
/// [`ChatBackend`] trait. A reply is either plain text or a request to run the
/// `generate_image` tool.
///
/// # Architecture
///
/// - `client` - `FolioAI` wrapper, error taxonomy, persona prompt, history window
/// - `providers` - Gemini `generateContent` backend and the remote `/chat` backend
///
/// # Usage
///
/// ```rust,no_run
/// use folio::ai::{ChatBackend, FolioAI};
/// use folio::config::Settings;
/// use folio::types::ChatRequest;
///
/// # async fn example() -> anyhow::Result<()> {
/// let ai = FolioAI::from_settings(&Settings::from_env()?);
/// let reply = ai
///     .complete(&ChatRequest {
///         message: "Halo!".into(),
///         history: vec![],
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
mod client;
mod providers;

// Re-export main types
pub use client::{
    AiReply, ChatBackend, ChatError, ChatResult, EMPTY_REPLY, FolioAI, HISTORY_LIMIT,
    persona_prompt, trim_history,
};
pub use providers::{GeminiBackend, ProviderClient, RemoteBackend};
