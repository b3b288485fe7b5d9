pub mod gemini;
pub mod remote;

use crate::config::Settings;

pub use gemini::GeminiBackend;
pub use remote::RemoteBackend;

/// Enum to hold different provider clients
pub enum ProviderClient {
    Gemini(GeminiBackend),
    Remote(RemoteBackend),
}

impl ProviderClient {
    /// Pick a provider from settings
    pub fn from_settings(settings: &Settings) -> Self {
        // Priority order:
        // 1. FOLIO_CHAT_URL → a deployed /chat route
        // 2. otherwise → Gemini directly (missing key surfaces as a credential error)
        if let Some(url) = &settings.chat_url {
            return Self::Remote(RemoteBackend::new(settings.http_client(), url.clone()));
        }

        Self::gemini(settings)
    }

    pub fn gemini(settings: &Settings) -> Self {
        if settings.gemini_api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY is not set; chat replies will report a credential error");
        }
        Self::Gemini(GeminiBackend::from_settings(settings))
    }
}
