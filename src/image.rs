//! Image fetch adapter for the public image-generation endpoint.
//!
//! The endpoint renders an image straight from a URL-escaped prompt, so one
//! GET is the whole protocol. A time-derived seed keeps identical prompts from
//! being served from the endpoint's cache.

use crate::config::Settings;
use crate::types::{InlineImage, now_ms, unix_ms};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image prompt is empty")]
    EmptyPrompt,

    #[error("image endpoint returned {0}")]
    Status(reqwest::StatusCode),

    #[error("image request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Anything that can turn a prompt into an inline image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<InlineImage, ImageError>;
}

pub struct ImageClient {
    client: reqwest::Client,
    base_url: String,
    size: u32,
}

impl ImageClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, size: u32) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            size,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.http_client(),
            settings.image_base_url.clone(),
            settings.image_size,
        )
    }

    /// Request URL for `prompt` with the given cache-busting seed.
    pub fn request_url(&self, prompt: &str, seed: i64) -> String {
        format!(
            "{}/prompt/{}?width={size}&height={size}&nologo=true&seed={seed}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(prompt),
            size = self.size,
        )
    }
}

#[async_trait]
impl ImageGenerator for ImageClient {
    async fn generate(&self, prompt: &str) -> Result<InlineImage, ImageError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ImageError::EmptyPrompt);
        }

        let url = self.request_url(prompt, unix_ms(now_ms()));
        tracing::info!(prompt, "generating image");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "image endpoint rejected request");
            return Err(ImageError::Status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
        let bytes = response.bytes().await?;
        tracing::debug!(size = bytes.len(), %content_type, "image fetched");

        Ok(InlineImage::from_bytes(&content_type, &bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ImageClient {
        ImageClient::new(reqwest::Client::new(), base, 512)
    }

    #[test]
    fn url_escapes_prompt_and_carries_seed() {
        let url = client("https://img.test/").request_url("kucing lucu & anjing", 42);
        assert_eq!(
            url,
            "https://img.test/prompt/kucing%20lucu%20%26%20anjing?width=512&height=512&nologo=true&seed=42"
        );
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_without_a_request() {
        let err = client("http://127.0.0.1:9").generate("   ").await.unwrap_err();
        assert!(matches!(err, ImageError::EmptyPrompt));
    }
}
