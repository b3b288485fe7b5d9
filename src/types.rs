use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Role of a turn on the `/chat` wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn role(self) -> Role {
        match self {
            Sender::User => Role::User,
            Sender::Bot => Role::Assistant,
        }
    }
}

/// Why a bot message is an apology instead of an answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    Validation,
    Credential,
    RateLimited,
    Unavailable,
    Upstream,
    Image,
}

/// An image carried as a `data:` URI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InlineImage(String);

impl InlineImage {
    pub fn from_bytes(content_type: &str, bytes: &[u8]) -> Self {
        Self(format!(
            "data:{};base64,{}",
            content_type,
            STANDARD.encode(bytes)
        ))
    }

    /// Wraps an existing data URI; anything else is rejected.
    pub fn parse(uri: impl Into<String>) -> Option<Self> {
        let uri = uri.into();
        if uri.starts_with("data:") && uri.contains(";base64,") {
            Some(Self(uri))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn content_type(&self) -> &str {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .map(|(mime, _)| mime)
            .unwrap_or("application/octet-stream")
    }

    /// File extension matching the content type, used for downloads.
    pub fn extension(&self) -> &'static str {
        match self.content_type() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "jpg",
        }
    }

    pub fn decode(&self) -> Option<Vec<u8>> {
        let (_, payload) = self.0.split_once(";base64,")?;
        STANDARD.decode(payload).ok()
    }
}

/// One bubble of the conversation log. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    #[serde(with = "timestamp_ms")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<InlineImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl Message {
    pub fn user(id: u64, text: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self::new(id, text.into(), Sender::User, timestamp)
    }

    pub fn bot(id: u64, text: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self::new(id, text.into(), Sender::Bot, timestamp)
    }

    fn new(id: u64, text: String, sender: Sender, timestamp: OffsetDateTime) -> Self {
        Self {
            id,
            text,
            sender,
            timestamp,
            image: None,
            image_prompt: None,
            failure: None,
        }
    }

    pub fn with_image(mut self, image: InlineImage, prompt: impl Into<String>) -> Self {
        self.image = Some(image);
        self.image_prompt = Some(prompt.into());
        self
    }

    pub fn with_failure(mut self, kind: FailureKind) -> Self {
        self.failure = Some(kind);
        self
    }

    pub fn to_turn(&self) -> ChatMessage {
        ChatMessage {
            role: self.sender.role(),
            content: self.text.clone(),
        }
    }
}

/// A generated image, kept independently of the message it came with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub image: InlineImage,
    pub prompt: String,
    pub timestamp: i64,
}

/// Body of `POST /chat`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// Success body of `POST /chat`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<InlineImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

impl ChatResult {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            image: None,
            image_prompt: None,
        }
    }

    pub fn with_image(message: impl Into<String>, image: InlineImage, prompt: String) -> Self {
        Self {
            success: true,
            message: message.into(),
            image: Some(image),
            image_prompt: Some(prompt),
        }
    }
}

/// Source of "now" for timestamps and ids.
pub type Clock = fn() -> OffsetDateTime;

/// Current UTC time truncated to whole milliseconds, the precision of the
/// persisted form.
pub fn now_ms() -> OffsetDateTime {
    truncate_to_ms(OffsetDateTime::now_utc())
}

pub fn truncate_to_ms(at: OffsetDateTime) -> OffsetDateTime {
    from_unix_ms(unix_ms(at))
}

pub fn unix_ms(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_unix_ms(ms: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// Timestamps are written as epoch milliseconds. RFC 3339 strings are
/// accepted on read for logs written by older widget builds.
mod timestamp_ms {
    use super::{from_unix_ms, unix_ms};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(at: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(unix_ms(*at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(from_unix_ms(ms)),
            Raw::Text(text) => OffsetDateTime::parse(&text, &Rfc3339)
                .map(super::truncate_to_ms)
                .map_err(D::Error::custom),
        }
    }
}
