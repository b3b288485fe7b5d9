//! Chat orchestration: the state machine between the input box and the
//! adapters.
//!
//! A send is split in three so a UI can run the network part without holding
//! on to the orchestrator:
//!
//! 1. [`ChatOrchestrator::begin`] appends the user message, picks a
//!    [`Dispatch`] and moves to [`ChatState::AwaitingAiResponse`];
//! 2. [`Dispatch::run`] talks to the adapters and yields an [`Outcome`];
//! 3. [`ChatOrchestrator::finish`] appends the bot message and returns to
//!    [`ChatState::Idle`].
//!
//! Adapter failures end up as ordinary bot messages; nothing escapes as an
//! error.

use crate::ai::{AiReply, ChatBackend, ChatError, HISTORY_LIMIT};
use crate::image::ImageGenerator;
use crate::intent::IntentClassifier;
use crate::store::{ConversationStore, Gallery, KeyValueSlot};
use crate::types::{ChatRequest, Clock, FailureKind, GalleryEntry, InlineImage, Message, now_ms, unix_ms};
use std::sync::Arc;

pub const IMAGE_READY_TEXT: &str = "Ini gambar yang kamu minta! 🎨";
pub const IMAGE_FAILED_TEXT: &str =
    "Maaf, gagal membuat gambar 😔 Coba lagi sebentar lagi atau pakai deskripsi yang berbeda ya.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    AwaitingAiResponse,
}

/// Which adapter a user message goes to.
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatch {
    /// Keyword fallback matched; skip the model entirely.
    DirectImage { prompt: String },
    Ai { request: ChatRequest },
}

#[derive(Debug)]
pub enum Outcome {
    Reply(String),
    Image {
        text: String,
        image: InlineImage,
        prompt: String,
    },
    ImageFailed {
        prompt: String,
    },
    Failed(ChatError),
}

impl Dispatch {
    /// Run the network part. Borrows nothing from the orchestrator.
    pub async fn run(self, backend: &dyn ChatBackend, images: &dyn ImageGenerator) -> Outcome {
        match self {
            Dispatch::DirectImage { prompt } => generate_image(images, prompt, None).await,
            Dispatch::Ai { request } => match backend.complete(&request).await {
                Ok(AiReply::Text(text)) => Outcome::Reply(text),
                Ok(AiReply::GenerateImage { prompt, caption }) => {
                    generate_image(images, prompt, caption).await
                }
                Ok(AiReply::Image {
                    text,
                    image,
                    prompt,
                }) => Outcome::Image {
                    text,
                    image,
                    prompt,
                },
                Err(err) => {
                    tracing::warn!("chat reply failed: {err:?}");
                    Outcome::Failed(err)
                }
            },
        }
    }
}

async fn generate_image(images: &dyn ImageGenerator, prompt: String, caption: Option<String>) -> Outcome {
    match images.generate(&prompt).await {
        Ok(image) => Outcome::Image {
            text: caption.unwrap_or_else(|| IMAGE_READY_TEXT.to_string()),
            image,
            prompt,
        },
        Err(err) => {
            tracing::warn!(prompt = prompt.as_str(), "image generation failed: {err}");
            Outcome::ImageFailed { prompt }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("audio cue failed: {0}")]
pub struct AudioError(pub String);

/// Side effects a UI attaches to transitions. Both are best effort.
pub trait UiEffects {
    /// Two-tone cue after a successful bot reply.
    fn play_cue(&self) -> Result<(), AudioError>;
    fn scroll_to_latest(&self);
}

/// Effects for headless use.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEffects;

impl UiEffects for NoEffects {
    fn play_cue(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn scroll_to_latest(&self) {}
}

pub struct ChatOrchestrator<E: UiEffects = NoEffects> {
    state: ChatState,
    conversation: ConversationStore,
    gallery: Gallery,
    classifier: IntentClassifier,
    effects: E,
    clock: Clock,
    last_id: u64,
}

impl<E: UiEffects> ChatOrchestrator<E> {
    pub fn new(slot: Arc<dyn KeyValueSlot>, effects: E) -> Self {
        Self::with_clock(slot, effects, now_ms)
    }

    pub fn with_clock(slot: Arc<dyn KeyValueSlot>, effects: E, clock: Clock) -> Self {
        let conversation = ConversationStore::load_with_clock(slot.clone(), clock);
        let gallery = Gallery::load(slot);
        let last_id = conversation.messages().iter().map(|m| m.id).max().unwrap_or(0);
        Self {
            state: ChatState::Idle,
            conversation,
            gallery,
            classifier: IntentClassifier::default(),
            effects,
            clock,
            last_id,
        }
    }

    /// Swap the image-intent pattern set.
    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state == ChatState::AwaitingAiResponse
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn gallery(&self) -> &[GalleryEntry] {
        self.gallery.entries()
    }

    /// Accept a user message. `None` while a reply is outstanding or for
    /// blank input; nothing is appended in that case.
    pub fn begin(&mut self, text: &str) -> Option<Dispatch> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.is_awaiting() {
            tracing::debug!("send ignored while awaiting a reply");
            return None;
        }

        let history = self.conversation.history_window(HISTORY_LIMIT);
        let id = self.next_id();
        self.conversation.append(Message::user(id, text, (self.clock)()));
        self.state = ChatState::AwaitingAiResponse;
        self.effects.scroll_to_latest();

        let intent = self.classifier.classify(text);
        let dispatch = match intent.prompt {
            Some(prompt) if intent.is_image_request => Dispatch::DirectImage { prompt },
            _ => Dispatch::Ai {
                request: ChatRequest {
                    message: text.to_string(),
                    history,
                },
            },
        };
        tracing::info!(
            direct_image = matches!(dispatch, Dispatch::DirectImage { .. }),
            "dispatching chat message"
        );
        Some(dispatch)
    }

    /// Append the bot message for `outcome` and return to idle.
    pub fn finish(&mut self, outcome: Outcome) -> &Message {
        let now = (self.clock)();
        let id = self.next_id();
        let (message, succeeded) = match outcome {
            Outcome::Reply(text) => (Message::bot(id, text, now), true),
            Outcome::Image {
                text,
                image,
                prompt,
            } => {
                self.gallery.append(image.clone(), prompt.clone(), unix_ms(now));
                (Message::bot(id, text, now).with_image(image, prompt), true)
            }
            Outcome::ImageFailed { .. } => (
                Message::bot(id, IMAGE_FAILED_TEXT, now).with_failure(FailureKind::Image),
                false,
            ),
            Outcome::Failed(err) => (
                Message::bot(id, err.user_message(), now).with_failure(err.kind()),
                false,
            ),
        };

        self.state = ChatState::Idle;
        if succeeded && let Err(err) = self.effects.play_cue() {
            tracing::debug!("{err}");
        }
        self.effects.scroll_to_latest();
        self.conversation.append(message)
    }

    /// `begin`, `run` and `finish` in one go. Returns the bot reply, or `None`
    /// if the message was not accepted.
    pub async fn send(
        &mut self,
        text: &str,
        backend: &dyn ChatBackend,
        images: &dyn ImageGenerator,
    ) -> Option<&Message> {
        let dispatch = self.begin(text)?;
        let outcome = dispatch.run(backend, images).await;
        Some(self.finish(outcome))
    }

    pub fn clear_history(&mut self) {
        self.conversation.clear();
        self.effects.scroll_to_latest();
    }

    pub fn delete_image(&mut self, timestamp: i64) -> bool {
        self.gallery.delete(timestamp)
    }

    pub fn clear_gallery(&mut self) {
        self.gallery.clear();
    }

    /// Wall-clock milliseconds, bumped past the previous id when needed.
    fn next_id(&mut self) -> u64 {
        let now = u64::try_from(unix_ms((self.clock)())).unwrap_or(0);
        let id = now.max(self.last_id + 1);
        self.last_id = id;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ChatResult;
    use crate::image::ImageError;
    use crate::intent::STYLE_SUFFIX;
    use crate::store::{MemorySlot, WELCOME_ID};
    use crate::types::{Role, Sender, from_unix_ms};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;

    fn fixed_clock() -> OffsetDateTime {
        from_unix_ms(1_700_000_000_000)
    }

    struct ScriptedBackend {
        reply: ChatResult<AiReply>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new(reply: ChatResult<AiReply>) -> Self {
            Self {
                reply,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(&self, request: &ChatRequest) -> ChatResult<AiReply> {
            self.requests.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    #[derive(Default)]
    struct RecordingImages {
        fail: bool,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingImages {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageGenerator for RecordingImages {
        async fn generate(&self, prompt: &str) -> Result<InlineImage, ImageError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                Err(ImageError::Status(reqwest::StatusCode::BAD_GATEWAY))
            } else {
                Ok(InlineImage::from_bytes("image/jpeg", prompt.as_bytes()))
            }
        }
    }

    #[derive(Clone, Default)]
    struct CountingEffects {
        cues: Arc<AtomicUsize>,
        scrolls: Arc<AtomicUsize>,
        mute: bool,
    }

    impl UiEffects for CountingEffects {
        fn play_cue(&self) -> Result<(), AudioError> {
            if self.mute {
                return Err(AudioError("no audio device".to_string()));
            }
            self.cues.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn scroll_to_latest(&self) {
            self.scrolls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn orchestrator(effects: CountingEffects) -> ChatOrchestrator<CountingEffects> {
        ChatOrchestrator::with_clock(Arc::new(MemorySlot::new()), effects, fixed_clock)
    }

    #[tokio::test]
    async fn plain_messages_go_to_the_model_only() {
        let effects = CountingEffects::default();
        let mut chat = orchestrator(effects.clone());
        let backend = ScriptedBackend::new(Ok(AiReply::Text("Halo! 😊".to_string())));
        let images = RecordingImages::default();

        for text in ["halo", "what stack do you use?", "ceritakan project kamu"] {
            let reply = chat.send(text, &backend, &images).await.unwrap();
            assert_eq!(reply.text, "Halo! 😊");
            assert_eq!(reply.sender, Sender::Bot);
        }

        assert_eq!(backend.calls(), 3);
        assert!(images.prompts().is_empty());
        assert_eq!(chat.state(), ChatState::Idle);
        assert_eq!(effects.cues.load(Ordering::SeqCst), 3);
        assert!(effects.scrolls.load(Ordering::SeqCst) >= 6);
    }

    #[tokio::test]
    async fn image_requests_skip_the_model() {
        let mut chat = orchestrator(CountingEffects::default());
        let backend = ScriptedBackend::new(Ok(AiReply::Text("unused".to_string())));
        let images = RecordingImages::default();

        let reply = chat
            .send("buatkan gambar kucing lucu", &backend, &images)
            .await
            .unwrap()
            .clone();

        assert_eq!(backend.calls(), 0);
        let expected = format!("kucing lucu, {STYLE_SUFFIX}");
        assert_eq!(images.prompts(), vec![expected.clone()]);
        assert_eq!(reply.image_prompt.as_deref(), Some(expected.as_str()));
        assert!(reply.image.is_some());
        assert_eq!(chat.gallery().len(), 1);
        assert_eq!(chat.gallery()[0].prompt, expected);
    }

    #[tokio::test]
    async fn rate_limit_becomes_an_apology() {
        let effects = CountingEffects::default();
        let mut chat = orchestrator(effects.clone());
        let backend = ScriptedBackend::new(Err(ChatError::RateLimited));
        let images = RecordingImages::default();

        let reply = chat.send("halo", &backend, &images).await.unwrap().clone();

        assert_eq!(reply.text, ChatError::RateLimited.user_message());
        assert_eq!(reply.failure, Some(FailureKind::RateLimited));
        assert_eq!(chat.state(), ChatState::Idle);
        assert!(images.prompts().is_empty());
        assert_eq!(effects.cues.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tool_calls_pass_the_prompt_through_untouched() {
        let mut chat = orchestrator(CountingEffects::default());
        let backend = ScriptedBackend::new(Ok(AiReply::GenerateImage {
            prompt: "a red bicycle".to_string(),
            caption: None,
        }));
        let images = RecordingImages::default();

        let reply = chat
            .send("I want something for my blog header", &backend, &images)
            .await
            .unwrap()
            .clone();

        assert_eq!(images.prompts(), vec!["a red bicycle".to_string()]);
        assert_eq!(reply.text, IMAGE_READY_TEXT);
        assert_eq!(reply.image_prompt.as_deref(), Some("a red bicycle"));
    }

    #[tokio::test]
    async fn image_failure_apologizes_and_returns_to_idle() {
        let mut chat = orchestrator(CountingEffects::default());
        let backend = ScriptedBackend::new(Ok(AiReply::Text("unused".to_string())));
        let images = RecordingImages::failing();

        let reply = chat
            .send("draw me a lighthouse", &backend, &images)
            .await
            .unwrap()
            .clone();

        assert_eq!(reply.text, IMAGE_FAILED_TEXT);
        assert_eq!(reply.failure, Some(FailureKind::Image));
        assert!(reply.image.is_none());
        assert_eq!(chat.state(), ChatState::Idle);
        assert!(chat.gallery().is_empty());
    }

    #[test]
    fn only_one_message_in_flight() {
        let mut chat = orchestrator(CountingEffects::default());
        assert!(chat.begin("   ").is_none());
        assert!(chat.begin("first").is_some());
        assert!(chat.is_awaiting());
        assert!(chat.begin("second").is_none());
        // welcome + first
        assert_eq!(chat.messages().len(), 2);

        chat.finish(Outcome::Reply("ok".to_string()));
        assert!(chat.begin("second").is_some());
    }

    #[tokio::test]
    async fn history_carries_prior_turns() {
        let mut chat = orchestrator(CountingEffects::default());
        let backend = ScriptedBackend::new(Ok(AiReply::Text("jawaban".to_string())));
        let images = RecordingImages::default();

        chat.send("pertanyaan satu", &backend, &images).await;
        chat.send("pertanyaan dua", &backend, &images).await;

        let requests = backend.requests.lock().unwrap();
        assert!(requests[0].history.is_empty());
        let second = &requests[1];
        assert_eq!(second.message, "pertanyaan dua");
        assert_eq!(second.history.len(), 2);
        assert_eq!(second.history[0].role, Role::User);
        assert_eq!(second.history[1].content, "jawaban");
    }

    #[tokio::test]
    async fn gallery_grows_once_per_image() {
        let mut chat = orchestrator(CountingEffects::default());
        let backend = ScriptedBackend::new(Ok(AiReply::Text("unused".to_string())));
        let images = RecordingImages::default();

        for subject in ["kucing", "anjing", "burung"] {
            chat.send(&format!("buatkan gambar {subject}"), &backend, &images).await;
        }

        let stamps: Vec<i64> = chat.gallery().iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps.len(), 3);
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn ids_stay_unique_under_a_frozen_clock() {
        let mut chat = orchestrator(CountingEffects::default());
        let backend = ScriptedBackend::new(Ok(AiReply::Text("ok".to_string())));
        let images = RecordingImages::default();
        chat.send("a", &backend, &images).await;
        chat.send("b", &backend, &images).await;

        let ids: Vec<u64> = chat.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids[0], WELCOME_ID);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn audio_failures_are_swallowed() {
        let effects = CountingEffects {
            mute: true,
            ..CountingEffects::default()
        };
        let mut chat = orchestrator(effects);
        let backend = ScriptedBackend::new(Ok(AiReply::Text("ok".to_string())));
        let images = RecordingImages::default();

        let reply = chat.send("halo", &backend, &images).await.unwrap();
        assert_eq!(reply.text, "ok");
        assert!(reply.failure.is_none());
    }

    #[tokio::test]
    async fn clear_keeps_the_gallery() {
        let mut chat = orchestrator(CountingEffects::default());
        let backend = ScriptedBackend::new(Ok(AiReply::Text("ok".to_string())));
        let images = RecordingImages::default();
        chat.send("bikin gambar pantai", &backend, &images).await;

        chat.clear_history();
        chat.clear_history();
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].id, WELCOME_ID);
        assert_eq!(chat.gallery().len(), 1);

        let stamp = chat.gallery()[0].timestamp;
        assert!(chat.delete_image(stamp));
        assert!(chat.gallery().is_empty());
    }
}
