use super::{KeyValueSlot, erase_collection, load_collection, persist_collection};
use crate::types::{ChatMessage, Clock, Message, now_ms};
use std::sync::Arc;
use time::OffsetDateTime;

pub const CONVERSATION_KEY: &str = "chatHistory";
pub const WELCOME_ID: u64 = 1;
pub const WELCOME_TEXT: &str = "Hello! 👋 I'm the portfolio assistant. How can I help you today?";

pub fn welcome_message(at: OffsetDateTime) -> Message {
    Message::bot(WELCOME_ID, WELCOME_TEXT, at)
}

/// The ordered message log, mirrored to the `chatHistory` slot.
pub struct ConversationStore {
    slot: Arc<dyn KeyValueSlot>,
    clock: Clock,
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn load(slot: Arc<dyn KeyValueSlot>) -> Self {
        Self::load_with_clock(slot, now_ms)
    }

    /// Load the persisted log, or start from the welcome message.
    pub fn load_with_clock(slot: Arc<dyn KeyValueSlot>, clock: Clock) -> Self {
        let messages = load_collection(slot.as_ref(), CONVERSATION_KEY)
            .unwrap_or_else(|| vec![welcome_message(clock())]);
        Self {
            slot,
            clock,
            messages,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn append(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        persist_collection(self.slot.as_ref(), CONVERSATION_KEY, &self.messages);
        &self.messages[self.messages.len() - 1]
    }

    /// Back to the single welcome message, with nothing persisted.
    pub fn clear(&mut self) {
        self.messages = vec![welcome_message((self.clock)())];
        erase_collection(self.slot.as_ref(), CONVERSATION_KEY);
    }

    /// The newest `limit` turns worth sending as context. The welcome message
    /// and apologies are not part of the conversation the model should see.
    pub fn history_window(&self, limit: usize) -> Vec<ChatMessage> {
        let turns: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|msg| msg.id != WELCOME_ID && msg.failure.is_none())
            .map(Message::to_turn)
            .collect();
        let start = turns.len().saturating_sub(limit);
        turns[start..].to_vec()
    }
}
