//! Bounded in-memory conversation history.
//!
//! A [`Conversation`] is seeded with a single system message.  That message
//! stays at index 0 for the lifetime of the conversation: [`reset`] truncates
//! back to it and [`trim`] never evicts it.
//!
//! [`reset`]: Conversation::reset
//! [`trim`]: Conversation::trim

use crate::observability::{HISTORY_RESETS, HISTORY_TRIMMED_MESSAGES};
use crate::types::{ChatMessage, MessageRole};

/// Retention threshold used by the chat session: the system prompt plus the
/// last 20 messages, or roughly ten user/assistant turns.
pub const DEFAULT_MAX_MESSAGES: usize = 21;

/// An ordered sequence of chat messages in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Creates a conversation seeded with a system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    /// Adds a message to the end of the conversation.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Removes every message except the first.
    ///
    /// This is a no-op on an empty conversation.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
        HISTORY_RESETS.click();
    }

    /// Bounds the conversation to `max_messages`.
    ///
    /// When the conversation is longer than `max_messages`, the first message
    /// is kept together with the most recent `max_messages - 1` messages and
    /// everything in between is discarded.  The first message survives even
    /// when `max_messages` is 0 or 1.  Returns the number of messages
    /// discarded.
    pub fn trim(&mut self, max_messages: usize) -> usize {
        let len = self.messages.len();
        if len <= max_messages || len <= 1 {
            return 0;
        }
        let keep_recent = max_messages.saturating_sub(1);
        let evicted = len - 1 - keep_recent;
        self.messages.drain(1..1 + evicted);
        HISTORY_TRIMMED_MESSAGES.count(evicted as u64);
        evicted
    }

    /// Truncates the conversation back to an earlier length.
    ///
    /// Used to undo messages appended speculatively during a turn that was
    /// abandoned.  Lengths at or beyond the current length change nothing.
    pub fn rollback(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Returns the messages in order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if there are no messages at all.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the system prompt, if the conversation was seeded with one.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|message| message.role == MessageRole::System)
            .map(|message| message.content.as_str())
    }

    /// Returns the most recent message.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}
