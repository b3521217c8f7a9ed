use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

/// Body of a `POST chat/completions` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    /// Model identifier understood by the server.
    pub model: String,

    /// The full ordered conversation, system prompt first.
    pub messages: Vec<ChatMessage>,

    /// Whether the server should answer with server-sent events.
    #[serde(default)]
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Create a new streaming request.
    pub fn streaming(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}
