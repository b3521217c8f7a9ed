// Public modules
pub mod chat_completion_chunk;
pub mod chat_completion_request;
pub mod chat_message;

// Re-exports
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
pub use chat_completion_request::ChatCompletionRequest;
pub use chat_message::{ChatMessage, MessageRole};
