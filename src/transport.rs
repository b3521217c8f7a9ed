//! The narrow interface the chat session consumes.
//!
//! A [`Transport`] turns a model identifier and a conversation into a lazy
//! stream of text fragments.  [`ChatClient`] is the production
//! implementation; tests substitute scripted transports.

use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::client::ChatClient;
use crate::error::Result;
use crate::types::{ChatCompletionRequest, ChatMessage};

/// A lazy, finite, non-restartable sequence of response fragments.
///
/// `Ok(Some(text))` is a piece of the answer, `Ok(None)` is a fragment that
/// carried no usable text, and `Err` is a transport failure.  A clean end of
/// the response is the end of the stream.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Option<String>>> + Send>>;

/// Something that can stream one assistant response.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Start a streamed completion of `messages` using `model`.
    ///
    /// Errors returned here happen before any fragment was produced (bad
    /// status, refused connection); later failures arrive through the stream.
    async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> Result<FragmentStream>;
}

#[async_trait::async_trait]
impl Transport for ChatClient {
    async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> Result<FragmentStream> {
        let request = ChatCompletionRequest::streaming(model, messages.to_vec());
        let chunks = self.stream(request).await?;
        Ok(Box::pin(chunks.map(|chunk| {
            chunk.map(|chunk| chunk.content().map(str::to_string))
        })))
    }
}
