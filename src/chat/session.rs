//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! and runs one turn at a time against a [`Transport`].

use futures::StreamExt;

use crate::chat::commands::{ChatCommand, parse_command};
use crate::chat::config::ChatConfig;
use crate::error::Result;
use crate::history::{Conversation, DEFAULT_MAX_MESSAGES};
use crate::interrupt::Interrupt;
use crate::observability::{TURN_CANCELLED, TURN_COMPLETED, TURN_FAILED};
use crate::render::Renderer;
use crate::transport::Transport;
use crate::types::ChatMessage;

/// How a line of input was handled.
///
/// A turn that fails on the transport is reported as `Err` by
/// [`ChatSession::handle_input`] and [`ChatSession::send_streaming`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The input was empty or whitespace; nothing happened.
    Ignored,
    /// The input was a reset command.
    Reset,
    /// The response streamed to completion and was recorded.
    Completed {
        /// The full assistant text, fragments joined in arrival order.
        text: String,
    },
    /// The user interrupted the turn; the user message was rolled back.
    Cancelled,
}

/// A chat session that manages conversation state and API interactions.
///
/// The session maintains message history and handles streaming responses
/// from the transport.
pub struct ChatSession<T: Transport> {
    transport: T,
    model: String,
    max_history: usize,
    conversation: Conversation,
}

impl<T: Transport> ChatSession<T> {
    /// Creates a new chat session seeded with `system_prompt`.
    pub fn new(transport: T, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            transport,
            model: model.into(),
            max_history: DEFAULT_MAX_MESSAGES,
            conversation: Conversation::new(system_prompt),
        }
    }

    /// Creates a new chat session from a resolved configuration.
    pub fn from_config(transport: T, config: &ChatConfig) -> Self {
        Self::new(transport, config.model.clone(), config.system_prompt.clone())
            .with_max_history(config.max_history)
    }

    /// Sets how many messages survive trimming after each completed turn.
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Handles one line of user input.
    ///
    /// Empty input is ignored, a reset command resets the conversation, and
    /// anything else is sent as a user message.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the turn failed.
    pub async fn handle_input(
        &mut self,
        input: &str,
        renderer: &mut dyn Renderer,
        interrupt: &Interrupt,
    ) -> Result<TurnOutcome> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        if let Some(command) = parse_command(input) {
            match command {
                ChatCommand::Reset => {
                    self.reset();
                    renderer.print_info("(conversation reset)");
                    return Ok(TurnOutcome::Reset);
                }
            }
        }

        self.send_streaming(input, renderer, interrupt).await
    }

    /// Sends a user message and streams the response.
    ///
    /// This method:
    /// 1. Adds the user message to history
    /// 2. Sends a streaming request with the whole conversation
    /// 3. Renders fragments as they arrive, racing the response against the
    ///    interrupt
    /// 4. Adds the complete assistant response to history and trims it
    ///
    /// If the interrupt fires first, the stream is dropped and the user
    /// message is rolled back.  If the transport fails, the user message
    /// stays in history and no assistant message is recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request or the stream fails.
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
        interrupt: &Interrupt,
    ) -> Result<TurnOutcome> {
        let _turn = interrupt.begin_turn();
        let previous_len = self.conversation.len();

        // Add user message to history
        self.conversation.append(ChatMessage::user(user_input));

        renderer.start_response();
        let response = tokio::select! {
            biased;
            _ = interrupt.triggered() => None,
            response = stream_response(
                &self.transport,
                &self.model,
                self.conversation.messages(),
                renderer,
            ) => Some(response),
        };

        match response {
            None => {
                self.conversation.rollback(previous_len);
                TURN_CANCELLED.click();
                renderer.print_cancelled();
                Ok(TurnOutcome::Cancelled)
            }
            Some(Ok(text)) => {
                renderer.finish_response();
                self.conversation.append(ChatMessage::assistant(text.clone()));
                self.conversation.trim(self.max_history);
                TURN_COMPLETED.click();
                Ok(TurnOutcome::Completed { text })
            }
            Some(Err(err)) => {
                TURN_FAILED.click();
                Err(err)
            }
        }
    }

    /// Truncates the conversation back to the system prompt.
    pub fn reset(&mut self) {
        self.conversation.reset();
    }

    /// Returns the conversation.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }

    /// Returns the model used for responses.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the retention threshold.
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Drive one streamed response to its end, rendering fragments as they
/// arrive, and return their concatenation.
async fn stream_response<T: Transport>(
    transport: &T,
    model: &str,
    messages: &[ChatMessage],
    renderer: &mut dyn Renderer,
) -> Result<String> {
    let mut stream = transport.stream_chat(model, messages).await?;
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        if let Some(fragment) = fragment?.filter(|fragment| !fragment.is_empty()) {
            renderer.print_text(&fragment);
            text.push_str(&fragment);
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures::stream;

    use super::*;
    use crate::Error;
    use crate::transport::FragmentStream;
    use crate::types::MessageRole;

    enum Script {
        Fragments(Vec<Result<Option<String>>>),
        Hang(Vec<Result<Option<String>>>),
        Refuse(Error),
    }

    #[derive(Default)]
    struct ScriptedTransport {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<(String, Vec<ChatMessage>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn stream_chat(
            &self,
            model: &str,
            messages: &[ChatMessage],
        ) -> Result<FragmentStream> {
            self.requests
                .lock()
                .unwrap()
                .push((model.to_string(), messages.to_vec()));
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request");
            match script {
                Script::Fragments(items) => Ok(Box::pin(stream::iter(items))),
                Script::Hang(items) => Ok(Box::pin(stream::iter(items).chain(stream::pending()))),
                Script::Refuse(err) => Err(err),
            }
        }
    }

    fn fragments(parts: &[&str]) -> Script {
        Script::Fragments(parts.iter().map(|p| Ok(Some(p.to_string()))).collect())
    }

    #[derive(Default)]
    struct RecordingRenderer {
        text: String,
        infos: Vec<String>,
        errors: Vec<String>,
        starts: usize,
        finishes: usize,
        cancellations: usize,
        interrupt_on_text: Option<Interrupt>,
        signals: Vec<bool>,
    }

    impl Renderer for RecordingRenderer {
        fn start_response(&mut self) {
            self.starts += 1;
        }

        fn print_text(&mut self, text: &str) {
            self.text.push_str(text);
            if let Some(interrupt) = &self.interrupt_on_text {
                self.signals.push(interrupt.signal());
            }
        }

        fn finish_response(&mut self) {
            self.finishes += 1;
        }

        fn print_error(&mut self, error: &str) {
            self.errors.push(error.to_string());
        }

        fn print_info(&mut self, info: &str) {
            self.infos.push(info.to_string());
        }

        fn print_cancelled(&mut self) {
            self.cancellations += 1;
        }
    }

    fn session(scripts: Vec<Script>) -> ChatSession<ScriptedTransport> {
        ChatSession::new(ScriptedTransport::new(scripts), "test-model", "S")
    }

    #[tokio::test]
    async fn completed_turn_records_user_and_assistant() {
        let mut session = session(vec![fragments(&["Hel", "lo"])]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        let outcome = session
            .handle_input("hi", &mut renderer, &interrupt)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                text: "Hello".to_string()
            }
        );
        assert_eq!(
            session.conversation().messages(),
            &[
                ChatMessage::system("S"),
                ChatMessage::user("hi"),
                ChatMessage::assistant("Hello"),
            ]
        );
        assert_eq!(renderer.text, "Hello");
        assert_eq!(renderer.starts, 1);
        assert_eq!(renderer.finishes, 1);
    }

    #[tokio::test]
    async fn transport_receives_full_conversation() {
        let mut session = session(vec![fragments(&["one"]), fragments(&["two"])]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        session
            .handle_input("first", &mut renderer, &interrupt)
            .await
            .unwrap();
        session
            .handle_input("second", &mut renderer, &interrupt)
            .await
            .unwrap();

        let requests = session.transport().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].0, "test-model");
        assert_eq!(
            requests[1].1,
            vec![
                ChatMessage::system("S"),
                ChatMessage::user("first"),
                ChatMessage::assistant("one"),
                ChatMessage::user("second"),
            ]
        );
    }

    #[tokio::test]
    async fn empty_fragments_are_skipped() {
        let mut session = session(vec![Script::Fragments(vec![
            Ok(None),
            Ok(Some("a".to_string())),
            Ok(Some(String::new())),
            Ok(None),
            Ok(Some("b".to_string())),
        ])]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        let outcome = session
            .send_streaming("x", &mut renderer, &interrupt)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                text: "ab".to_string()
            }
        );
    }

    #[tokio::test]
    async fn empty_response_still_completes() {
        let mut session = session(vec![fragments(&[])]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        session
            .send_streaming("x", &mut renderer, &interrupt)
            .await
            .unwrap();

        assert_eq!(session.message_count(), 3);
        assert_eq!(
            session.conversation().last(),
            Some(&ChatMessage::assistant(""))
        );
    }

    #[tokio::test]
    async fn cancelled_mid_stream_rolls_back() {
        let mut session = session(vec![Script::Hang(vec![Ok(Some("partial".to_string()))])]);
        let interrupt = Interrupt::new();
        let mut renderer = RecordingRenderer {
            interrupt_on_text: Some(interrupt.clone()),
            ..RecordingRenderer::default()
        };
        let before = session.message_count();

        let outcome = session
            .handle_input("hi", &mut renderer, &interrupt)
            .await
            .unwrap();

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(session.message_count(), before);
        assert_eq!(session.conversation().messages(), &[ChatMessage::system("S")]);
        assert_eq!(renderer.text, "partial");
        assert_eq!(renderer.cancellations, 1);
        assert_eq!(renderer.finishes, 0);
        assert_eq!(renderer.signals, vec![true]);
        assert!(!interrupt.in_turn());
    }

    #[tokio::test]
    async fn signal_between_turns_does_not_cancel() {
        let mut session = session(vec![fragments(&["fine"])]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        assert!(!interrupt.signal());
        let outcome = session
            .handle_input("hi", &mut renderer, &interrupt)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                text: "fine".to_string()
            }
        );
        assert!(!interrupt.in_turn());
    }

    #[tokio::test]
    async fn cancelled_before_first_fragment_rolls_back() {
        let mut session = session(vec![Script::Hang(Vec::new())]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let outcome = session
            .send_streaming("hi", &mut renderer, &interrupt)
            .await
            .unwrap();

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(session.message_count(), 1);
    }

    #[tokio::test]
    async fn cancellation_keeps_earlier_turns() {
        let mut session = session(vec![fragments(&["ok"]), Script::Hang(Vec::new())]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        session
            .handle_input("first", &mut renderer, &interrupt)
            .await
            .unwrap();
        let before = session.conversation().clone();

        let remote = interrupt.clone();
        let trigger = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            remote.trigger();
        });
        let outcome = session
            .handle_input("second", &mut renderer, &interrupt)
            .await
            .unwrap();
        trigger.join().unwrap();

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(session.conversation(), &before);
    }

    #[tokio::test]
    async fn failed_mid_stream_keeps_user_message() {
        let mut session = session(vec![Script::Fragments(vec![
            Ok(Some("par".to_string())),
            Err(Error::streaming("connection reset", None)),
            Ok(Some("never".to_string())),
        ])]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        let err = session
            .handle_input("hi", &mut renderer, &interrupt)
            .await
            .unwrap_err();

        assert!(err.is_streaming());
        assert_eq!(
            session.conversation().messages(),
            &[ChatMessage::system("S"), ChatMessage::user("hi")]
        );
        assert!(
            session
                .conversation()
                .messages()
                .iter()
                .all(|m| m.role != MessageRole::Assistant)
        );
        assert_eq!(renderer.text, "par");
        assert_eq!(renderer.finishes, 0);
    }

    #[tokio::test]
    async fn failed_request_keeps_user_message() {
        let mut session = session(vec![Script::Refuse(Error::authentication("bad key"))]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        let err = session
            .send_streaming("hi", &mut renderer, &interrupt)
            .await
            .unwrap_err();

        assert!(err.is_authentication());
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.conversation().last(), Some(&ChatMessage::user("hi")));
    }

    #[tokio::test]
    async fn empty_and_whitespace_input_is_ignored() {
        let mut session = session(Vec::new());
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        for input in ["", "   ", "\t\n"] {
            let outcome = session
                .handle_input(input, &mut renderer, &interrupt)
                .await
                .unwrap();
            assert_eq!(outcome, TurnOutcome::Ignored);
        }
        assert_eq!(session.conversation().messages(), &[ChatMessage::system("S")]);
        assert_eq!(renderer.starts, 0);
        assert!(session.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn reset_command_keeps_system_prompt() {
        let mut session = session(vec![fragments(&["a"]), fragments(&["b"])]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        session
            .handle_input("one", &mut renderer, &interrupt)
            .await
            .unwrap();
        session
            .handle_input("two", &mut renderer, &interrupt)
            .await
            .unwrap();
        let outcome = session
            .handle_input("  :RESET ", &mut renderer, &interrupt)
            .await
            .unwrap();

        assert_eq!(outcome, TurnOutcome::Reset);
        assert_eq!(session.conversation().messages(), &[ChatMessage::system("S")]);
        assert_eq!(renderer.infos, vec!["(conversation reset)".to_string()]);
        assert_eq!(session.transport().requests().len(), 2);
    }

    #[tokio::test]
    async fn input_is_trimmed_before_sending() {
        let mut session = session(vec![fragments(&["ok"])]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        session
            .handle_input("  hello  \n", &mut renderer, &interrupt)
            .await
            .unwrap();

        assert_eq!(
            session.conversation().messages()[1],
            ChatMessage::user("hello")
        );
    }

    #[tokio::test]
    async fn history_is_trimmed_after_each_turn() {
        let scripts = (0..15)
            .map(|i| fragments(&[format!("a{i}").as_str()]))
            .collect();
        let mut session = session(scripts);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        for i in 0..15 {
            session
                .handle_input(&format!("u{i}"), &mut renderer, &interrupt)
                .await
                .unwrap();
            assert!(session.message_count() <= DEFAULT_MAX_MESSAGES);
        }

        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 21);
        assert_eq!(messages[0], ChatMessage::system("S"));
        assert_eq!(messages[1], ChatMessage::user("u5"));
        assert_eq!(messages[20], ChatMessage::assistant("a14"));
    }

    #[tokio::test]
    async fn custom_max_history() {
        let mut session = session(vec![fragments(&["a"]), fragments(&["b"])]).with_max_history(3);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();

        session
            .handle_input("one", &mut renderer, &interrupt)
            .await
            .unwrap();
        session
            .handle_input("two", &mut renderer, &interrupt)
            .await
            .unwrap();

        assert_eq!(
            session.conversation().messages(),
            &[
                ChatMessage::system("S"),
                ChatMessage::user("two"),
                ChatMessage::assistant("b"),
            ]
        );
    }

    #[test]
    fn from_config_uses_config_values() {
        let config = ChatConfig::new("sk")
            .with_model("llama3")
            .with_system_prompt("Be terse.")
            .with_max_history(7);
        let session = ChatSession::from_config(ScriptedTransport::default(), &config);

        assert_eq!(session.model(), "llama3");
        assert_eq!(session.max_history(), 7);
        assert_eq!(session.conversation().system_prompt(), Some("Be terse."));
    }
}
