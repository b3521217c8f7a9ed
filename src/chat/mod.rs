//! Chat application module for interactive conversations.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! basechat client library. It supports:
//!
//! - Streaming responses with real-time token display
//! - Cancelling a response mid-stream without polluting the history
//! - A bounded history that always keeps the system prompt
//!
//! # Architecture
//!
//! - [`config`]: environment-driven configuration
//! - [`session`]: the turn state machine and API interaction
//! - [`commands`]: in-band command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{ASSISTANT_PREFIX, PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, parse_command};
pub use config::{
    API_KEY_VAR, BASE_URL_VAR, ChatConfig, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, MODEL_VAR,
    NO_COLOR_VAR,
};
pub use session::{ChatSession, TurnOutcome};
