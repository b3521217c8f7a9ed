//! Configuration types for the chat application.
//!
//! Configuration is read once at startup from the process environment,
//! after loading an optional `.env` file from the working directory.

use std::env;

use crate::client::{ChatClient, DEFAULT_BASE_URL, normalize_base_url};
use crate::error::{Error, Result};
use crate::history::DEFAULT_MAX_MESSAGES;

/// Environment variable holding the API credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Environment variable overriding the base URL.
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

/// Environment variable overriding the model.
pub const MODEL_VAR: &str = "OPENAI_MODEL";

/// Environment variable that disables ANSI styling when set.
pub const NO_COLOR_VAR: &str = "NO_COLOR";

/// Model used when `OPENAI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";

/// System prompt every conversation is seeded with.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer concisely unless asked for detail.";

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after applying
/// defaults to whatever the environment provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Credential passed through to the API as a bearer token.
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// System prompt seeded at index 0 of the conversation.
    pub system_prompt: String,

    /// Maximum number of messages kept after each completed turn,
    /// including the system prompt.
    pub max_history: usize,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with the given credential and default values.
    ///
    /// Defaults:
    /// - Base URL: [`DEFAULT_BASE_URL`]
    /// - Model: openai/gpt-oss-120b
    /// - History: 21 messages (system prompt + 20)
    /// - Color: enabled
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_history: DEFAULT_MAX_MESSAGES,
            use_color: true,
        }
    }

    /// Loads `.env` if present, then resolves the configuration from the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `OPENAI_API_KEY` is not set, if the
    /// `.env` file cannot be parsed, or if the base URL is invalid.
    pub fn from_env() -> Result<Self> {
        load_dotenv()?;
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolves the configuration through an arbitrary variable lookup.
    ///
    /// A variable that is present takes precedence over its default even
    /// when it is empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR).ok_or_else(|| {
            Error::configuration(
                format!("Missing required environment variable: {API_KEY_VAR}"),
                Some(API_KEY_VAR.to_string()),
            )
        })?;
        let mut config = ChatConfig::new(api_key);
        if let Some(base_url) = lookup(BASE_URL_VAR) {
            config.base_url = base_url;
        }
        if let Some(model) = lookup(MODEL_VAR) {
            config.model = model;
        }
        if lookup(NO_COLOR_VAR).is_some_and(|value| !value.is_empty()) {
            config.use_color = false;
        }
        normalize_base_url(&config.base_url).map_err(|err| {
            Error::configuration(
                format!("{BASE_URL_VAR} is not a usable URL: {err}"),
                Some(BASE_URL_VAR.to_string()),
            )
        })?;
        Ok(config)
    }

    /// Builds the HTTP client this configuration describes.
    pub fn client(&self) -> Result<ChatClient> {
        ChatClient::new(self.api_key.clone(), &self.base_url)
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets how many messages survive trimming.
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Loads a `.env` file from the working directory without overriding
/// variables that are already set.  A missing file is not an error.
fn load_dotenv() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(Error::configuration(
            format!("failed to load .env: {err}"),
            None,
        )),
    }
}
