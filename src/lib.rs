// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod history;
pub mod interrupt;
pub mod observability;
pub mod render;
pub mod sse;
pub mod transport;
pub mod types;

// Re-exports
pub use client::{ChatClient, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use history::{Conversation, DEFAULT_MAX_MESSAGES};
pub use interrupt::{Interrupt, TurnGuard};
pub use observability::register_biometrics;
pub use transport::{FragmentStream, Transport};
pub use types::*;
