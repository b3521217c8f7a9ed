//! Interactive chat against an OpenAI-compatible chat-completion API.
//!
//! This binary provides a streaming REPL that keeps a short conversation
//! history and sends it with every request.
//!
//! # Usage
//!
//! ```bash
//! # Credential is required; base URL and model have defaults
//! export OPENAI_API_KEY=sk-...
//! export OPENAI_BASE_URL=http://localhost:8000/v1/
//! export OPENAI_MODEL=openai/gpt-oss-120b
//! basechat
//! ```
//!
//! Variables may also be placed in a `.env` file in the working directory.
//!
//! # Commands
//!
//! - `/reset` or `:reset` - Drop the conversation, keeping the system prompt
//! - Ctrl+C while a response streams - Cancel that response
//! - Ctrl+C or Ctrl+D at the prompt - Exit

use std::process::ExitCode;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use basechat::Interrupt;
use basechat::chat::{ChatConfig, ChatSession, PlainTextRenderer, Renderer};

const PROMPT: &str = "You > ";

/// Main entry point for the basechat application.
#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ChatConfig::from_env()?;
    let client = config.client()?;
    let mut session = ChatSession::from_config(client, &config);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    // A signal during a turn cancels it.  Outside a turn it ends the program;
    // on a terminal, Ctrl+C at the prompt reaches the line editor instead.
    let interrupt = Interrupt::new();
    let handler_interrupt = interrupt.clone();
    ctrlc::set_handler(move || {
        if !handler_interrupt.signal() {
            println!("\nBye!");
            std::process::exit(0);
        }
    })?;

    println!("CLI connected.");
    println!("Model: {}", session.model());
    println!("Type your message and press Enter. Ctrl+C to exit.\n");

    loop {
        interrupt.clear();

        match rl.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Err(e) = session.handle_input(line, &mut renderer, &interrupt).await {
                    renderer.print_error(&e.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("\nBye!");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}
