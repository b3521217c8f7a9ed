//! In-band command parsing for the chat application.
//!
//! Commands are typed at the prompt like ordinary input but control the
//! session instead of being sent to the API.

/// A parsed chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// Drop every message except the system prompt.
    Reset,
}

/// Parses user input for in-band commands.
///
/// Returns `Some(ChatCommand)` if the whole input (ignoring surrounding
/// whitespace and case) is a command, or `None` if it should be treated as
/// a regular message.
///
/// # Examples
///
/// ```
/// # use basechat::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/reset"), Some(ChatCommand::Reset));
/// assert_eq!(parse_command(":RESET"), Some(ChatCommand::Reset));
/// assert!(parse_command("/reset please").is_none());
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("/reset") || input.eq_ignore_ascii_case(":reset") {
        Some(ChatCommand::Reset)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reset_commands() {
        assert_eq!(parse_command("/reset"), Some(ChatCommand::Reset));
        assert_eq!(parse_command(":reset"), Some(ChatCommand::Reset));
        assert_eq!(parse_command("  /reset  "), Some(ChatCommand::Reset));
    }

    #[test]
    fn parse_reset_ignores_case() {
        assert_eq!(parse_command("/RESET"), Some(ChatCommand::Reset));
        assert_eq!(parse_command(":Reset"), Some(ChatCommand::Reset));
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello!"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
        assert_eq!(parse_command("/reset now"), None);
        assert_eq!(parse_command("reset"), None);
        assert_eq!(parse_command("/clear"), None);
        assert_eq!(parse_command("/ reset"), None);
    }
}
