//! Prompt input parsing
//!
//! Plain text is streamed to the coach; lines starting with `/` are commands.

use std::path::PathBuf;

use anyhow::{bail, Result};
use coach_core::FormatPreference;

/// Number of guide tips requested by `/guides`
pub const GUIDES_TOP_K: u32 = 3;

/// Help text shown by `/help`
pub const HELP: &str = "\
Type a message to chat with the coach (streamed). Ctrl-C cancels a reply;
Ctrl-C at the prompt exits.

Commands:
  /chat <message>       send without streaming
  /resume <file>        analyze a resume text file
  /interview <position> generate mock interview questions
  /guides <query>       featured career guide tips
  /format <fmt>         markdown | plain | code
  /tools on|off         automatic tool selection
  /clear                start a new conversation
  /health               check the coach server
  /help                 show this help
  /quit                 exit";

/// One parsed prompt line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Stream a message
    Stream(String),
    /// Send a message through the non-streamed endpoint
    Chat(String),
    /// Analyze the resume stored in a file
    Resume(PathBuf),
    /// Mock interview questions for a position
    Interview(String),
    /// Career guide tips for a query
    Guides(String),
    /// Change the reply format
    Format(FormatPreference),
    /// Toggle automatic tool selection
    Tools(bool),
    /// Clear the conversation
    Clear,
    /// Probe the server
    Health,
    /// Show help
    Help,
    /// Exit
    Quit,
}

/// Parse one prompt line; `Ok(None)` for a blank line
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Stream(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "chat" => Command::Chat(required(arg, "/chat <message>")?),
        "resume" => Command::Resume(PathBuf::from(required(arg, "/resume <file>")?)),
        "interview" => Command::Interview(required(arg, "/interview <position>")?),
        "guides" => Command::Guides(required(arg, "/guides <query>")?),
        "format" => Command::Format(
            arg.parse::<FormatPreference>()
                .map_err(|e| anyhow::anyhow!(e))?,
        ),
        "tools" => match arg {
            "on" => Command::Tools(true),
            "off" => Command::Tools(false),
            _ => bail!("usage: /tools on|off"),
        },
        "clear" => Command::Clear,
        "health" => Command::Health,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("unknown command '/{other}' (try /help)"),
    };

    Ok(Some(command))
}

fn required(arg: &str, usage: &str) -> Result<String> {
    if arg.is_empty() {
        bail!("usage: {usage}");
    }
    Ok(arg.to_string())
}
