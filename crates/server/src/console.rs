//! Attribute console
//!
//! Line commands read from stdin in service mode:
//!
//! ```text
//! list               show every session
//! get [id]           read a session's ledmask
//! set <hex> [id]     write a session's ledmask
//! help
//! ```
//!
//! `id` is either a bare number or the `xylo<n>` form. Without one the
//! lowest-numbered session is used.

use anyhow::{Result, anyhow, bail};
use common::UsbBridge;
use protocol::{SessionId, SessionInfo};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Get { session: Option<SessionId> },
    Set { text: String, session: Option<SessionId> },
    Help,
}

pub const HELP: &str = "commands: list | get [id] | set <hex> [id] | help";

/// Parse one console line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb {
        "list" | "ls" => ConsoleCommand::List,
        "get" => ConsoleCommand::Get {
            session: words.next().map(parse_session_id).transpose()?,
        },
        "set" => {
            let text = words
                .next()
                .ok_or_else(|| anyhow!("usage: set <hex> [id]"))?
                .to_string();
            ConsoleCommand::Set {
                text,
                session: words.next().map(parse_session_id).transpose()?,
            }
        }
        "help" | "?" => ConsoleCommand::Help,
        other => bail!("unknown command '{}' ({})", other, HELP),
    };

    if let Some(extra) = words.next() {
        bail!("unexpected argument '{}'", extra);
    }
    Ok(Some(command))
}

/// Accepts `3` or `xylo3`
pub fn parse_session_id(word: &str) -> Result<SessionId> {
    let digits = word.strip_prefix("xylo").unwrap_or(word);
    digits
        .parse()
        .map(SessionId)
        .map_err(|_| anyhow!("invalid session id '{}'", word))
}

/// Run a command against the USB thread and render the reply
pub async fn execute(bridge: &UsbBridge, command: ConsoleCommand) -> Result<String> {
    match command {
        ConsoleCommand::Help => Ok(HELP.to_string()),
        ConsoleCommand::List => Ok(render_sessions(&bridge.list_sessions().await?)),
        ConsoleCommand::Get { session } => {
            let id = resolve(bridge, session).await?;
            let text = bridge.read_attribute(id).await?;
            Ok(format!("{}: {}", id, text.trim_end()))
        }
        ConsoleCommand::Set { text, session } => {
            let id = resolve(bridge, session).await?;
            let consumed = bridge.write_attribute(id, &text).await?;
            Ok(format!("{}: wrote {} byte(s)", id, consumed))
        }
    }
}

/// Pick the requested session or the first one
pub async fn resolve(bridge: &UsbBridge, session: Option<SessionId>) -> Result<SessionId> {
    if let Some(id) = session {
        return Ok(id);
    }
    bridge
        .list_sessions()
        .await?
        .first()
        .map(|s| s.id)
        .ok_or_else(|| anyhow!("no Xylo card attached"))
}

pub fn render_sessions(sessions: &[SessionInfo]) -> String {
    if sessions.is_empty() {
        return "no sessions".to_string();
    }

    let mut out = String::new();
    for s in sessions {
        let location = s
            .location
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<8} {:<8} {:<12} {:#04x}",
            s.id.to_string(),
            location,
            s.state.to_string(),
            s.ledmask
        );
    }
    out.truncate(out.trim_end().len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::create_mock_session_info;
    use protocol::SessionState;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("  ").unwrap(), None);
        assert_eq!(parse_line("list").unwrap(), Some(ConsoleCommand::List));
        assert_eq!(
            parse_line("get").unwrap(),
            Some(ConsoleCommand::Get { session: None })
        );
        assert_eq!(
            parse_line("get xylo2").unwrap(),
            Some(ConsoleCommand::Get {
                session: Some(SessionId(2))
            })
        );
        assert_eq!(
            parse_line("set 0xa5 3").unwrap(),
            Some(ConsoleCommand::Set {
                text: "0xa5".to_string(),
                session: Some(SessionId(3))
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("set").is_err());
        assert!(parse_line("get one").is_err());
        assert!(parse_line("frobnicate").is_err());
        assert!(parse_line("get 1 2").is_err());
    }

    #[test]
    fn test_render_sessions() {
        assert_eq!(render_sessions(&[]), "no sessions");

        let rendered = render_sessions(&[
            create_mock_session_info(1, SessionState::Ready, 0xa5),
            create_mock_session_info(2, SessionState::Failed, 0),
        ]);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("xylo1"));
        assert!(lines[0].contains("ready"));
        assert!(lines[0].ends_with("0xa5"));
        assert!(lines[1].contains("failed"));
    }
}
