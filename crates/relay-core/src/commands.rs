//! In-chat control commands.
//!
//! Only one kind of command exists: switching the forward target. It comes in
//! two shapes, `/<digits>` and `/setgroup <id>`.

use crate::{domain::ChatId, errors::Error, Result};

/// Prefix Telegram puts in front of supergroup/channel ids.
pub const SUPERGROUP_PREFIX: &str = "-100";

/// Split `/cmd@botname arg1 ...` into a lowercase command name and the rest.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    Some((cmd, rest))
}

/// Target chat named by a command.
pub fn parse_target(cmd: &str, args: &str) -> Result<ChatId> {
    let token = if cmd == "setgroup" {
        args.split_whitespace().next().unwrap_or("")
    } else {
        cmd
    };

    if token.is_empty() {
        return Err(Error::Config(
            "missing target id (usage: /setgroup <id> or /<id>)".to_string(),
        ));
    }

    let raw = if token.starts_with('-') {
        token.to_string()
    } else {
        format!("{SUPERGROUP_PREFIX}{token}")
    };

    raw.parse::<i64>()
        .map(ChatId)
        .map_err(|e| Error::Config(format!("invalid target id {token:?}: {e}")))
}
