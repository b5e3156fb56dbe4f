use teloxide::types::Message;

use pinrelay_core::{
    domain::{ChatId, UserId},
    messaging::types::{Command, IncomingUpdate},
};

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Private-chat messages: only `/commands` are of interest.
pub(super) fn to_update(msg: &Message) -> Option<IncomingUpdate> {
    let text = msg.text()?;
    if !text.starts_with('/') {
        return None;
    }
    let user = msg.from()?;
    let (name, args) = parse_command(text);
    if name.is_empty() {
        return None;
    }

    Some(IncomingUpdate::Command(Command {
        chat_id: ChatId(msg.chat.id.0),
        user_id: UserId(user.id.0 as i64),
        name,
        args,
    }))
}
