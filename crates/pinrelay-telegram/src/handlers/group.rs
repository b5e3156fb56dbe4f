use teloxide::types::{Message, MessageKind, UserId as TgUserId};

use pinrelay_core::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::types::{GroupJoin, GroupMessage, IncomingUpdate},
};

/// Group traffic: the bot joining, or an ordinary message to scan and relay.
pub(super) fn to_update(msg: &Message, bot_id: TgUserId) -> Option<IncomingUpdate> {
    let chat_id = ChatId(msg.chat.id.0);
    let chat_title = msg.chat.title().map(str::to_string);

    let bot_added = msg
        .new_chat_members()
        .is_some_and(|members| members.iter().any(|u| u.id == bot_id));
    let created = matches!(
        msg.kind,
        MessageKind::GroupChatCreated(_) | MessageKind::SupergroupChatCreated(_)
    );
    if bot_added || created {
        return Some(IncomingUpdate::GroupJoined(GroupJoin {
            chat_id,
            chat_title,
        }));
    }

    // Service messages (pins, title changes, ...) cannot be forwarded.
    if !matches!(msg.kind, MessageKind::Common(_)) {
        return None;
    }

    if msg.text().is_some_and(is_command) {
        return None;
    }

    // Media without a caption is still relayed live, it just never matches.
    let text = msg
        .text()
        .or_else(|| msg.caption())
        .unwrap_or_default()
        .to_string();

    Some(IncomingUpdate::GroupText(GroupMessage {
        message: MessageRef::new(chat_id, MessageId(msg.id.0)),
        chat_title,
        text,
    }))
}

/// Slash commands are addressed to bots, not content to capture or relay.
fn is_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}
