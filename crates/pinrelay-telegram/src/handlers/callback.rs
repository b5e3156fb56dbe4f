use teloxide::types::CallbackQuery as TgCallbackQuery;

use pinrelay_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::types::{CallbackQuery, IncomingUpdate},
};

pub(super) fn to_update(q: &TgCallbackQuery) -> IncomingUpdate {
    let user_id = UserId(q.from.id.0 as i64);
    let message = q
        .message
        .as_ref()
        .map(|m| MessageRef::new(ChatId(m.chat.id.0), MessageId(m.id.0)));

    IncomingUpdate::Callback(CallbackQuery {
        chat_id: message.map(|m| m.chat_id).unwrap_or(ChatId::from(user_id)),
        user_id,
        callback_id: q.id.clone(),
        data: q.data.clone().unwrap_or_default(),
        message,
    })
}
