//! Telegram adapter (teloxide).
//!
//! This crate implements the `pinrelay-core` MessagingPort over the Telegram
//! Bot API and turns raw updates into core `IncomingUpdate`s.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
    ApiError, RequestError,
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use pinrelay_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{EditOutcome, InlineKeyboard, MessagingCapabilities, PinnedMessage},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn msg_ref(chat_id: ChatId, msg: &Message) -> MessageRef {
        MessageRef::new(chat_id, MessageId(msg.id.0))
    }

    fn map_err(e: RequestError) -> Error {
        match e {
            RequestError::Api(
                ApiError::MessageToDeleteNotFound
                | ApiError::MessageToEditNotFound
                | ApiError::MessageIdInvalid,
            ) => Error::NotFound(format!("telegram error: {e}")),
            other => Error::External(format!("telegram error: {other}")),
        }
    }

    fn markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|b| InlineKeyboardButton::callback(b.label, b.callback_data))
                    .collect()
            })
            .collect();
        InlineKeyboardMarkup::new(rows)
    }

    /// Run `op`, waiting out one `RetryAfter` before giving up.
    async fn retry_raw<T, Fut>(
        &self,
        mut op: impl FnMut() -> Fut,
    ) -> std::result::Result<T, RequestError>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::debug!(wait = ?d, "telegram asked us to back off");
                    sleep(d).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn with_retry<T, Fut>(&self, op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        self.retry_raw(op).await.map_err(Self::map_err)
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_html: true,
            supports_pinning: true,
            max_message_len: 4096,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| self.bot.send_message(Self::tg_chat(chat_id), text.to_string()))
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let markup = Self::markup(keyboard);
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(markup.clone())
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<EditOutcome> {
        let res = self
            .retry_raw(|| {
                self.bot.edit_message_text(
                    Self::tg_chat(msg.chat_id),
                    Self::tg_msg_id(msg.message_id),
                    text.to_string(),
                )
            })
            .await;
        match res {
            Ok(_) => Ok(EditOutcome::Edited),
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(EditOutcome::Unchanged),
            Err(e) => Err(Self::map_err(e)),
        }
    }

    async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Result<MessageRef> {
        let sent = self
            .with_retry(|| {
                self.bot.forward_message(
                    Self::tg_chat(to),
                    Self::tg_chat(msg.chat_id),
                    Self::tg_msg_id(msg.message_id),
                )
            })
            .await?;
        Ok(Self::msg_ref(to, &sent))
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await?;
        Ok(())
    }

    async fn pin_message(&self, msg: MessageRef) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .pin_chat_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
                .disable_notification(true)
        })
        .await?;
        Ok(())
    }

    async fn pinned_message(&self, chat_id: ChatId) -> Result<Option<PinnedMessage>> {
        let chat = self
            .with_retry(|| self.bot.get_chat(Self::tg_chat(chat_id)))
            .await?;
        Ok(chat.pinned_message.map(|m| PinnedMessage {
            message: Self::msg_ref(chat_id, &m),
            text: m.text().or_else(|| m.caption()).map(str::to_string),
        }))
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}
