//! In-memory messenger shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{EditOutcome, InlineKeyboard, MessagingCapabilities, PinnedMessage},
    },
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Send(ChatId, String),
    Keyboard(ChatId, String, InlineKeyboard),
    Edit(MessageRef, String),
    Forward(ChatId, MessageRef),
    Delete(MessageRef),
    Pin(MessageRef),
    Answer(String, Option<String>),
}

#[derive(Default)]
struct Inner {
    next_id: i32,
    messages: HashMap<ChatId, Vec<(MessageId, String)>>,
    pinned: HashMap<ChatId, MessageId>,
    calls: Vec<Call>,
}

impl Inner {
    fn alloc(&mut self, chat_id: ChatId, text: String) -> MessageRef {
        self.next_id += 1;
        let id = MessageId(self.next_id);
        self.messages.entry(chat_id).or_default().push((id, text));
        MessageRef::new(chat_id, id)
    }

    fn text_mut(&mut self, msg: MessageRef) -> Option<&mut String> {
        self.messages
            .get_mut(&msg.chat_id)?
            .iter_mut()
            .find(|(id, _)| *id == msg.message_id)
            .map(|(_, text)| text)
    }
}

#[derive(Default)]
pub struct FakeMessenger {
    inner: Mutex<Inner>,
    pub fail_forwards: AtomicBool,
    pub fail_pinned_lookup: AtomicBool,
}

impl FakeMessenger {
    /// Create a message directly (e.g. a group message that will be relayed).
    pub fn seed(&self, chat_id: ChatId, text: &str) -> MessageRef {
        self.inner.lock().unwrap().alloc(chat_id, text.to_string())
    }

    /// Create a message and pin it.
    pub fn seed_pinned(&self, chat_id: ChatId, text: &str) -> MessageRef {
        let mut inner = self.inner.lock().unwrap();
        let msg = inner.alloc(chat_id, text.to_string());
        inner.pinned.insert(chat_id, msg.message_id);
        msg
    }

    pub fn pinned_text(&self, chat_id: ChatId) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        let id = *inner.pinned.get(&chat_id)?;
        inner.text_mut(MessageRef::new(chat_id, id)).cloned()
    }

    /// Texts of the messages currently alive in `chat_id`, oldest first.
    pub fn texts(&self, chat_id: ChatId) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .messages
            .get(&chat_id)
            .map(|v| v.iter().map(|(_, t)| t.clone()).collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn deletes(&self) -> Vec<MessageRef> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn forwards(&self) -> Vec<(ChatId, MessageRef)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Forward(to, m) => Some((to, m)),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Edit(..)))
            .count()
    }

    /// Most recent inline keyboard sent to `chat_id`.
    pub fn last_keyboard(&self, chat_id: ChatId) -> Option<(String, InlineKeyboard)> {
        self.calls().into_iter().rev().find_map(|c| match c {
            Call::Keyboard(chat, html, kb) if chat == chat_id => Some((html, kb)),
            _ => None,
        })
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_html: true,
            supports_pinning: true,
            max_message_len: 4096,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Send(chat_id, text.to_string()));
        Ok(inner.alloc(chat_id, text.to_string()))
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.send_text(chat_id, html).await
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .calls
            .push(Call::Keyboard(chat_id, html.to_string(), keyboard));
        Ok(inner.alloc(chat_id, html.to_string()))
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<EditOutcome> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Edit(msg, text.to_string()));
        let current = inner
            .text_mut(msg)
            .ok_or_else(|| Error::NotFound(format!("message {} not found", msg.message_id)))?;
        if current == text {
            return Ok(EditOutcome::Unchanged);
        }
        *current = text.to_string();
        Ok(EditOutcome::Edited)
    }

    async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Result<MessageRef> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Forward(to, msg));
        if self.fail_forwards.load(Ordering::SeqCst) {
            return Err(Error::External("forward rejected".to_string()));
        }
        let text = inner.text_mut(msg).cloned().unwrap_or_default();
        Ok(inner.alloc(to, text))
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Delete(msg));
        let list = inner
            .messages
            .get_mut(&msg.chat_id)
            .ok_or_else(|| Error::NotFound("chat has no messages".to_string()))?;
        let before = list.len();
        list.retain(|(id, _)| *id != msg.message_id);
        if list.len() == before {
            return Err(Error::NotFound(format!(
                "message {} not found",
                msg.message_id
            )));
        }
        Ok(())
    }

    async fn pin_message(&self, msg: MessageRef) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Pin(msg));
        inner.pinned.insert(msg.chat_id, msg.message_id);
        Ok(())
    }

    async fn pinned_message(&self, chat_id: ChatId) -> Result<Option<PinnedMessage>> {
        if self.fail_pinned_lookup.load(Ordering::SeqCst) {
            return Err(Error::External("chat not found".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        let Some(id) = inner.pinned.get(&chat_id).copied() else {
            return Ok(None);
        };
        let message = MessageRef::new(chat_id, id);
        let text = inner.text_mut(message).cloned();
        Ok(Some(PinnedMessage { message, text }))
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.inner.lock().unwrap().calls.push(Call::Answer(
            callback_id.to_string(),
            text.map(str::to_string),
        ));
        Ok(())
    }
}
