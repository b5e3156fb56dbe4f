use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{EditOutcome, InlineKeyboard, MessagingCapabilities, PinnedMessage},
    Result,
};

/// Hexagonal port for the messaging platform.
///
/// Every operation may fail; adapters report vanished messages as
/// `Error::NotFound` and byte-identical edits as `EditOutcome::Unchanged`
/// so the core never inspects error strings.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    /// Send unformatted text (no parse mode). Used for the stored document.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;
    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    /// Replace the text of an existing message (no parse mode).
    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<EditOutcome>;

    /// Forward `msg` verbatim into `to`, returning the copy's reference.
    async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Result<MessageRef>;
    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    async fn pin_message(&self, msg: MessageRef) -> Result<()>;
    /// The chat's currently pinned message, if any.
    async fn pinned_message(&self, chat_id: ChatId) -> Result<Option<PinnedMessage>>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
