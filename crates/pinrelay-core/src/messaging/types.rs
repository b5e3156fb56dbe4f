use crate::domain::{ChatId, MessageRef, UserId};

/// Incoming update model, already stripped of Telegram specifics.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Command(Command),
    GroupText(GroupMessage),
    GroupJoined(GroupJoin),
    Callback(CallbackQuery),
}

#[derive(Clone, Debug)]
pub struct Command {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub name: String,
    pub args: String,
}

/// A text message seen in a monitored group.
#[derive(Clone, Debug)]
pub struct GroupMessage {
    pub message: MessageRef,
    pub chat_title: Option<String>,
    pub text: String,
}

/// The bot was added to (or created together with) a group.
#[derive(Clone, Debug)]
pub struct GroupJoin {
    pub chat_id: ChatId,
    pub chat_title: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub callback_id: String,
    pub data: String,
    pub message: Option<MessageRef>,
}

/// Result of an edit: Telegram refuses edits that would not change anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinnedMessage {
    pub message: MessageRef,
    /// Message text; `None` for pinned media without a caption.
    pub text: Option<String>,
}

/// Inline keyboard, row by row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

impl InlineKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; empty rows are dropped.
    pub fn row(mut self, buttons: Vec<InlineButton>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    /// Convenience for "one button per row" layouts.
    pub fn one_per_row(buttons: Vec<InlineButton>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }
}

/// Capabilities / feature flags of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_html: bool,
    pub supports_pinning: bool,
    pub max_message_len: usize,
}
