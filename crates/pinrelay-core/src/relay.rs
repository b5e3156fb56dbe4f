//! Orchestration of keyword capture, browsing and live relays.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::{
    actions::{UiAction, View},
    config::Config,
    domain::{ChatId, MessageRef, UserId},
    keywords::{extract_code, KeywordMatcher},
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, Command, GroupJoin, GroupMessage, IncomingUpdate},
    },
    pagination::page,
    render,
    session::SessionManager,
    store::{DocumentStore, Entry, StoreLimits, UNKNOWN_CHAT_TITLE},
    Result,
};

#[derive(Clone, Debug)]
pub struct RelaySettings {
    pub recipient: UserId,
    pub page_size: usize,
    pub preview_length: usize,
    pub forward_matches: bool,
}

impl From<&Config> for RelaySettings {
    fn from(cfg: &Config) -> Self {
        Self {
            recipient: cfg.recipient,
            page_size: cfg.page_size,
            preview_length: cfg.preview_length,
            forward_matches: cfg.forward_matches,
        }
    }
}

/// Owns every piece of runtime state; handlers get it by reference.
pub struct RelayService {
    settings: RelaySettings,
    messenger: Arc<dyn MessagingPort>,
    store: DocumentStore,
    matcher: KeywordMatcher,
    sessions: SessionManager,
}

impl RelayService {
    pub fn new(cfg: &Config, messenger: Arc<dyn MessagingPort>) -> Self {
        let store = DocumentStore::new(
            messenger.clone(),
            cfg.data_channel,
            StoreLimits {
                max_entries: cfg.history_limit,
                max_message_len: cfg.telegram_message_limit,
            },
        );
        Self::from_parts(
            RelaySettings::from(cfg),
            messenger,
            store,
            KeywordMatcher::new(&cfg.keywords),
        )
    }

    pub fn from_parts(
        settings: RelaySettings,
        messenger: Arc<dyn MessagingPort>,
        store: DocumentStore,
        matcher: KeywordMatcher,
    ) -> Self {
        Self {
            settings,
            messenger,
            store,
            matcher,
            sessions: SessionManager::new(),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn recipient_chat(&self) -> ChatId {
        ChatId::from(self.settings.recipient)
    }

    /// Locate or create the pinned document. The bot keeps running (without
    /// persistence) if this fails.
    pub async fn start(&self) -> bool {
        if self.matcher.is_empty() {
            warn!("no trigger words configured, nothing will be captured");
        }
        self.store.initialize().await
    }

    pub async fn handle(&self, update: IncomingUpdate) -> Result<()> {
        match update {
            IncomingUpdate::GroupText(msg) => self.on_group_message(msg).await,
            IncomingUpdate::GroupJoined(join) => self.on_group_joined(join).await,
            IncomingUpdate::Command(cmd) => self.on_command(cmd).await,
            IncomingUpdate::Callback(q) => self.on_callback(q).await,
        }
    }

    // ============== Inbound group traffic ==============

    pub async fn on_group_message(&self, msg: GroupMessage) -> Result<()> {
        let source = msg.message.chat_id;
        let title = msg.chat_title.as_deref().unwrap_or(UNKNOWN_CHAT_TITLE);

        let live = self.sessions.live_recipients(source).await;
        for user in &live {
            if let Err(e) = self.relay_live(*user, &msg, title).await {
                error!(
                    chat = %source,
                    message_id = %msg.message.message_id,
                    user = %user,
                    "live relay failed: {e}"
                );
            }
        }

        if !self.matcher.matches(&msg.text) {
            return Ok(());
        }

        if self.settings.forward_matches && !live.contains(&self.settings.recipient) {
            self.forward_match(&msg, title).await;
        }

        let entry = Entry::new(
            msg.chat_title.as_deref(),
            msg.text.clone(),
            extract_code(&msg.text),
            Utc::now(),
        );
        self.store.append(entry).await?;
        info!(chat = %source, title, "captured matching message");
        Ok(())
    }

    async fn forward_match(&self, msg: &GroupMessage, title: &str) {
        let to = self.recipient_chat();
        if let Err(e) = self.messenger.forward_message(to, msg.message).await {
            error!(
                chat = %msg.message.chat_id,
                message_id = %msg.message.message_id,
                "failed to forward matching message: {e}"
            );
            if let Err(e) = self
                .messenger
                .send_html(to, &render::forward_failed(title))
                .await
            {
                warn!("failed to notify recipient about forward failure: {e}");
            }
        }
    }

    async fn relay_live(&self, user: UserId, msg: &GroupMessage, title: &str) -> Result<()> {
        let to = ChatId::from(user);
        let forwarded = self.messenger.forward_message(to, msg.message).await?;
        let mut relayed = vec![forwarded];

        match self
            .messenger
            .send_html(to, &render::relay_stamp(title, &Utc::now()))
            .await
        {
            Ok(stamp) => relayed.push(stamp),
            Err(e) => warn!(user = %user, "failed to send relay stamp: {e}"),
        }

        if !self
            .sessions
            .record_relayed(user, msg.message.chat_id, relayed.iter().copied())
            .await
        {
            // Stopped while we were forwarding.
            for m in relayed {
                match self.messenger.delete_message(m).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => warn!(
                        chat = %m.chat_id,
                        message_id = %m.message_id,
                        "failed to delete late relayed message: {e}"
                    ),
                }
            }
        }
        Ok(())
    }

    pub async fn on_group_joined(&self, join: GroupJoin) -> Result<()> {
        let title = join.chat_title.as_deref().unwrap_or(UNKNOWN_CHAT_TITLE);
        if self.store.register_group(join.chat_id, title).await? {
            info!(chat = %join.chat_id, title, "registered group");
        }
        Ok(())
    }

    // ============== Recipient UI ==============

    pub async fn on_command(&self, cmd: Command) -> Result<()> {
        if cmd.user_id != self.settings.recipient {
            debug!(user = %cmd.user_id, command = %cmd.name, "ignoring command from non-recipient");
            return Ok(());
        }
        let user = cmd.user_id;

        match cmd.name.as_str() {
            "start" => {
                self.messenger
                    .send_html(cmd.chat_id, &render::greeting())
                    .await?;
                Ok(())
            }
            "menu" => self.show_menu(user).await,
            "stop" => {
                self.stop_live(user).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub async fn on_callback(&self, q: CallbackQuery) -> Result<()> {
        if q.user_id != self.settings.recipient {
            self.answer(&q.callback_id, Some("Unauthorized")).await;
            return Ok(());
        }
        let user = q.user_id;

        let Some(action) = UiAction::parse(&q.data) else {
            debug!(data = %q.data, "ignoring unknown callback data");
            self.answer(&q.callback_id, None).await;
            return Ok(());
        };

        let notice = match action {
            UiAction::Stop => Some("Live relay stopped"),
            _ => None,
        };
        self.answer(&q.callback_id, notice).await;

        // Menus from before a restart are not tracked; adopt the pressed one
        // so cleanup removes it.
        if let Some(pressed) = q.message {
            self.sessions.record(user, [pressed]).await;
        }

        match action {
            UiAction::Menu => self.show_menu(user).await,
            UiAction::View { view, page } => self.show_page(user, view, page).await,
            UiAction::Groups => self.show_groups(user).await,
            UiAction::Live(chat) => self.start_live(user, chat).await,
            UiAction::Stop => {
                self.stop_live(user).await;
                Ok(())
            }
            UiAction::Close => {
                self.sessions.cleanup(user, self.messenger.as_ref()).await;
                Ok(())
            }
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.messenger.answer_callback_query(callback_id, text).await {
            debug!("failed to answer callback query: {e}");
        }
    }

    async fn show_menu(&self, user: UserId) -> Result<()> {
        self.sessions.cleanup(user, self.messenger.as_ref()).await;
        let (html, keyboard) = render::main_menu();
        let sent = self
            .messenger
            .send_inline_keyboard(ChatId::from(user), &html, keyboard)
            .await?;
        self.sessions.record(user, [sent]).await;
        Ok(())
    }

    async fn show_page(&self, user: UserId, view: View, page_index: usize) -> Result<()> {
        self.sessions.cleanup(user, self.messenger.as_ref()).await;

        let doc = self.store.read().await;
        let items: Vec<Entry> = match view {
            View::All => doc.entries,
            View::Codes => doc
                .entries
                .into_iter()
                .filter(|e| e.has_code())
                .collect(),
        };
        let window = page(&items, page_index, self.settings.page_size);
        let (html, keyboard) = render::browse_page(view, &window, self.settings.preview_length);

        let sent = self
            .messenger
            .send_inline_keyboard(ChatId::from(user), &html, keyboard)
            .await?;
        self.sessions.record(user, [sent]).await;
        Ok(())
    }

    async fn show_groups(&self, user: UserId) -> Result<()> {
        self.sessions.cleanup(user, self.messenger.as_ref()).await;

        let groups = self.store.read().await.groups();
        let (html, keyboard) = render::group_picker(&groups);
        let sent = self
            .messenger
            .send_inline_keyboard(ChatId::from(user), &html, keyboard)
            .await?;
        self.sessions.record(user, [sent]).await;
        Ok(())
    }

    async fn start_live(&self, user: UserId, chat: ChatId) -> Result<()> {
        self.sessions
            .start_live(user, chat, self.messenger.as_ref())
            .await;

        let doc = self.store.read().await;
        let title = doc
            .group_name(chat)
            .map(str::to_string)
            .unwrap_or_else(|| chat.to_string());
        info!(user = %user, chat = %chat, "live relay started");

        let (html, keyboard) = render::live_banner(&title);
        let banner = self
            .messenger
            .send_inline_keyboard(ChatId::from(user), &html, keyboard)
            .await?;
        self.sessions.record_relayed(user, chat, [banner]).await;
        Ok(())
    }

    async fn stop_live(&self, user: UserId) {
        if let Some(chat) = self.sessions.stop_live(user, self.messenger.as_ref()).await {
            info!(user = %user, chat = %chat, "live relay stopped");
        }
    }

    /// Every tracked message of `user`, oldest first.
    pub async fn transient_messages(&self, user: UserId) -> Vec<MessageRef> {
        self.sessions.transient_messages(user).await
    }
}
