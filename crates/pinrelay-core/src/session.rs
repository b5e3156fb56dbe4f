use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::port::MessagingPort,
};

/// Where a recipient's UI interaction currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Browsing,
    LiveMonitoring(ChatId),
}

#[derive(Debug, Default)]
struct Session {
    live_target: Option<ChatId>,
    transient: Vec<MessageRef>,
}

impl Session {
    fn state(&self) -> SessionState {
        match self.live_target {
            Some(chat) => SessionState::LiveMonitoring(chat),
            None if self.transient.is_empty() => SessionState::Idle,
            None => SessionState::Browsing,
        }
    }
}

/// Per-recipient UI state: the live relay target and every message created
/// during the current interaction, so it can be deleted again.
///
/// In-memory only; live relays do not survive a restart.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self, user: UserId) -> SessionState {
        self.sessions
            .lock()
            .await
            .get(&user)
            .map(Session::state)
            .unwrap_or(SessionState::Idle)
    }

    pub async fn live_target(&self, user: UserId) -> Option<ChatId> {
        self.sessions
            .lock()
            .await
            .get(&user)
            .and_then(|s| s.live_target)
    }

    /// Recipients currently live-relaying `chat`.
    pub async fn live_recipients(&self, chat: ChatId) -> Vec<UserId> {
        self.sessions
            .lock()
            .await
            .iter()
            .filter(|(_, s)| s.live_target == Some(chat))
            .map(|(user, _)| *user)
            .collect()
    }

    pub async fn transient_messages(&self, user: UserId) -> Vec<MessageRef> {
        self.sessions
            .lock()
            .await
            .get(&user)
            .map(|s| s.transient.clone())
            .unwrap_or_default()
    }

    /// Track messages created for `user` so the next cleanup removes them.
    pub async fn record(&self, user: UserId, messages: impl IntoIterator<Item = MessageRef>) {
        let mut sessions = self.sessions.lock().await;
        let transient = &mut sessions.entry(user).or_default().transient;
        for msg in messages {
            if !transient.contains(&msg) {
                transient.push(msg);
            }
        }
    }

    /// Delete every tracked message and return the session to `Idle`.
    ///
    /// Runs before every menu/page render and on stop/close. Deletion is
    /// best-effort: messages the recipient already removed are skipped silently.
    pub async fn cleanup(&self, user: UserId, messenger: &dyn MessagingPort) {
        let stale = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(&user) {
                Some(s) => {
                    s.live_target = None;
                    std::mem::take(&mut s.transient)
                }
                None => return,
            }
        };

        if !stale.is_empty() {
            debug!(user = %user, count = stale.len(), "deleting transient messages");
        }
        for msg in stale {
            match messenger.delete_message(msg).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(
                    chat = %msg.chat_id,
                    message_id = %msg.message_id,
                    "failed to delete transient message: {e}"
                ),
            }
        }
    }

    /// Clean up, then start relaying `chat` to `user`.
    pub async fn start_live(&self, user: UserId, chat: ChatId, messenger: &dyn MessagingPort) {
        self.cleanup(user, messenger).await;
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(user).or_default();
        session.live_target = Some(chat);
        session.transient.clear();
    }

    /// End a live relay, deleting the relayed transcript.
    pub async fn stop_live(&self, user: UserId, messenger: &dyn MessagingPort) -> Option<ChatId> {
        let target = self.live_target(user).await;
        self.cleanup(user, messenger).await;
        target
    }

    /// Record relayed messages, but only if `user` is still live on `chat`
    /// (a stop may have landed while the forward was in flight).
    pub async fn record_relayed(
        &self,
        user: UserId,
        chat: ChatId,
        messages: impl IntoIterator<Item = MessageRef>,
    ) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&user) {
            Some(s) if s.live_target == Some(chat) => {
                s.transient.extend(messages);
                true
            }
            _ => false,
        }
    }
}
