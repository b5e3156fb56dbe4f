use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{EditOutcome, InlineKeyboard, MessagingCapabilities, PinnedMessage},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Telegram API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat (Telegram ~1 msg/sec per chat).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return how long to wait before using it.
    fn reserve_at(&mut self, now: Instant) -> Duration {
        let start = self.next.max(now);
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that spaces out outbound calls.
///
/// A live relay of a busy group turns into bursts of forward + stamp pairs;
/// spacing them keeps the bot clear of most 429s. The Telegram adapter still
/// retries once on `RetryAfter`.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<ChatId, IntervalLimiter>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn throttle_chat(&self, chat_id: ChatId) {
        let now = Instant::now();
        let global_wait = self.global.lock().await.reserve_at(now);
        let chat_wait = {
            let mut map = self.per_chat.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| IntervalLimiter::new(self.cfg.per_chat_min_interval))
                .reserve_at(now)
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = self.global.lock().await.reserve_at(Instant::now());
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.throttle_chat(chat_id).await;
        self.inner.send_text(chat_id, text).await
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.throttle_chat(chat_id).await;
        self.inner.send_html(chat_id, html).await
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.throttle_chat(chat_id).await;
        self.inner.send_inline_keyboard(chat_id, html, keyboard).await
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<EditOutcome> {
        self.throttle_chat(msg.chat_id).await;
        self.inner.edit_text(msg, text).await
    }

    async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Result<MessageRef> {
        self.throttle_chat(to).await;
        self.inner.forward_message(to, msg).await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        // Deletes are not subject to the per-chat send limit.
        self.throttle_global().await;
        self.inner.delete_message(msg).await
    }

    async fn pin_message(&self, msg: MessageRef) -> Result<()> {
        self.throttle_chat(msg.chat_id).await;
        self.inner.pin_message(msg).await
    }

    async fn pinned_message(&self, chat_id: ChatId) -> Result<Option<PinnedMessage>> {
        self.throttle_global().await;
        self.inner.pinned_message(chat_id).await
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        // No chat_id available here; apply global throttling only.
        self.throttle_global().await;
        self.inner.answer_callback_query(callback_id, text).await
    }
}
