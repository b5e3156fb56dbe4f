//! The pinned-message document store.
//!
//! The whole persisted state is one JSON document kept as the text of a pinned
//! message in a private channel. Every mutation is a full read-modify-write of
//! that text.
//!
//! Precondition: a single process is the only writer. Two overlapping
//! read-modify-write cycles both start from the same snapshot and the later
//! write wins, dropping the other's change. Supporting several writers would
//! need a version token compared on write and a retry on conflict.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    domain::{ChatId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::EditOutcome},
    Result,
};

/// Title stored when the source chat has none.
pub const UNKNOWN_CHAT_TITLE: &str = "Unknown";

/// Entries dropped per round when the serialized document is too long.
const EVICTION_BATCH: usize = 10;

/// One captured keyword match. Never edited after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub chat_title: String,
    pub message_text: String,
    #[serde(rename = "gutschein_code", default)]
    pub code: Option<String>,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Entry {
    pub fn new(
        chat_title: Option<&str>,
        message_text: impl Into<String>,
        code: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let chat_title = chat_title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_CHAT_TITLE)
            .to_string();
        Self {
            chat_title,
            message_text: message_text.into(),
            code,
            timestamp,
        }
    }

    /// Whether a non-empty code was extracted.
    pub fn has_code(&self) -> bool {
        self.code.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// Chat id (as decimal string) -> display name.
pub type GroupRegistry = BTreeMap<String, String>;

/// The sole persisted aggregate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "messages", default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub groups: GroupRegistry,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Newest first; ties keep their relative order.
    pub fn sort_newest_first(&mut self) {
        self.entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    /// Record a group's display name. Returns `false` if nothing changed.
    pub fn register_group(&mut self, chat_id: ChatId, title: &str) -> bool {
        let key = chat_id.0.to_string();
        if self.groups.get(&key).map(String::as_str) == Some(title) {
            return false;
        }
        self.groups.insert(key, title.to_string());
        true
    }

    /// Registered groups with parseable ids, ordered by name.
    pub fn groups(&self) -> Vec<(ChatId, String)> {
        let mut out: Vec<(ChatId, String)> = self
            .groups
            .iter()
            .filter_map(|(id, name)| id.parse::<i64>().ok().map(|id| (ChatId(id), name.clone())))
            .collect();
        out.sort_by(|a, b| a.1.to_lowercase().cmp(&b.1.to_lowercase()).then(a.0.cmp(&b.0)));
        out
    }

    pub fn group_name(&self, chat_id: ChatId) -> Option<&str> {
        self.groups.get(&chat_id.0.to_string()).map(String::as_str)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StoreLimits {
    /// Maximum number of entries kept (oldest evicted first).
    pub max_entries: usize,
    /// Maximum length of the serialized document, in UTF-16 code units
    /// (the unit Telegram counts message length in).
    pub max_message_len: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_entries: 200,
            max_message_len: 4096,
        }
    }
}

pub struct DocumentStore {
    messenger: Arc<dyn MessagingPort>,
    channel: ChatId,
    limits: StoreLimits,
    handle: Mutex<Option<MessageRef>>,
}

impl DocumentStore {
    pub fn new(messenger: Arc<dyn MessagingPort>, channel: ChatId, limits: StoreLimits) -> Self {
        let platform_max = messenger.capabilities().max_message_len;
        let limits = StoreLimits {
            max_message_len: limits.max_message_len.min(platform_max),
            ..limits
        };
        Self {
            messenger,
            channel,
            limits,
            handle: Mutex::new(None),
        }
    }

    /// The pinned record, once `initialize` succeeded.
    pub async fn handle(&self) -> Option<MessageRef> {
        *self.handle.lock().await
    }

    /// Locate the pinned record, or create and pin an empty one.
    ///
    /// Fails soft: on a remote error the store stays without a handle, reads
    /// return an empty document and writes do nothing.
    pub async fn initialize(&self) -> bool {
        match self.locate_or_create().await {
            Ok(msg) => {
                *self.handle.lock().await = Some(msg);
                true
            }
            Err(e) => {
                error!(
                    channel = %self.channel,
                    "failed to initialize document store: {e}; \
                     make sure the bot is an admin of the channel and may edit and pin messages"
                );
                false
            }
        }
    }

    async fn locate_or_create(&self) -> Result<MessageRef> {
        if let Some(pinned) = self.messenger.pinned_message(self.channel).await? {
            info!(
                channel = %self.channel,
                message_id = %pinned.message.message_id,
                "found pinned document"
            );
            return Ok(pinned.message);
        }

        warn!(channel = %self.channel, "no pinned document found, creating a new one");
        let text = serde_json::to_string_pretty(&Document::default())?;
        let msg = self.messenger.send_text(self.channel, &text).await?;
        self.messenger.pin_message(msg).await?;
        info!(
            channel = %self.channel,
            message_id = %msg.message_id,
            "created and pinned a new document"
        );
        Ok(msg)
    }

    /// Fetch and parse the current document.
    ///
    /// Never fails: unreadable or unparseable content yields an empty
    /// document. Used for display only; mutations go through `fetch`.
    pub async fn read(&self) -> Document {
        match self.fetch().await {
            Ok(doc) => doc,
            Err(e) => {
                error!(channel = %self.channel, "failed to read document: {e}");
                Document::default()
            }
        }
    }

    /// Source for every read-modify-write. Remote failures and foreign pins
    /// are errors; only unparseable text yields an empty document.
    async fn fetch(&self) -> Result<Document> {
        let Some(handle) = self.handle().await else {
            return Ok(Document::default());
        };

        let Some(pinned) = self.messenger.pinned_message(self.channel).await? else {
            return Err(Error::External(
                "document is no longer pinned in the data channel".to_string(),
            ));
        };

        if pinned.message != handle {
            return Err(Error::External(format!(
                "message {} is pinned in the data channel instead of document {}",
                pinned.message.message_id, handle.message_id
            )));
        }

        let Some(text) = pinned.text else {
            warn!("pinned document has no text, starting empty");
            return Ok(Document::default());
        };

        match Document::parse(&text) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!("document is corrupt or in a legacy format, starting empty: {e}");
                Ok(Document::default())
            }
        }
    }

    /// Normalize, serialize and store `doc`.
    ///
    /// Writing content identical to what is stored is a successful no-op.
    pub async fn write(&self, mut doc: Document) -> Result<()> {
        let Some(handle) = self.handle().await else {
            debug!("document store is not initialized, skipping write");
            return Ok(());
        };

        let text = self.serialize_within_limits(&mut doc)?;
        match self.messenger.edit_text(handle, &text).await? {
            EditOutcome::Edited => debug!(entries = doc.entries.len(), "document written"),
            EditOutcome::Unchanged => debug!("document unchanged"),
        }
        Ok(())
    }

    /// Append one entry (read-modify-write).
    pub async fn append(&self, entry: Entry) -> Result<()> {
        let mut doc = self.fetch().await?;
        doc.entries.insert(0, entry);
        self.write(doc).await
    }

    /// Add or rename a group in the registry. Returns whether a write happened.
    pub async fn register_group(&self, chat_id: ChatId, title: &str) -> Result<bool> {
        let mut doc = self.fetch().await?;
        if !doc.register_group(chat_id, title) {
            return Ok(false);
        }
        self.write(doc).await?;
        Ok(true)
    }

    /// Sort, apply the entry cap, then drop the oldest entries in batches
    /// until the pretty-printed JSON fits into one message.
    fn serialize_within_limits(&self, doc: &mut Document) -> Result<String> {
        doc.sort_newest_first();
        doc.entries.truncate(self.limits.max_entries);

        loop {
            let text = serde_json::to_string_pretty(doc)?;
            let len = text.encode_utf16().count();
            if len <= self.limits.max_message_len {
                return Ok(text);
            }
            if doc.entries.is_empty() {
                return Err(Error::External(format!(
                    "document is {len} characters long even without entries (limit {})",
                    self.limits.max_message_len
                )));
            }

            let keep = doc.entries.len().saturating_sub(EVICTION_BATCH);
            warn!(
                dropped = doc.entries.len() - keep,
                remaining = keep,
                "document exceeds the message limit, dropping oldest entries"
            );
            doc.entries.truncate(keep);
        }
    }
}

/// RFC 3339 on the way out; offset-less ISO-8601 is accepted as UTC on the way
/// in, which is how earlier deployments wrote timestamps.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw:?}")))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMessenger;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::Ordering;

    const CHANNEL: ChatId = ChatId(-1001);

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn entry(title: &str, minutes: i64) -> Entry {
        Entry::new(Some(title), format!("msg from {title}"), None, at(minutes))
    }

    async fn ready_store(limits: StoreLimits) -> (Arc<FakeMessenger>, DocumentStore) {
        let fake = Arc::new(FakeMessenger::default());
        let store = DocumentStore::new(fake.clone(), CHANNEL, limits);
        assert!(store.initialize().await);
        (fake, store)
    }

    #[tokio::test]
    async fn initialize_creates_and_pins_an_empty_document() {
        let (fake, store) = ready_store(StoreLimits::default()).await;

        let handle = store.handle().await.unwrap();
        assert_eq!(handle.chat_id, CHANNEL);
        let text = fake.pinned_text(CHANNEL).unwrap();
        assert_eq!(Document::parse(&text).unwrap(), Document::default());
        assert_eq!(store.read().await, Document::default());
    }

    #[tokio::test]
    async fn initialize_adopts_the_existing_pinned_record() {
        let fake = Arc::new(FakeMessenger::default());
        let existing = fake.seed_pinned(CHANNEL, r#"{"messages": [], "groups": {"-5": "Deals"}}"#);
        let store = DocumentStore::new(fake.clone(), CHANNEL, StoreLimits::default());

        assert!(store.initialize().await);
        assert_eq!(store.handle().await, Some(existing));
        assert_eq!(store.read().await.group_name(ChatId(-5)), Some("Deals"));
        assert_eq!(fake.texts(CHANNEL).len(), 1);
    }

    #[tokio::test]
    async fn failed_initialize_leaves_a_no_op_store() {
        let fake = Arc::new(FakeMessenger::default());
        fake.fail_pinned_lookup.store(true, Ordering::SeqCst);
        let store = DocumentStore::new(fake.clone(), CHANNEL, StoreLimits::default());

        assert!(!store.initialize().await);
        assert_eq!(store.handle().await, None);
        assert_eq!(store.read().await, Document::default());
        store.append(entry("a", 0)).await.unwrap();
        assert_eq!(fake.edits(), 0);
    }

    #[tokio::test]
    async fn corrupt_content_reads_as_empty_and_is_overwritten() {
        let fake = Arc::new(FakeMessenger::default());
        fake.seed_pinned(CHANNEL, "Reading data...");
        let store = DocumentStore::new(fake.clone(), CHANNEL, StoreLimits::default());
        store.initialize().await;

        assert_eq!(store.read().await, Document::default());

        store.append(entry("a", 0)).await.unwrap();
        assert_eq!(store.read().await.entries.len(), 1);
    }

    async fn store_with_three_entries() -> (Arc<FakeMessenger>, DocumentStore) {
        let (fake, store) = ready_store(StoreLimits::default()).await;
        for m in 0..3 {
            store.append(entry(&format!("g{m}"), m)).await.unwrap();
        }
        (fake, store)
    }

    #[tokio::test]
    async fn append_after_a_failed_lookup_keeps_history() {
        let (fake, store) = store_with_three_entries().await;
        let edits = fake.edits();

        fake.fail_pinned_lookup.store(true, Ordering::SeqCst);
        assert!(store.append(entry("lost", 10)).await.is_err());
        assert!(store.register_group(ChatId(-9), "G").await.is_err());
        assert_eq!(fake.edits(), edits);

        fake.fail_pinned_lookup.store(false, Ordering::SeqCst);
        store.append(entry("next", 11)).await.unwrap();
        assert_eq!(store.read().await.entries.len(), 4);
    }

    #[tokio::test]
    async fn append_with_a_foreign_pin_leaves_the_document_alone() {
        let (fake, store) = store_with_three_entries().await;
        let handle = store.handle().await.unwrap();
        let before = fake.pinned_text(CHANNEL).unwrap();

        fake.seed_pinned(CHANNEL, "announcement");
        assert!(store.append(entry("lost", 10)).await.is_err());
        assert_eq!(store.read().await, Document::default());

        fake.pin_message(handle).await.unwrap();
        assert_eq!(fake.pinned_text(CHANNEL).unwrap(), before);
        assert_eq!(store.read().await.entries.len(), 3);
    }

    #[tokio::test]
    async fn legacy_bare_list_reads_as_empty() {
        let fake = Arc::new(FakeMessenger::default());
        fake.seed_pinned(CHANNEL, "[]");
        let store = DocumentStore::new(fake.clone(), CHANNEL, StoreLimits::default());
        store.initialize().await;

        assert_eq!(store.read().await, Document::default());
    }

    #[test]
    fn parses_offsetless_timestamps_as_utc() {
        let text = r#"{
          "messages": [
            {"chat_title": "Deals", "message_text": "Code: X Von Y",
             "gutschein_code": "X", "timestamp": "2024-05-01T12:00:00.123456"}
          ],
          "groups": {}
        }"#;
        let doc = Document::parse(text).unwrap();
        assert_eq!(
            doc.entries[0].timestamp,
            at(0) + Duration::microseconds(123_456)
        );
        assert_eq!(doc.entries[0].code.as_deref(), Some("X"));
    }

    #[test]
    fn serializes_with_the_persisted_field_names() {
        let mut doc = Document::default();
        doc.entries.push(Entry::new(None, "hi", Some("C1".to_string()), at(0)));
        doc.register_group(ChatId(-42), "Group");

        let v: serde_json::Value = serde_json::to_value(&doc).unwrap();
        let e = &v["messages"][0];
        assert_eq!(e["chat_title"], "Unknown");
        assert_eq!(e["message_text"], "hi");
        assert_eq!(e["gutschein_code"], "C1");
        assert_eq!(e["timestamp"], "2024-05-01T12:00:00.000000Z");
        assert_eq!(v["groups"]["-42"], "Group");
    }

    #[tokio::test]
    async fn write_sorts_newest_first_and_caps_entries() {
        let limits = StoreLimits {
            max_entries: 3,
            max_message_len: 100_000,
        };
        let (_fake, store) = ready_store(limits).await;

        let mut doc = Document::default();
        for m in [5, 1, 9, 3, 7] {
            doc.entries.push(entry(&format!("g{m}"), m));
        }
        store.write(doc).await.unwrap();

        let read = store.read().await;
        let minutes: Vec<DateTime<Utc>> = read.entries.iter().map(|e| e.timestamp).collect();
        assert_eq!(minutes, vec![at(9), at(7), at(5)]);
    }

    #[tokio::test]
    async fn repeated_write_is_an_idempotent_no_op() {
        let (_fake, store) = ready_store(StoreLimits::default()).await;
        let mut doc = Document::default();
        doc.entries.push(entry("a", 0));

        store.write(doc.clone()).await.unwrap();
        let first = store.read().await;
        store.write(doc).await.unwrap();

        assert_eq!(store.read().await, first);
    }

    #[tokio::test]
    async fn oversized_document_drops_oldest_in_batches() {
        let limits = StoreLimits {
            max_entries: 200,
            max_message_len: 4096,
        };
        let (fake, store) = ready_store(limits).await;

        let mut doc = Document::default();
        for m in 0..60 {
            doc.entries.push(entry(&format!("group-{m:02}"), m));
        }
        store.write(doc).await.unwrap();

        let text = fake.pinned_text(CHANNEL).unwrap();
        assert!(text.encode_utf16().count() <= 4096);
        let read = store.read().await;
        assert!(read.entries.len() < 60);
        assert_eq!(read.entries.len() % 10, 0);
        // The newest entry always survives.
        assert_eq!(read.entries[0].timestamp, at(59));
    }

    #[tokio::test]
    async fn platform_limit_caps_configured_limit() {
        let fake = Arc::new(FakeMessenger::default());
        let store = DocumentStore::new(
            fake,
            CHANNEL,
            StoreLimits {
                max_entries: 200,
                max_message_len: 1_000_000,
            },
        );
        assert_eq!(store.limits.max_message_len, 4096);
    }

    #[tokio::test]
    async fn duplicate_appends_are_kept_newest_first() {
        let (_fake, store) = ready_store(StoreLimits::default()).await;
        let text = "Your Code: SAVE20 Von Shop";

        store
            .append(Entry::new(Some("Shop"), text, Some("SAVE20".into()), at(0)))
            .await
            .unwrap();
        store
            .append(Entry::new(Some("Shop"), text, Some("SAVE20".into()), at(1)))
            .await
            .unwrap();

        let doc = store.read().await;
        assert_eq!(doc.entries.len(), 2);
        assert_eq!(doc.entries[0].timestamp, at(1));
        assert_eq!(doc.entries[1].timestamp, at(0));
    }

    #[tokio::test]
    async fn register_group_writes_only_on_change() {
        let (fake, store) = ready_store(StoreLimits::default()).await;

        assert!(store.register_group(ChatId(-7), "Deals").await.unwrap());
        let edits = fake.edits();
        assert!(!store.register_group(ChatId(-7), "Deals").await.unwrap());
        assert_eq!(fake.edits(), edits);
        assert!(store.register_group(ChatId(-7), "Deals 2").await.unwrap());

        assert_eq!(store.read().await.groups(), vec![(ChatId(-7), "Deals 2".to_string())]);
    }

    #[test]
    fn groups_are_listed_by_name_and_skip_bad_ids() {
        let mut doc = Document::default();
        doc.groups.insert("-2".into(), "beta".into());
        doc.groups.insert("-1".into(), "Alpha".into());
        doc.groups.insert("oops".into(), "Broken".into());

        assert_eq!(
            doc.groups(),
            vec![(ChatId(-1), "Alpha".to_string()), (ChatId(-2), "beta".to_string())]
        );
    }

    #[test]
    fn timestamp_parser_rejects_garbage() {
        assert!(timestamp::parse("yesterday").is_none());
        assert!(timestamp::parse("2024-05-01T12:00:00Z").is_some());
        assert!(timestamp::parse("2024-05-01T12:00:00").is_some());
    }
}
