use std::{env, fs, path::Path};

use crate::{
    domain::{ChatId, UserId},
    errors::Error,
    Result,
};

/// Typed configuration, loaded once at startup and immutable afterwards.
///
/// Variable names follow the deployment's `.env`; the older German names
/// (`ZIEL_BENUTZER_ID`, `TRIGGER_WOERTER`) are still accepted as aliases.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub recipient: UserId,
    pub data_channel: ChatId,
    pub keywords: Vec<String>,

    // Store
    pub history_limit: usize,
    pub telegram_message_limit: usize,

    // Browse UI
    pub page_size: usize,
    pub preview_length: usize,

    // Relay
    pub forward_matches: bool,

    // Keep-alive
    pub keepalive_enabled: bool,
    pub keepalive_port: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|k| lookup(*k).and_then(non_empty))
        };

        // Required
        let telegram_bot_token = get(&["BOT_TOKEN", "TELEGRAM_BOT_TOKEN"]).ok_or_else(|| {
            Error::Config("BOT_TOKEN environment variable is required".to_string())
        })?;
        let recipient = UserId(required_i64(
            get(&["RECIPIENT_USER_ID", "ZIEL_BENUTZER_ID"]),
            "RECIPIENT_USER_ID",
        )?);
        let data_channel = ChatId(required_i64(get(&["DATA_CHANNEL_ID"]), "DATA_CHANNEL_ID")?);

        let keywords = parse_csv_lower(get(&["TRIGGER_WORDS", "TRIGGER_WOERTER"]));

        let history_limit = optional_usize(get(&["HISTORY_LIMIT"]), "HISTORY_LIMIT")?.unwrap_or(200);
        let telegram_message_limit =
            optional_usize(get(&["TELEGRAM_MESSAGE_LIMIT"]), "TELEGRAM_MESSAGE_LIMIT")?
                .unwrap_or(4096);

        let page_size = optional_usize(get(&["PAGE_SIZE"]), "PAGE_SIZE")?.unwrap_or(5);
        if page_size == 0 {
            return Err(Error::Config("PAGE_SIZE must be greater than 0".to_string()));
        }
        let preview_length =
            optional_usize(get(&["PREVIEW_LENGTH"]), "PREVIEW_LENGTH")?.unwrap_or(150);

        let forward_matches = get(&["FORWARD_MATCHES"]).map(|s| parse_bool(&s)).unwrap_or(true);

        let keepalive_enabled = get(&["KEEPALIVE_ENABLED"])
            .map(|s| parse_bool(&s))
            .unwrap_or(true);
        let keepalive_port = match get(&["PORT", "KEEPALIVE_PORT"]) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got {raw:?}")))?,
            None => 8080,
        };

        Ok(Self {
            telegram_bot_token,
            recipient,
            data_channel,
            keywords,
            history_limit,
            telegram_message_limit,
            page_size,
            preview_length,
            forward_matches,
            keepalive_enabled,
            keepalive_port,
        })
    }
}

fn required_i64(raw: Option<String>, name: &str) -> Result<i64> {
    let raw = raw.ok_or_else(|| Error::Config(format!("{name} environment variable is required")))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::Config(format!("{name} must be an integer, got {raw:?}")))
}

fn optional_usize(raw: Option<String>, name: &str) -> Result<Option<usize>> {
    raw.map(|s| {
        s.trim()
            .parse::<usize>()
            .map_err(|_| Error::Config(format!("{name} must be a non-negative integer, got {s:?}")))
    })
    .transpose()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv_lower(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
