//! Telegram HTML for menus, browse pages and relay notices.

use chrono::{DateTime, Utc};

use crate::{
    actions::{UiAction, View},
    domain::ChatId,
    messaging::types::{InlineButton, InlineKeyboard},
    pagination::Page,
    store::Entry,
};

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Cut `s` to `max_chars` characters, marking the cut with `...`.
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s.chars().take(max_chars).collect::<String>();
    out.push_str("...");
    out
}

fn format_date(ts: &DateTime<Utc>) -> String {
    ts.format("%d.%m.%Y %H:%M").to_string()
}

fn button(label: &str, action: UiAction) -> InlineButton {
    InlineButton::new(label, action.encode())
}

pub fn greeting() -> String {
    "Hello! Send /menu to browse captured messages or start a live relay.".to_string()
}

pub fn main_menu() -> (String, InlineKeyboard) {
    let keyboard = InlineKeyboard::one_per_row(vec![
        button(
            "📜 All captured messages",
            UiAction::View {
                view: View::All,
                page: 0,
            },
        ),
        button(
            "🎟️ Codes only",
            UiAction::View {
                view: View::Codes,
                page: 0,
            },
        ),
        button("📡 Live relay", UiAction::Groups),
        button("✖ Close", UiAction::Close),
    ]);
    ("<b>Main menu</b>".to_string(), keyboard)
}

/// One page of the browse view. `page.items` are already filtered for `view`.
pub fn browse_page(view: View, page: &Page<'_, Entry>, preview_len: usize) -> (String, InlineKeyboard) {
    let mut html = match view {
        View::All => "📜 <b>All messages</b>\n\n".to_string(),
        View::Codes => "🎟️ <b>Codes</b>\n\n".to_string(),
    };

    if page.items.is_empty() {
        html.push_str("No entries found.");
    }

    for (i, entry) in page.items.iter().enumerate() {
        let n = page.offset + i + 1;
        let title = escape_html(&entry.chat_title);
        let date = format_date(&entry.timestamp);
        match view {
            View::All => html.push_str(&format!(
                "<b>{n}.</b> From <b>{title}</b> ({date})\n<code>{}</code>\n\n",
                escape_html(&truncate_text(&entry.message_text, preview_len))
            )),
            View::Codes => html.push_str(&format!(
                "<b>{n}.</b> Code: <code>{}</code>\n<i>From {title} ({date})</i>\n\n",
                escape_html(entry.code.as_deref().unwrap_or_default())
            )),
        }
    }

    let mut nav = Vec::new();
    if page.has_prev {
        nav.push(button(
            "◀ Prev",
            UiAction::View {
                view,
                page: page.index.saturating_sub(1),
            },
        ));
    }
    if page.has_next {
        nav.push(button(
            "Next ▶",
            UiAction::View {
                view,
                page: page.index + 1,
            },
        ));
    }

    let keyboard = InlineKeyboard::new()
        .row(nav)
        .row(vec![button("🏠 Main menu", UiAction::Menu)]);

    (html.trim_end().to_string(), keyboard)
}

/// Registered groups to pick a live relay source from.
pub fn group_picker(groups: &[(ChatId, String)]) -> (String, InlineKeyboard) {
    let html = if groups.is_empty() {
        "📡 <b>Live relay</b>\n\nNo groups known yet. Add the bot to a group first.".to_string()
    } else {
        "📡 <b>Live relay</b>\n\nPick a group to follow:".to_string()
    };

    let mut buttons: Vec<InlineButton> = groups
        .iter()
        .map(|(chat, name)| button(name, UiAction::Live(*chat)))
        .collect();
    buttons.push(button("🏠 Main menu", UiAction::Menu));

    (html, InlineKeyboard::one_per_row(buttons))
}

pub fn live_banner(group_title: &str) -> (String, InlineKeyboard) {
    let html = format!(
        "🔴 <b>Live relay</b> from <b>{}</b>\n\nEvery new message is forwarded here. \
         Stopping deletes the relayed messages.",
        escape_html(group_title)
    );
    let keyboard = InlineKeyboard::one_per_row(vec![button("⏹ Stop", UiAction::Stop)]);
    (html, keyboard)
}

/// Small note sent after each live-relayed message.
pub fn relay_stamp(group_title: &str, at: &DateTime<Utc>) -> String {
    format!(
        "↪ <i>{} · {} UTC</i>",
        escape_html(group_title),
        at.format("%H:%M:%S")
    )
}

pub fn forward_failed(group_title: &str) -> String {
    format!(
        "⚠️ A matching message from <b>{}</b> could not be forwarded. It was still saved.",
        escape_html(group_title)
    )
}
