use crate::domain::ChatId;

/// Separator between the action name and its parameters in callback data.
const SEP: char = ':';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    All,
    Codes,
}

impl View {
    fn as_str(self) -> &'static str {
        match self {
            View::All => "all",
            View::Codes => "codes",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(View::All),
            "codes" => Some(View::Codes),
            _ => None,
        }
    }
}

/// A button press, as carried in Telegram callback data.
///
/// Wire format: `menu`, `view:<all|codes>:<page>`, `groups`, `live:<chat id>`,
/// `stop`, `close`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiAction {
    Menu,
    View { view: View, page: usize },
    Groups,
    Live(ChatId),
    Stop,
    Close,
}

impl UiAction {
    /// Parse callback data. Unknown or malformed data yields `None`.
    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.trim().split(SEP);
        let name = parts.next()?;
        let action = match name {
            "menu" => UiAction::Menu,
            "view" => {
                let view = View::parse(parts.next()?)?;
                let page = parts.next()?.parse::<usize>().ok()?;
                UiAction::View { view, page }
            }
            "groups" => UiAction::Groups,
            "live" => UiAction::Live(ChatId(parts.next()?.parse::<i64>().ok()?)),
            "stop" => UiAction::Stop,
            "close" => UiAction::Close,
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(action)
    }

    pub fn encode(&self) -> String {
        match self {
            UiAction::Menu => "menu".to_string(),
            UiAction::View { view, page } => format!("view{SEP}{}{SEP}{page}", view.as_str()),
            UiAction::Groups => "groups".to_string(),
            UiAction::Live(chat) => format!("live{SEP}{}", chat.0),
            UiAction::Stop => "stop".to_string(),
            UiAction::Close => "close".to_string(),
        }
    }
}
