use std::sync::OnceLock;

use regex::Regex;

/// Case-insensitive keyword filter for inbound group messages.
#[derive(Clone, Debug, Default)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
}

impl KeywordMatcher {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// True if any keyword occurs in `text`, ignoring case.
    /// An empty keyword set never matches.
    pub fn matches(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// Extract the voucher code from a "... Code: XYZ Von ..." message.
///
/// Takes the shortest span between `Code:` and the next `Von` (both
/// case-insensitive, across line breaks) and trims it. Only the first
/// occurrence is considered. An empty span yields `Some("")`, which is how
/// earlier deployments persisted it.
pub fn extract_code(text: &str) -> Option<String> {
    static CODE_RE: OnceLock<Regex> = OnceLock::new();
    let re = CODE_RE.get_or_init(|| Regex::new(r"(?is)Code:\s*(.*?)\s*Von").expect("valid regex"));

    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}
