/// Core error type.
///
/// Adapter crates map their specific errors into this type so the relay core
/// can tell benign remote conditions (`NotFound`) from real failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The remote message no longer exists (already deleted, never existed).
    #[error("not found: {0}")]
    NotFound(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
