/// Core error type for attachment resolution.
///
/// Adapter crates map their specific errors into this type so callers can tell
/// "never observed" apart from "origin unreachable" without string matching.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("attachment not found: {0}")]
    NotFound(String),

    #[error("attachment {0} has no external id to refresh from")]
    MissingExternalId(String),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("attachment store error: {0}")]
    Store(String),

    #[error("invalid attachment: {0}")]
    InvalidAttachment(String),
}

impl Error {
    /// Short, user-presentable description. Internal detail stays in logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::NotFound(_) | Error::MissingExternalId(_) | Error::ExternalService(_) => {
                "attachment unavailable"
            }
            _ => "internal error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
