use thiserror::Error;

/// Everything that can go wrong between a user action and the backend.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The request never completed (host unreachable, connection reset, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}")]
    Http { status: u16, detail: Option<String> },

    /// The response body (or an uploaded file) could not be decoded.
    #[error("invalid data: {0}")]
    Parse(String),

    /// Rejected client-side before any request was made.
    #[error("{0}")]
    Validation(String),

    #[error("import failed: {0}")]
    Import(String),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
    /// Server-provided `detail` text, if the backend sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Http { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Text for a toast: the server detail verbatim, the message of a
    /// client-side failure, or the caller's generic fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        if let Some(detail) = self.detail() {
            return detail.to_string();
        }
        match self {
            Self::Validation(msg) | Self::Import(msg) => msg.clone(),
            _ => fallback.to_string(),
        }
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
