use std::fmt::{Display, Formatter};

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, MpvIpcError>;

/// Errors raised while talking to an mpv JSON IPC socket.
#[derive(Debug)]
pub enum MpvIpcError {
    Io {
        context: &'static str,
        source: std::io::Error,
    },
    Json(serde_json::Error),
    /// The line parsed as JSON but is not an mpv message.
    Malformed {
        line: String,
    },
    Closed,
}

impl Display for MpvIpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Malformed { line } => write!(f, "malformed ipc message: {line}"),
            Self::Closed => write!(f, "ipc connection closed"),
        }
    }
}

impl std::error::Error for MpvIpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MpvIpcError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
