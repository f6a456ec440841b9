use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by dump requests, option updates and host calls.
#[derive(Debug)]
pub enum EngineError {
    NoLoopPoints,
    NoPlaybackPosition,
    NoChapters,
    ChapterNotFound {
        index: usize,
    },
    RangeNotCached {
        start: f64,
        end: Option<f64>,
    },
    UnknownOption {
        key: String,
    },
    SettingsIo {
        path: PathBuf,
        source: std::io::Error,
    },
    SettingsParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Host {
        context: &'static str,
        message: String,
    },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoLoopPoints => write!(f, "no A-B loop points set"),
            Self::NoPlaybackPosition => write!(f, "playback position is unknown"),
            Self::NoChapters => write!(f, "no chapters available"),
            Self::ChapterNotFound { index } => write!(f, "chapter not found: {index}"),
            Self::RangeNotCached { start, end } => match end {
                Some(end) => write!(f, "range {start:.3}..{end:.3} is not fully cached"),
                None => write!(f, "range {start:.3}..end is not fully cached"),
            },
            Self::UnknownOption { key } => write!(f, "unknown option: {key}"),
            Self::SettingsIo { path, source } => {
                write!(f, "failed to read settings: {} ({source})", path.display())
            }
            Self::SettingsParse { path, source } => {
                write!(f, "failed to parse settings: {} ({source})", path.display())
            }
            Self::Host { context, message } => write!(f, "{context}: {message}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SettingsIo { source, .. } => Some(source),
            Self::SettingsParse { source, .. } => Some(source),
            _ => None,
        }
    }
}
