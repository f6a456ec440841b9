//! Minimal client for mpv's JSON IPC protocol.

mod client;
mod error;
mod message;
mod properties;

#[cfg(unix)]
pub use client::connect;
pub use client::{MessageReader, MpvClient, USER_REQUEST_BASE};
pub use error::{MpvIpcError, Result};
pub use message::{IpcMessage, encode_command, parse_message};
pub use properties::{ChapterEntry, DemuxerCacheState, PropertyMirror, SeekableRange, Track};
