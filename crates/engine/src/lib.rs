//! Host-agnostic cache dump controller for media players.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod hostchange;
pub mod naming;
pub mod segments;
pub mod state;
pub mod time;
pub mod timers;

mod align;
mod automatic;

#[cfg(test)]
mod testing;

pub use api::{
    Command, Engine, EngineErrorEvent, EngineErrorKind, Event, Signal, WriteStatus,
};
pub use config::{DumpMode, OutputLabel, Settings};
pub use dispatch::{MAX_PENDING_WRITES, WRITE_QUEUE_CAPACITY, WriteOutcome, WriteRequest};
pub use error::{EngineError, Result};
pub use host::{
    CacheSnapshot, Chapter, DumpBound, FileInfo, Host, ObservedProperty, SeekRange, TimerKind,
    TrackSnapshot, WriteId,
};
pub use hostchange::ReloadReason;
