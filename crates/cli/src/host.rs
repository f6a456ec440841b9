use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use cachedump_engine::{
    CacheSnapshot, Chapter, Command, DumpBound, EngineError, FileInfo, Host, ObservedProperty,
    SeekRange, Signal, TimerKind, TrackSnapshot, WriteId,
};
use mpv_ipc::{IpcMessage, MpvClient, PropertyMirror, USER_REQUEST_BASE};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::commands::parse_client_message;
use crate::timers::TimerWheel;

const MESSAGE_DURATION_MS: u64 = 3_000;

/// Properties mirrored for the whole session, in observation id order.
pub const MIRRORED_PROPERTIES: [&str; 11] = [
    "demuxer-cache-time",
    "demuxer-cache-state",
    "track-list",
    "chapter-list",
    "chapter",
    "time-pos",
    "duration",
    "ab-loop-a",
    "ab-loop-b",
    "media-title",
    "file-format",
];

/// Engine input derived from one IPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Signal(Signal),
    Command(Command),
}

/// [`Host`] implementation over an mpv IPC connection.
///
/// Every interesting property is observed for the whole session so getters
/// can answer from the mirror; [`Host::set_observed`] only decides which
/// changes are forwarded to the engine.
#[derive(Debug)]
pub struct MpvHost<W> {
    client: MpvClient<W>,
    mirror: PropertyMirror,
    forwarded: HashSet<ObservedProperty>,
    timers: TimerWheel,
    awaiting_load: bool,
    quit_requested: bool,
}

impl<W> MpvHost<W>
where
    W: Write,
{
    pub fn new(client: MpvClient<W>) -> Self {
        Self {
            client,
            mirror: PropertyMirror::default(),
            forwarded: HashSet::new(),
            timers: TimerWheel::default(),
            awaiting_load: false,
            quit_requested: false,
        }
    }

    /// Subscribes to every mirrored property.
    pub fn start(&mut self) -> mpv_ipc::Result<()> {
        for (index, name) in MIRRORED_PROPERTIES.iter().enumerate() {
            self.client.observe_property(index as u64 + 1, name)?;
        }
        Ok(())
    }

    pub fn timers(&mut self) -> &mut TimerWheel {
        &mut self.timers
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Updates the mirror and translates one message into engine input.
    pub fn absorb(&mut self, message: IpcMessage) -> Vec<Input> {
        match message {
            IpcMessage::PropertyChange { name, data, .. } => {
                self.mirror.update(&name, data);
                self.property_changed(&name)
            }
            IpcMessage::Event { name } => match name.as_str() {
                "start-file" => {
                    self.awaiting_load = false;
                    self.mirror.update("media-title", None);
                    Vec::new()
                }
                "file-loaded" => {
                    self.awaiting_load = true;
                    self.file_loaded().map(Input::Signal).into_iter().collect()
                }
                _ => Vec::new(),
            },
            IpcMessage::ClientMessage { args } => parse_client_message(&args)
                .map(Input::Command)
                .into_iter()
                .collect(),
            IpcMessage::Reply {
                request_id: Some(request_id),
                error,
                ..
            } if request_id >= USER_REQUEST_BASE => {
                let result = if error == "success" {
                    Ok(())
                } else {
                    Err(error)
                };
                vec![Input::Signal(Signal::WriteFinished {
                    id: WriteId(request_id - USER_REQUEST_BASE),
                    result,
                })]
            }
            IpcMessage::Reply {
                request_id, error, ..
            } => {
                if error != "success" {
                    warn!(?request_id, error = %error, "mpv rejected command");
                }
                Vec::new()
            }
        }
    }

    fn property_changed(&mut self, name: &str) -> Vec<Input> {
        let signal = match name {
            "demuxer-cache-time" if self.forwarded.contains(&ObservedProperty::CacheTime) => {
                Some(Signal::CacheTime(self.mirror.f64(name)))
            }
            "demuxer-cache-state" if self.forwarded.contains(&ObservedProperty::CacheState) => {
                self.mirror
                    .contains(name)
                    .then(|| Signal::CacheState(self.cache_snapshot()))
            }
            "track-list" if self.forwarded.contains(&ObservedProperty::TrackList) => {
                Some(Signal::TrackList(self.track_snapshot()))
            }
            "ab-loop-a" | "ab-loop-b" => {
                let (a, b) = self.loop_points();
                Some(Signal::LoopPoints { a, b })
            }
            "media-title" => self.file_loaded(),
            _ => None,
        };
        signal.map(Input::Signal).into_iter().collect()
    }

    /// Emits `FileLoaded` once the file is open and its title is known.
    fn file_loaded(&mut self) -> Option<Signal> {
        if !self.awaiting_load {
            return None;
        }
        let title = self.mirror.string("media-title")?.to_string();
        self.awaiting_load = false;
        let codec = |kind: &str| {
            self.mirror
                .selected_track(kind)
                .and_then(|track| track.codec)
        };
        Some(Signal::FileLoaded(FileInfo {
            title,
            file_format: self.mirror.string("file-format").map(str::to_string),
            video_codec: codec("video"),
            audio_codec: codec("audio"),
        }))
    }

    fn track_snapshot(&self) -> TrackSnapshot {
        let id = |kind: &str| self.mirror.selected_track(kind).map(|track| track.id);
        TrackSnapshot {
            video: id("video"),
            audio: id("audio"),
            subtitle: id("sub"),
        }
    }

    fn run(&mut self, context: &'static str, args: &[Value]) {
        if let Err(error) = self.client.command(args) {
            warn!(context, %error, "ipc command failed");
        }
    }
}

fn bound(value: DumpBound) -> Value {
    match value {
        DumpBound::At(seconds) => json!(seconds),
        DumpBound::Open => json!("no"),
    }
}

fn loop_value(value: Option<f64>) -> Value {
    value.map_or_else(|| json!("no"), |seconds| json!(seconds))
}

impl<W> Host for MpvHost<W>
where
    W: Write,
{
    fn cache_snapshot(&self) -> CacheSnapshot {
        let Some(state) = self.mirror.cache_state() else {
            return CacheSnapshot::default();
        };
        CacheSnapshot {
            seekable: state
                .seekable_ranges
                .iter()
                .map(|range| SeekRange {
                    start: range.start,
                    end: range.end,
                })
                .collect(),
            bof_cached: state.bof_cached,
            eof_cached: state.eof_cached,
            underrun: state.underrun,
            cache_duration: state.cache_duration,
            reader_pts: state.reader_pts,
        }
    }

    fn chapters(&self) -> Vec<Chapter> {
        self.mirror
            .chapters()
            .into_iter()
            .map(|entry| Chapter {
                time: entry.time,
                title: entry.title.unwrap_or_default(),
            })
            .collect()
    }

    fn current_chapter(&self) -> Option<usize> {
        self.mirror
            .i64("chapter")
            .and_then(|index| usize::try_from(index).ok())
    }

    fn playback_time(&self) -> Option<f64> {
        self.mirror.f64("time-pos")
    }

    fn duration(&self) -> Option<f64> {
        self.mirror.f64("duration")
    }

    fn loop_points(&self) -> (Option<f64>, Option<f64>) {
        (
            self.mirror.loop_point("ab-loop-a"),
            self.mirror.loop_point("ab-loop-b"),
        )
    }

    fn dump_cache(
        &mut self,
        id: WriteId,
        start: DumpBound,
        end: DumpBound,
        path: &Path,
    ) -> cachedump_engine::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| EngineError::Host {
                context: "create save directory",
                message: error.to_string(),
            })?;
        }
        let args = [
            json!("dump-cache"),
            bound(start),
            bound(end),
            json!(path.to_string_lossy()),
        ];
        self.client
            .command_async(USER_REQUEST_BASE + id.0, &args)
            .map_err(|error| EngineError::Host {
                context: "dump-cache",
                message: error.to_string(),
            })
    }

    fn abort_write(&mut self, id: WriteId) {
        debug!(id = id.0, "stopping cache dump");
        self.run(
            "abort dump",
            &[json!("dump-cache"), json!("no"), json!("no"), json!("")],
        );
    }

    fn set_loop_points(&mut self, a: Option<f64>, b: Option<f64>) {
        self.mirror.update("ab-loop-a", Some(loop_value(a)));
        self.mirror.update("ab-loop-b", Some(loop_value(b)));
        self.run(
            "set ab-loop-a",
            &[json!("set_property"), json!("ab-loop-a"), loop_value(a)],
        );
        self.run(
            "set ab-loop-b",
            &[json!("set_property"), json!("ab-loop-b"), loop_value(b)],
        );
    }

    fn align_loop_points(&mut self) {
        self.run("align loop", &[json!("ab-loop-align-cache")]);
    }

    fn reload_entry(&mut self) {
        self.run(
            "reload entry",
            &[json!("playlist-play-index"), json!("current")],
        );
    }

    fn quit(&mut self) {
        self.quit_requested = true;
        self.run("quit", &[json!("quit")]);
    }

    fn show_message(&mut self, text: &str) {
        if let Err(error) = self.client.show_text(text, MESSAGE_DURATION_MS) {
            warn!(%error, "show-text failed");
        }
    }

    fn set_observed(&mut self, property: ObservedProperty, enabled: bool) {
        if enabled {
            self.forwarded.insert(property);
        } else {
            self.forwarded.remove(&property);
        }
    }

    fn schedule_timer(&mut self, kind: TimerKind, generation: u64, after: Duration) {
        self.timers.schedule(kind, generation, after, Instant::now());
    }

    fn cancel_timer(&mut self, kind: TimerKind, generation: u64) {
        self.timers.cancel(kind, generation);
    }
}
