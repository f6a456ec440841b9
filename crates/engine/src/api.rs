use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{DumpMode, Settings};
use crate::dispatch::{WriteRequest, WriteTracker};
use crate::error::{EngineError, Result};
use crate::hostchange::{ReloadReason, TrackWatch};
use crate::host::{
    CacheSnapshot, FileInfo, Host, ObservedProperty, TimerKind, TrackSnapshot, WriteId,
};
use crate::naming::OutputName;
use crate::segments::SegmentQueue;
use crate::state::{CacheState, LoopRange};
use crate::timers::Timers;

/// Commands accepted by the engine from key bindings and script messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Dumps the cache with `mode`, or the configured mode when `None`.
    ///
    /// # Example
    /// ```ignore
    /// use cachedump_engine::{Command, DumpMode};
    ///
    /// let events = engine.handle_command(Command::Dump {
    ///     mode: Some(DumpMode::Continuous),
    ///     quiet: false,
    ///     chapter: None,
    /// })?;
    /// ```
    Dump {
        mode: Option<DumpMode>,
        quiet: bool,
        chapter: Option<usize>,
    },
    /// Aborts every in-flight write and forgets queued work.
    Stop,
    /// Toggles keyframe alignment of the A-B loop points.
    AlignCache,
    SetOption {
        key: String,
        value: String,
    },
    CycleMode,
    CycleLabel,
    /// Reloads the playlist entry without waiting for a host change.
    Reload,
}

/// Notifications delivered by the host event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// A source finished loading and its metadata is known.
    FileLoaded(FileInfo),
    /// Cache-time tick; `None` when the property disappeared.
    CacheTime(Option<f64>),
    CacheState(CacheSnapshot),
    TrackList(TrackSnapshot),
    LoopPoints {
        a: Option<f64>,
        b: Option<f64>,
    },
    WriteFinished {
        id: WriteId,
        result: std::result::Result<(), String>,
    },
    TimerFired {
        kind: TimerKind,
        generation: u64,
    },
}

/// Final state of one write, judged from the host result and the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Saved,
    PossiblyBroken,
    Failed,
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    WriteStarted {
        id: WriteId,
        path: PathBuf,
        continuous: bool,
    },
    WriteQueued {
        mode: DumpMode,
        depth: usize,
    },
    WriteDropped {
        mode: DumpMode,
    },
    WriteFinished {
        id: WriteId,
        path: PathBuf,
        status: WriteStatus,
    },
    SegmentsFinished {
        count: usize,
    },
    Reloaded {
        reason: ReloadReason,
    },
    LoopAligned {
        a: Option<f64>,
        b: Option<f64>,
    },
    LoopRestored {
        a: Option<f64>,
        b: Option<f64>,
    },
    OptionChanged {
        key: String,
        value: String,
    },
    Quitting,
    Error(EngineErrorEvent),
}

/// Broad error classes for event consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// The request cannot run against the current source or cache.
    Precondition,
    Config,
    Host,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::UnknownOption { .. }
            | EngineError::SettingsIo { .. }
            | EngineError::SettingsParse { .. } => Self::Config,
            EngineError::Host { .. } => Self::Host,
            _ => Self::Precondition,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Cache dump controller driven by host signals and user commands.
#[derive(Debug)]
pub struct Engine<H> {
    pub(crate) host: H,
    pub(crate) settings: Settings,
    pub(crate) file: Option<FileInfo>,
    pub(crate) output: Option<OutputName>,
    pub(crate) cache: CacheState,
    pub(crate) cache_time: Option<f64>,
    pub(crate) tracks: TrackWatch,
    pub(crate) loop_range: LoopRange,
    pub(crate) writes: WriteTracker,
    pub(crate) segments: SegmentQueue,
    pub(crate) timers: Timers,
    pub(crate) tick_observed: bool,
    quit_armed: bool,
    pub(crate) quitting: bool,
}

impl<H> Engine<H>
where
    H: Host,
{
    /// Creates an engine bound to `host`. Nothing is observed until the
    /// first `FileLoaded` signal.
    pub fn new(host: H, settings: Settings) -> Self {
        let (a, b) = host.loop_points();
        let cache = CacheState::new(settings.autoend);
        Self {
            host,
            settings,
            file: None,
            output: None,
            cache,
            cache_time: None,
            tracks: TrackWatch::default(),
            loop_range: LoopRange::new(a, b),
            writes: WriteTracker::default(),
            segments: SegmentQueue::default(),
            timers: Timers::default(),
            tick_observed: false,
            quit_armed: false,
            quitting: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache_state(&self) -> &CacheState {
        &self.cache
    }

    pub fn loop_range(&self) -> &LoopRange {
        &self.loop_range
    }

    pub fn writes(&self) -> &WriteTracker {
        &self.writes
    }

    pub fn output_name(&self) -> Option<&OutputName> {
        self.output.as_ref()
    }

    /// Cache-time ticks are currently subscribed.
    pub fn is_tick_observed(&self) -> bool {
        self.tick_observed
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        match command {
            Command::Dump {
                mode,
                quiet,
                chapter,
            } => {
                let request = WriteRequest {
                    mode: mode.unwrap_or(self.settings.dump_mode),
                    quiet,
                    chapter,
                };
                self.cache_write(request, &mut events)?;
            }
            Command::Stop => self.stop(),
            Command::AlignCache => self.align_cache(&mut events),
            Command::SetOption { key, value } => self.set_option(&key, &value, &mut events)?,
            Command::CycleMode => {
                self.settings.dump_mode = self.settings.dump_mode.next();
                self.announce_option("dump_mode", &mut events);
            }
            Command::CycleLabel => {
                self.settings.output_label = self.settings.output_label.next();
                self.announce_option("output_label", &mut events);
            }
            Command::Reload => self.reload(ReloadReason::Manual, &mut events),
        }
        Ok(events)
    }

    /// Applies one host signal. Failures surface as `Event::Error`.
    pub fn handle_signal(&mut self, signal: Signal) -> Vec<Event> {
        let mut events = Vec::new();
        match signal {
            Signal::FileLoaded(info) => self.file_loaded(info),
            Signal::CacheTime(time) => {
                self.cache_time = time;
                if self.tick_observed {
                    self.automatic(time, &mut events);
                }
            }
            Signal::CacheState(snapshot) => {
                if self.cache.seamless {
                    self.seamless(&snapshot, &mut events);
                }
            }
            Signal::TrackList(tracks) => {
                if self.settings.hostchange {
                    self.detect(tracks, &mut events);
                }
            }
            Signal::LoopPoints { a, b } => self.loop_points_changed(a, b, &mut events),
            Signal::WriteFinished { id, result } => {
                self.on_write_finished(id, result, &mut events);
            }
            Signal::TimerFired { kind, generation } => {
                if self.timers.fire(kind, generation) {
                    match kind {
                        TimerKind::Suspend => self.stabilize(&mut events),
                        TimerKind::Restart => debug!("restart window closed"),
                        TimerKind::Quit => self.begin_quit(&mut events),
                    }
                }
            }
        }
        events
    }

    /// Puts the controller back into its pre-dump state for the active
    /// source and drops host-change observation.
    pub(crate) fn reset(&mut self) {
        debug!("cache state reset");
        self.cache.reset(self.settings.autoend);
        self.tracks.clear();
        self.timers.kill(&mut self.host, TimerKind::Suspend);
        self.host
            .set_observed(ObservedProperty::CacheState, false);
        self.host.set_observed(ObservedProperty::TrackList, false);
    }

    /// Subscribes to cache-time ticks while anything needs them.
    pub(crate) fn observe_cache(&mut self) {
        let needed = self.settings.autostart
            || self.cache.end_after.is_some()
            || self.settings.hostchange;
        self.set_tick_observed(needed);
    }

    pub(crate) fn set_tick_observed(&mut self, enabled: bool) {
        if self.tick_observed == enabled {
            return;
        }
        debug!(enabled, "cache-time observation changed");
        self.tick_observed = enabled;
        self.host
            .set_observed(ObservedProperty::CacheTime, enabled);
    }

    fn file_loaded(&mut self, info: FileInfo) {
        self.reset();
        self.segments.clear();
        self.writes.clear_queue();

        let output = OutputName::resolve(&info, &self.settings);
        info!(
            title = %output.title,
            extension = %output.extension,
            "source loaded"
        );
        self.output = Some(output);
        self.file = Some(info);

        let (a, b) = self.host.loop_points();
        self.loop_range = LoopRange::new(a, b);

        if let Some(after) = self.settings.quit {
            if !self.quit_armed {
                self.quit_armed = true;
                self.timers.arm(
                    &mut self.host,
                    TimerKind::Quit,
                    Duration::from_secs_f64(after.max(0.0)),
                );
            }
        }
        self.observe_cache();
    }

    fn set_option(&mut self, key: &str, value: &str, events: &mut Vec<Event>) -> Result<()> {
        self.settings.apply(key, value)?;
        match key {
            "autoend" => self.cache.end_after = self.settings.autoend,
            "force_title" | "force_extension" => {
                if let Some(info) = &self.file {
                    self.output = Some(OutputName::resolve(info, &self.settings));
                }
            }
            "hostchange" if self.settings.hostchange => {
                if !self.cache.switch_pending {
                    self.host.set_observed(ObservedProperty::TrackList, true);
                }
            }
            "hostchange" => {
                self.timers.kill(&mut self.host, TimerKind::Suspend);
                self.timers.kill(&mut self.host, TimerKind::Restart);
                self.tracks.clear();
                self.cache.seamless = false;
                self.host
                    .set_observed(ObservedProperty::CacheState, false);
                self.host.set_observed(ObservedProperty::TrackList, false);
            }
            _ => {}
        }
        if self.file.is_some() {
            self.observe_cache();
        }
        self.announce_option(key, events);
        Ok(())
    }

    fn announce_option(&mut self, key: &str, events: &mut Vec<Event>) {
        let value = self.settings.describe(key).unwrap_or_default();
        info!(key, value = %value, "option changed");
        self.host.show_message(&format!("{key}: {value}"));
        events.push(Event::OptionChanged {
            key: key.to_string(),
            value,
        });
    }

    fn stop(&mut self) {
        self.segments.clear();
        self.writes.clear_queue();
        let aborted = self.abort_writes(|_| true);
        if aborted > 0 {
            info!(aborted, "stopping writes");
            self.host.show_message("Stopping cache dump");
        } else {
            self.host.show_message("No cache dump in progress");
        }
    }

    fn begin_quit(&mut self, events: &mut Vec<Event>) {
        info!(pending = self.writes.pending_count(), "quit timer fired");
        self.quitting = true;
        self.segments.clear();
        self.writes.clear_queue();
        self.abort_writes(|_| true);
        events.push(Event::Quitting);
        if self.writes.pending_count() == 0 {
            self.finish_quit();
        }
    }

    pub(crate) fn finish_quit(&mut self) {
        if !self.quitting {
            return;
        }
        self.quitting = false;
        info!("all writes closed, quitting");
        self.host.quit();
    }
}
