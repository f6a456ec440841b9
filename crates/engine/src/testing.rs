//! In-memory host used by the engine tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::host::{
    CacheSnapshot, Chapter, DumpBound, Host, ObservedProperty, SeekRange, TimerKind, WriteId,
};

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Dump {
        id: WriteId,
        start: DumpBound,
        end: DumpBound,
        path: PathBuf,
    },
    Abort(WriteId),
    SetLoop(Option<f64>, Option<f64>),
    Align,
    Reload,
    Quit,
    Message(String),
    Observe(ObservedProperty, bool),
    Schedule(TimerKind, u64, Duration),
    Cancel(TimerKind, u64),
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub snapshot: CacheSnapshot,
    pub chapters: Vec<Chapter>,
    pub current_chapter: Option<usize>,
    pub playback_time: Option<f64>,
    pub duration: Option<f64>,
    pub loop_points: (Option<f64>, Option<f64>),
    pub existing: HashSet<PathBuf>,
    /// Keyframe spacing used to snap loop points on alignment.
    pub keyframe_interval: Option<f64>,
    pub fail_dumps: bool,
    pub calls: Vec<HostCall>,
}

impl RecordingHost {
    /// Host whose cache holds `start..end`.
    pub fn with_cache(start: f64, end: f64) -> Self {
        let mut host = Self::default();
        host.set_cache(start, end);
        host
    }

    pub fn set_cache(&mut self, start: f64, end: f64) {
        self.snapshot.seekable = vec![SeekRange { start, end }];
        self.snapshot.cache_duration = Some(end - start);
    }

    pub fn dumps(&self) -> Vec<(WriteId, DumpBound, DumpBound, PathBuf)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                HostCall::Dump {
                    id,
                    start,
                    end,
                    path,
                } => Some((*id, *start, *end, path.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn aborted(&self) -> Vec<WriteId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                HostCall::Abort(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &HostCall) -> usize {
        self.calls.iter().filter(|call| *call == wanted).count()
    }

    pub fn cancelled_timers(&self) -> Vec<(TimerKind, u64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                HostCall::Cancel(kind, generation) => Some((*kind, *generation)),
                _ => None,
            })
            .collect()
    }

    /// Generation of the latest schedule of `kind`.
    pub fn last_scheduled(&self, kind: TimerKind) -> Option<u64> {
        self.calls.iter().rev().find_map(|call| match call {
            HostCall::Schedule(scheduled, generation, _) if *scheduled == kind => Some(*generation),
            _ => None,
        })
    }

    /// Latest observation state requested for `property`.
    pub fn is_observed(&self, property: ObservedProperty) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|call| match call {
                HostCall::Observe(observed, enabled) if *observed == property => Some(*enabled),
                _ => None,
            })
            .unwrap_or(false)
    }

    fn snap(&self, value: Option<f64>, round_up: bool) -> Option<f64> {
        let interval = self.keyframe_interval?;
        value.map(|value| {
            let steps = value / interval;
            let steps = if round_up { steps.ceil() } else { steps.floor() };
            steps * interval
        })
    }
}

impl Host for RecordingHost {
    fn cache_snapshot(&self) -> CacheSnapshot {
        self.snapshot.clone()
    }

    fn chapters(&self) -> Vec<Chapter> {
        self.chapters.clone()
    }

    fn current_chapter(&self) -> Option<usize> {
        self.current_chapter
    }

    fn playback_time(&self) -> Option<f64> {
        self.playback_time
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn loop_points(&self) -> (Option<f64>, Option<f64>) {
        self.loop_points
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.existing.contains(path)
    }

    fn dump_cache(
        &mut self,
        id: WriteId,
        start: DumpBound,
        end: DumpBound,
        path: &Path,
    ) -> Result<()> {
        if self.fail_dumps {
            return Err(EngineError::Host {
                context: "dump-cache",
                message: "rejected".to_string(),
            });
        }
        self.calls.push(HostCall::Dump {
            id,
            start,
            end,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn abort_write(&mut self, id: WriteId) {
        self.calls.push(HostCall::Abort(id));
    }

    fn set_loop_points(&mut self, a: Option<f64>, b: Option<f64>) {
        self.loop_points = (a, b);
        self.calls.push(HostCall::SetLoop(a, b));
    }

    fn align_loop_points(&mut self) {
        let (a, b) = self.loop_points;
        if self.keyframe_interval.is_some() {
            self.loop_points = (self.snap(a, false), self.snap(b, true));
        }
        self.calls.push(HostCall::Align);
    }

    fn reload_entry(&mut self) {
        self.calls.push(HostCall::Reload);
    }

    fn quit(&mut self) {
        self.calls.push(HostCall::Quit);
    }

    fn show_message(&mut self, text: &str) {
        self.calls.push(HostCall::Message(text.to_string()));
    }

    fn set_observed(&mut self, property: ObservedProperty, enabled: bool) {
        self.calls.push(HostCall::Observe(property, enabled));
    }

    fn schedule_timer(&mut self, kind: TimerKind, generation: u64, after: Duration) {
        self.calls.push(HostCall::Schedule(kind, generation, after));
    }

    fn cancel_timer(&mut self, kind: TimerKind, generation: u64) {
        self.calls.push(HostCall::Cancel(kind, generation));
    }
}
