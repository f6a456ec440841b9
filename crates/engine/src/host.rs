use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Tolerance in seconds when checking that a range is cache-resident.
const COVERAGE_TOLERANCE: f64 = 0.5;

/// One contiguous seekable region of the host cache, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRange {
    pub start: f64,
    pub end: f64,
}

/// Host-reported cache state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    pub seekable: Vec<SeekRange>,
    pub bof_cached: bool,
    pub eof_cached: bool,
    pub underrun: bool,
    pub cache_duration: Option<f64>,
    pub reader_pts: Option<f64>,
}

impl CacheSnapshot {
    /// Earliest cache-resident timestamp.
    pub fn cache_start(&self) -> Option<f64> {
        self.seekable
            .iter()
            .map(|range| range.start)
            .reduce(f64::min)
    }

    /// Latest cache-resident timestamp.
    pub fn cache_end(&self) -> Option<f64> {
        self.seekable.iter().map(|range| range.end).reduce(f64::max)
    }

    /// Returns true when one seekable range spans `start..end`.
    ///
    /// # Example
    /// ```
    /// use cachedump_engine::host::{CacheSnapshot, SeekRange};
    ///
    /// let snapshot = CacheSnapshot {
    ///     seekable: vec![SeekRange { start: 0.0, end: 30.0 }],
    ///     ..CacheSnapshot::default()
    /// };
    /// assert!(snapshot.covers(10.0, 20.0));
    /// assert!(!snapshot.covers(10.0, 45.0));
    /// ```
    pub fn covers(&self, start: f64, end: f64) -> bool {
        self.seekable.iter().any(|range| {
            range.start <= start + COVERAGE_TOLERANCE && range.end >= end - COVERAGE_TOLERANCE
        })
    }
}

/// One entry of the host chapter list.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub time: f64,
    pub title: String,
}

/// Selected track ids, compared between track-list updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackSnapshot {
    pub video: Option<i64>,
    pub audio: Option<i64>,
    pub subtitle: Option<i64>,
}

/// Metadata of the loaded source used for output naming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub title: String,
    pub file_format: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

/// Start or end offset of a cache dump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DumpBound {
    At(f64),
    /// Beginning of the cache as a start, no end as an end.
    Open,
}

/// Identifier of one asynchronous write issued to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WriteId(pub u64);

/// Host properties whose change notifications the engine subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservedProperty {
    CacheTime,
    CacheState,
    TrackList,
}

/// Timers the engine schedules on the host event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Suspend,
    Restart,
    Quit,
}

impl TimerKind {
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Suspend => 0,
            Self::Restart => 1,
            Self::Quit => 2,
        }
    }
}

/// Media player operations required by the engine.
///
/// Getters read the latest host state. Commands are fire-and-forget; results
/// come back as signals on the same event loop.
pub trait Host {
    fn cache_snapshot(&self) -> CacheSnapshot;

    fn chapters(&self) -> Vec<Chapter>;

    /// Index of the chapter under playback.
    fn current_chapter(&self) -> Option<usize>;

    fn playback_time(&self) -> Option<f64>;

    fn duration(&self) -> Option<f64>;

    fn loop_points(&self) -> (Option<f64>, Option<f64>);

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Starts writing `start..end` of the cache to `path`.
    ///
    /// Completion is reported with a `WriteFinished` signal carrying `id`,
    /// including for aborted writes.
    fn dump_cache(
        &mut self,
        id: WriteId,
        start: DumpBound,
        end: DumpBound,
        path: &Path,
    ) -> Result<()>;

    fn abort_write(&mut self, id: WriteId);

    fn set_loop_points(&mut self, a: Option<f64>, b: Option<f64>);

    /// Snaps the loop points to the nearest keyframes. Hosts that apply this
    /// later report the snapped points with a `LoopPoints` signal.
    fn align_loop_points(&mut self);

    /// Reloads the current playlist entry in place.
    fn reload_entry(&mut self);

    fn quit(&mut self);

    fn show_message(&mut self, text: &str);

    fn set_observed(&mut self, property: ObservedProperty, enabled: bool);

    fn schedule_timer(&mut self, kind: TimerKind, generation: u64, after: Duration);

    fn cancel_timer(&mut self, kind: TimerKind, generation: u64);
}

#[cfg(test)]
mod tests {
    use super::{CacheSnapshot, SeekRange};

    #[test]
    fn cache_bounds_span_all_ranges() {
        let snapshot = CacheSnapshot {
            seekable: vec![
                SeekRange {
                    start: 40.0,
                    end: 55.0,
                },
                SeekRange {
                    start: 3.0,
                    end: 20.0,
                },
            ],
            ..CacheSnapshot::default()
        };

        assert_eq!(snapshot.cache_start(), Some(3.0));
        assert_eq!(snapshot.cache_end(), Some(55.0));
        assert!(!snapshot.covers(3.0, 55.0));
        assert!(snapshot.covers(41.0, 55.2));
    }

    #[test]
    fn empty_cache_has_no_bounds() {
        let snapshot = CacheSnapshot::default();
        assert_eq!(snapshot.cache_start(), None);
        assert!(!snapshot.covers(0.0, 0.0));
    }
}
