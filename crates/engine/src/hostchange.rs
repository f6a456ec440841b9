use tracing::{debug, info, warn};

use crate::api::{Engine, Event};
use crate::host::{CacheSnapshot, Host, ObservedProperty, TimerKind, TrackSnapshot};

/// Seconds before the recorded seekable end at which the reader counts as
/// caught up.
pub const CATCH_UP_MARGIN: f64 = 1.0;
/// A cache duration below this share of the previous one is a timestamp
/// discontinuity.
pub const CACHE_DROP_RATIO: f64 = 0.5;

/// Why the playlist entry was reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadReason {
    Manual,
    OnDemand,
    /// A second switch arrived inside the restart window.
    RapidSwitch,
    CaughtUp,
    CacheDropped,
    Underrun,
    /// Track ids changed well past the start of the stream.
    Stuck,
}

impl ReloadReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::OnDemand => "on-demand",
            Self::RapidSwitch => "rapid-switch",
            Self::CaughtUp => "caught-up",
            Self::CacheDropped => "cache-dropped",
            Self::Underrun => "underrun",
            Self::Stuck => "stuck",
        }
    }
}

/// Track ids seen on the previous track-list update.
#[derive(Debug, Default)]
pub struct TrackWatch {
    previous: Option<TrackSnapshot>,
}

impl TrackWatch {
    pub fn previous(&self) -> Option<TrackSnapshot> {
        self.previous
    }

    pub(crate) fn clear(&mut self) {
        self.previous = None;
    }
}

impl<H> Engine<H>
where
    H: Host,
{
    /// Track-list update. Changing ids open (or extend) the suspension
    /// window; stable ids mean the source switched underneath the player.
    pub(crate) fn detect(&mut self, tracks: TrackSnapshot, events: &mut Vec<Event>) {
        let previous = self.tracks.previous.replace(tracks);
        if previous != Some(tracks) {
            debug!(?previous, current = ?tracks, "track ids changed, suspending");
            self.timers.arm(
                &mut self.host,
                TimerKind::Suspend,
                self.settings.suspend_window,
            );
            return;
        }

        if self.timers.is_armed(TimerKind::Suspend) {
            debug!("track ids settled inside suspension window");
            return;
        }

        if self.timers.is_armed(TimerKind::Restart) {
            self.timers.kill(&mut self.host, TimerKind::Restart);
            self.reload(ReloadReason::RapidSwitch, events);
        } else if self.settings.on_demand {
            self.reload(ReloadReason::OnDemand, events);
        } else if !self.cache.seamless {
            let snapshot = self.host.cache_snapshot();
            self.cache.seek_end = snapshot.cache_end().unwrap_or(0.0);
            self.cache.last_duration = snapshot.cache_duration;
            self.cache.seamless = true;
            info!(
                seek_end = self.cache.seek_end,
                "host change detected, waiting for reader to catch up"
            );
            self.host
                .set_observed(ObservedProperty::CacheState, true);
        }
    }

    /// Cache-state update while a seamless reload is pending.
    pub(crate) fn seamless(&mut self, snapshot: &CacheSnapshot, events: &mut Vec<Event>) {
        let caught_up = snapshot
            .reader_pts
            .is_some_and(|pts| pts >= self.cache.seek_end - CATCH_UP_MARGIN);
        let dropped = match (snapshot.cache_duration, self.cache.last_duration) {
            (Some(now), Some(last)) => now < last * CACHE_DROP_RATIO,
            _ => false,
        };

        let reason = if snapshot.underrun {
            ReloadReason::Underrun
        } else if dropped {
            ReloadReason::CacheDropped
        } else if caught_up {
            ReloadReason::CaughtUp
        } else {
            if snapshot.cache_duration.is_some() {
                self.cache.last_duration = snapshot.cache_duration;
            }
            return;
        };
        self.cache.seamless = false;
        self.reload(reason, events);
    }

    /// Suspension window closed. Track churn early in a stream is ordinary
    /// loading; past the threshold the source is treated as stuck.
    pub(crate) fn stabilize(&mut self, events: &mut Vec<Event>) {
        let cache_time = self.cache_time.unwrap_or(0.0);
        if cache_time > self.settings.stabilize_threshold {
            warn!(
                cache_time,
                threshold = self.settings.stabilize_threshold,
                "track ids changed past stream start, forcing reload"
            );
            self.reload(ReloadReason::Stuck, events);
        } else {
            debug!(cache_time, "track ids stabilized");
        }
    }

    /// Ends open-ended writes at the discontinuity and reloads the entry in
    /// place.
    pub(crate) fn reload(&mut self, reason: ReloadReason, events: &mut Vec<Event>) {
        let aborted = self.abort_writes(|write| write.continuous);
        info!(reason = reason.as_str(), aborted, "reloading playlist entry");
        self.reset();
        self.timers.arm(
            &mut self.host,
            TimerKind::Restart,
            self.settings.restart_window,
        );
        self.host.reload_entry();
        events.push(Event::Reloaded { reason });
    }
}
