use tracing::{debug, info};

use crate::api::{Engine, Event};
use crate::config::DumpMode;
use crate::dispatch::WriteRequest;
use crate::host::{Host, ObservedProperty};
use crate::state::LoopRange;

impl<H> Engine<H>
where
    H: Host,
{
    /// One cache-time tick: starts, splits and stops automatic writes.
    pub(crate) fn automatic(&mut self, time: Option<f64>, events: &mut Vec<Event>) {
        let Some(cache_time) = time else {
            debug!("cache time unavailable, resetting");
            self.reset();
            self.observe_cache();
            return;
        };

        if self.cache.switch_pending && !self.host.cache_snapshot().seekable.is_empty() {
            self.cache.switch_pending = false;
            if self.settings.hostchange {
                debug!("seekable range available, observing track list");
                self.host.set_observed(ObservedProperty::TrackList, true);
            }
        }

        let elapsed = self.cache.elapsed(cache_time);
        let within_end = self.cache.end_after.is_none_or(|end| elapsed < end);
        if self.settings.autostart && !self.cache.dumped && (within_end || self.settings.piecewise) {
            self.start_piece(cache_time, events);
        }

        if self.cache.dumped
            && !self.cache.switch_pending
            && self.cache.end_after.is_none()
            && !self.settings.hostchange
        {
            self.set_tick_observed(false);
            return;
        }

        if let Some(end_after) = self.cache.end_after {
            if self.cache.elapsed(cache_time) >= end_after {
                self.end_piece(cache_time, events);
            }
        }
    }

    fn start_piece(&mut self, cache_time: f64, events: &mut Vec<Event>) {
        let piece = self.settings.piecewise && self.cache.part.is_some();
        let request = if piece {
            WriteRequest::quiet(DumpMode::Ab)
        } else {
            WriteRequest::new(DumpMode::Continuous)
        };
        let outcome = self.dispatch_logged(request, events);
        self.cache.dumped = outcome.accepted();
        debug!(?outcome, cache_time, piece, "automatic write dispatched");

        if self.cache.dumped && self.settings.piecewise && self.cache.origin_armed {
            self.cache.origin_armed = false;
            self.cache.piece_origin = cache_time;
        }
    }

    fn end_piece(&mut self, cache_time: f64, events: &mut Vec<Event>) {
        if !self.settings.piecewise {
            info!(cache_time, "end time reached");
            self.cache.end_after = None;
            self.stop_current_write();
            return;
        }

        let boundary = self
            .host
            .cache_snapshot()
            .cache_end()
            .unwrap_or(cache_time);
        info!(cache_time, boundary, "piece complete");
        self.cache.part = Some(boundary);

        // Replacing the range also drops any earlier alignment.
        self.loop_range = LoopRange::new(Some(boundary), None);
        self.host.set_loop_points(Some(boundary), None);
        self.align_cache(events);

        self.cache.dumped = false;
        self.cache.piece_origin = cache_time;
        self.stop_current_write();
    }

    /// Aborts the most recent open-ended write, if any.
    pub(crate) fn stop_current_write(&mut self) {
        match self.writes.latest_continuous() {
            Some(id) => {
                self.abort_writes(|write| write.id == id);
            }
            None => debug!("no open-ended write to stop"),
        }
    }
}
