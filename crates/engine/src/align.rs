use tracing::{debug, info};

use crate::api::{Engine, Event};
use crate::host::Host;

impl<H> Engine<H>
where
    H: Host,
{
    /// Toggles between user-set loop points and keyframe-aligned ones.
    pub(crate) fn align_cache(&mut self, events: &mut Vec<Event>) {
        if self.loop_range.is_aligned() {
            let (a, b) = self.loop_range.restore();
            self.host.set_loop_points(a, b);
            info!(?a, ?b, "loop points restored");
            self.host.show_message("Loop points restored");
            events.push(Event::LoopRestored { a, b });
            return;
        }

        if self.loop_range.normalize() {
            self.host
                .set_loop_points(self.loop_range.a, self.loop_range.b);
        }
        self.host.align_loop_points();
        let (a, b) = self.host.loop_points();
        if self.loop_range.mark_aligned(a, b) {
            self.report_aligned(events);
        } else {
            debug!(?a, ?b, "waiting for aligned loop points");
        }
    }

    /// Host loop-point update; completes an alignment the host applied
    /// asynchronously.
    pub(crate) fn loop_points_changed(
        &mut self,
        a: Option<f64>,
        b: Option<f64>,
        events: &mut Vec<Event>,
    ) {
        if self.loop_range.report(a, b) {
            self.report_aligned(events);
        }
    }

    fn report_aligned(&mut self, events: &mut Vec<Event>) {
        let (a, b) = (self.loop_range.a, self.loop_range.b);
        info!(?a, ?b, "loop points aligned to keyframes");
        self.host.show_message("Loop points aligned to keyframes");
        events.push(Event::LoopAligned { a, b });
    }
}
