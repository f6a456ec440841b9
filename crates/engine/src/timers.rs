use std::time::Duration;

use tracing::debug;

use crate::host::{Host, TimerKind};

/// Armed host timers, one slot per kind.
///
/// Each arm gets a fresh generation; a firing only counts when its
/// generation matches the armed slot, so a killed or re-armed timer can never
/// act on superseded state.
#[derive(Debug, Default)]
pub struct Timers {
    armed: [Option<u64>; 3],
    next_generation: u64,
}

impl Timers {
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed[kind.index()].is_some()
    }

    /// Arms `kind`, killing any previous arm of the same kind.
    pub fn arm<H: Host>(&mut self, host: &mut H, kind: TimerKind, after: Duration) {
        self.kill(host, kind);
        self.next_generation += 1;
        let generation = self.next_generation;
        self.armed[kind.index()] = Some(generation);
        debug!(?kind, generation, after_secs = after.as_secs_f64(), "timer armed");
        host.schedule_timer(kind, generation, after);
    }

    pub fn kill<H: Host>(&mut self, host: &mut H, kind: TimerKind) {
        if let Some(generation) = self.armed[kind.index()].take() {
            debug!(?kind, generation, "timer killed");
            host.cancel_timer(kind, generation);
        }
    }

    /// Consumes a firing. Returns false for stale generations.
    pub fn fire(&mut self, kind: TimerKind, generation: u64) -> bool {
        let slot = &mut self.armed[kind.index()];
        if *slot == Some(generation) {
            *slot = None;
            true
        } else {
            debug!(?kind, generation, "stale timer ignored");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Timers;
    use crate::host::TimerKind;
    use crate::testing::RecordingHost;

    #[test]
    fn rearm_invalidates_previous_generation() {
        let mut host = RecordingHost::default();
        let mut timers = Timers::default();

        timers.arm(&mut host, TimerKind::Suspend, Duration::from_secs(25));
        timers.arm(&mut host, TimerKind::Suspend, Duration::from_secs(25));

        assert!(!timers.fire(TimerKind::Suspend, 1));
        assert!(timers.is_armed(TimerKind::Suspend));
        assert!(timers.fire(TimerKind::Suspend, 2));
        assert!(!timers.is_armed(TimerKind::Suspend));
        assert_eq!(host.cancelled_timers(), vec![(TimerKind::Suspend, 1)]);
    }

    #[test]
    fn kill_disarms_without_firing() {
        let mut host = RecordingHost::default();
        let mut timers = Timers::default();

        timers.arm(&mut host, TimerKind::Restart, Duration::from_secs(300));
        timers.kill(&mut host, TimerKind::Restart);

        assert!(!timers.is_armed(TimerKind::Restart));
        assert!(!timers.fire(TimerKind::Restart, 1));
    }
}
