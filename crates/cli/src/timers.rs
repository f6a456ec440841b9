use std::time::{Duration, Instant};

use cachedump_engine::TimerKind;

/// Deadlines of the timers the engine asked for.
#[derive(Debug, Default)]
pub struct TimerWheel {
    entries: Vec<(Instant, TimerKind, u64)>,
}

impl TimerWheel {
    pub fn schedule(&mut self, kind: TimerKind, generation: u64, after: Duration, now: Instant) {
        self.entries.push((now + after, kind, generation));
    }

    pub fn cancel(&mut self, kind: TimerKind, generation: u64) {
        self.entries
            .retain(|(_, entry_kind, entry_generation)| {
                (*entry_kind, *entry_generation) != (kind, generation)
            });
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|(deadline, ..)| *deadline).min()
    }

    /// Removes and returns every timer due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(TimerKind, u64)> {
        let mut due: Vec<_> = self
            .entries
            .iter()
            .filter(|(deadline, ..)| *deadline <= now)
            .copied()
            .collect();
        self.entries.retain(|(deadline, ..)| *deadline > now);
        due.sort_by_key(|(deadline, ..)| *deadline);
        due.into_iter()
            .map(|(_, kind, generation)| (kind, generation))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use cachedump_engine::TimerKind;

    use super::TimerWheel;

    #[test]
    fn due_timers_fire_in_deadline_order() {
        let now = Instant::now();
        let mut wheel = TimerWheel::default();
        wheel.schedule(TimerKind::Restart, 2, Duration::from_secs(5), now);
        wheel.schedule(TimerKind::Suspend, 1, Duration::from_secs(1), now);
        wheel.schedule(TimerKind::Quit, 3, Duration::from_secs(60), now);

        assert_eq!(wheel.next_deadline(), Some(now + Duration::from_secs(1)));
        let due = wheel.take_due(now + Duration::from_secs(10));

        assert_eq!(due, vec![(TimerKind::Suspend, 1), (TimerKind::Restart, 2)]);
        assert_eq!(wheel.next_deadline(), Some(now + Duration::from_secs(60)));
    }

    #[test]
    fn cancel_matches_kind_and_generation() {
        let now = Instant::now();
        let mut wheel = TimerWheel::default();
        wheel.schedule(TimerKind::Suspend, 1, Duration::ZERO, now);
        wheel.schedule(TimerKind::Suspend, 2, Duration::ZERO, now);

        wheel.cancel(TimerKind::Suspend, 1);

        assert_eq!(wheel.take_due(now), vec![(TimerKind::Suspend, 2)]);
    }
}
