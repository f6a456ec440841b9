/// Where the automatic write stands relative to cache time.
///
/// Reset on file load, on a stream discontinuity and when the cache-time
/// signal disappears.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheState {
    /// An automatic write is open (or accepted) for the active source.
    pub dumped: bool,
    /// The seamless reload gate is watching cache-state updates.
    pub seamless: bool,
    /// Remaining end-time requirement in seconds of cache time.
    pub end_after: Option<f64>,
    /// Cache time at which the current piece started.
    pub piece_origin: f64,
    /// Seekable end recorded when a host change was detected.
    pub seek_end: f64,
    /// Cache-resident boundary where the next piece starts.
    pub part: Option<f64>,
    /// Track observation has not been armed yet.
    pub switch_pending: bool,
    /// The next successful dispatch records the piece origin.
    pub origin_armed: bool,
    /// Cache duration seen on the previous cache-state update.
    pub last_duration: Option<f64>,
}

impl CacheState {
    pub fn new(end_after: Option<f64>) -> Self {
        Self {
            dumped: false,
            seamless: false,
            end_after,
            piece_origin: 0.0,
            seek_end: 0.0,
            part: None,
            switch_pending: true,
            origin_armed: true,
            last_duration: None,
        }
    }

    pub fn reset(&mut self, end_after: Option<f64>) {
        *self = Self::new(end_after);
    }

    /// Seconds of cache time accumulated by the current piece.
    pub fn elapsed(&self, cache_time: f64) -> f64 {
        cache_time - self.piece_origin
    }
}

/// User-facing A-B loop points with a reversible keyframe alignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopRange {
    pub a: Option<f64>,
    pub b: Option<f64>,
    aligned: bool,
    /// Alignment was requested but the host still reports the old points.
    settling: bool,
    revert: (Option<f64>, Option<f64>),
}

impl LoopRange {
    pub fn new(a: Option<f64>, b: Option<f64>) -> Self {
        Self {
            a,
            b,
            ..Self::default()
        }
    }

    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    /// Swaps inverted points. Returns true when a swap happened.
    pub fn normalize(&mut self) -> bool {
        match (self.a, self.b) {
            (Some(a), Some(b)) if a > b => {
                self.a = Some(b);
                self.b = Some(a);
                true
            }
            _ => false,
        }
    }

    /// Only the start point is set; the write has no predetermined end.
    pub fn is_open_ended(&self) -> bool {
        self.a.is_some() && self.b.is_none()
    }

    /// Records the current points and enters the aligned state with the
    /// points the host reports right after aligning.
    ///
    /// Returns false when those are still the old points; the aligned ones
    /// then arrive later through [`LoopRange::report`].
    pub fn mark_aligned(&mut self, a: Option<f64>, b: Option<f64>) -> bool {
        self.revert = (self.a, self.b);
        self.a = a;
        self.b = b;
        self.aligned = true;
        self.settling = (a, b) == self.revert;
        !self.settling
    }

    /// Applies host-reported points. Returns true when they complete a
    /// pending alignment.
    pub fn report(&mut self, a: Option<f64>, b: Option<f64>) -> bool {
        self.a = a;
        self.b = b;
        if self.settling && (a, b) != self.revert {
            self.settling = false;
            return true;
        }
        false
    }

    /// Leaves the aligned state and returns the restored points.
    pub fn restore(&mut self) -> (Option<f64>, Option<f64>) {
        self.a = self.revert.0;
        self.b = self.revert.1;
        self.aligned = false;
        self.settling = false;
        (self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheState, LoopRange};

    #[test]
    fn reset_rearms_latches_and_clears_progress() {
        let mut state = CacheState::new(Some(10.0));
        state.dumped = true;
        state.part = Some(12.5);
        state.switch_pending = false;
        state.origin_armed = false;
        state.end_after = None;

        state.reset(Some(10.0));

        assert!(!state.dumped);
        assert_eq!(state.part, None);
        assert!(state.switch_pending);
        assert!(state.origin_armed);
        assert_eq!(state.end_after, Some(10.0));
    }

    #[test]
    fn normalize_swaps_inverted_points_only() {
        let mut range = LoopRange::new(Some(9.0), Some(3.0));
        assert!(range.normalize());
        assert_eq!((range.a, range.b), (Some(3.0), Some(9.0)));
        assert!(!range.normalize());

        let mut open = LoopRange::new(Some(4.0), None);
        assert!(!open.normalize());
        assert!(open.is_open_ended());
    }

    #[test]
    fn restore_returns_pre_alignment_points() {
        let mut range = LoopRange::new(Some(1.2), Some(7.7));
        assert!(range.mark_aligned(Some(1.0), Some(8.0)));
        assert!(range.is_aligned());

        assert_eq!(range.restore(), (Some(1.2), Some(7.7)));
        assert!(!range.is_aligned());
    }

    #[test]
    fn late_host_report_completes_alignment() {
        let mut range = LoopRange::new(Some(1.2), Some(7.7));
        assert!(!range.mark_aligned(Some(1.2), Some(7.7)));

        assert!(!range.report(Some(1.2), Some(7.7)));
        assert!(range.report(Some(1.0), Some(8.0)));
        assert!(!range.report(Some(1.0), Some(8.0)));
        assert_eq!(range.restore(), (Some(1.2), Some(7.7)));
    }
}
