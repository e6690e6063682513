//! Turns raw edge notifications into clean, rate-limited press events.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::ServiceError;
use crate::input::{EdgeSource, Level, PressEvent, Readiness};

/// Debouncer over an edge-triggered source.
///
/// Only transitions to the active level are press candidates, and a
/// candidate within the threshold of the previously emitted event is
/// dropped as switch bounce. The first press after startup always
/// qualifies.
pub struct Debouncer<S> {
    source: S,
    threshold: Duration,
    last_event: Option<Instant>,
}

impl<S: EdgeSource> Debouncer<S> {
    pub fn new(source: S, threshold: Duration) -> Self {
        Self {
            source,
            threshold,
            last_event: None,
        }
    }

    /// One bounded wait on the source.
    ///
    /// Returns `Ok(None)` when the wait timed out, the edge was to the
    /// inactive level, the read was empty, or the press was suppressed as
    /// bounce. The read cursor is rewound after every readiness
    /// notification; the sysfs value file only re-arms once the cursor is
    /// back at the start, and skipping this floods poll with stale
    /// readiness.
    pub fn next_press(&mut self, timeout: Duration) -> Result<Option<PressEvent>, ServiceError> {
        match self.source.wait_ready(timeout)? {
            Readiness::TimedOut => Ok(None),
            Readiness::Ready => {
                let event = match self.source.read_level()? {
                    None => None,
                    Some(level) => self.classify(level, Instant::now()),
                };
                self.source.rewind()?;
                Ok(event)
            }
        }
    }

    /// Debounce decision for one observed level at time `now`.
    fn classify(&mut self, level: Level, now: Instant) -> Option<PressEvent> {
        if level != Level::Active {
            return None;
        }
        if let Some(last) = self.last_event {
            if now.duration_since(last) < self.threshold {
                trace!("press suppressed as bounce");
                return None;
            }
        }
        self.last_event = Some(now);
        Some(PressEvent { at: now })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    const THRESHOLD: Duration = Duration::from_millis(50);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Scripted edge source: each step is either a poll timeout or a
    /// readiness notification whose read yields the given level (`None`
    /// models a zero-length read).
    #[derive(Default)]
    struct ScriptedSource {
        steps: VecDeque<Option<Option<Level>>>,
        pending: Option<Option<Level>>,
        rewinds: usize,
    }

    impl ScriptedSource {
        fn with_steps(steps: impl IntoIterator<Item = Option<Option<Level>>>) -> Self {
            Self {
                steps: steps.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    impl EdgeSource for ScriptedSource {
        fn wait_ready(&mut self, _timeout: Duration) -> Result<Readiness, ServiceError> {
            match self.steps.pop_front().flatten() {
                None => Ok(Readiness::TimedOut),
                some_read => {
                    self.pending = some_read;
                    Ok(Readiness::Ready)
                }
            }
        }

        fn read_level(&mut self) -> Result<Option<Level>, ServiceError> {
            Ok(self.pending.take().flatten())
        }

        fn rewind(&mut self) -> Result<(), ServiceError> {
            self.rewinds += 1;
            Ok(())
        }
    }

    #[test]
    fn timeout_produces_no_event_and_no_rewind() {
        let mut d = Debouncer::new(ScriptedSource::with_steps([None]), THRESHOLD);
        assert!(d.next_press(ms(10)).unwrap().is_none());
        assert_eq!(d.source.rewinds, 0);
    }

    #[test]
    fn zero_length_read_never_emits_but_rewinds() {
        let mut d = Debouncer::new(ScriptedSource::with_steps([Some(None)]), THRESHOLD);
        assert!(d.next_press(ms(10)).unwrap().is_none());
        assert_eq!(d.source.rewinds, 1);
    }

    #[test]
    fn inactive_level_never_emits() {
        let mut d = Debouncer::new(
            ScriptedSource::with_steps([Some(Some(Level::Inactive))]),
            THRESHOLD,
        );
        assert!(d.next_press(ms(10)).unwrap().is_none());
        assert_eq!(d.source.rewinds, 1);
    }

    #[test]
    fn active_edge_emits_and_rewinds() {
        let mut d = Debouncer::new(
            ScriptedSource::with_steps([Some(Some(Level::Active))]),
            THRESHOLD,
        );
        assert!(d.next_press(ms(10)).unwrap().is_some());
        assert_eq!(d.source.rewinds, 1);
    }

    #[test]
    fn bounce_within_threshold_is_suppressed() {
        // Edges at 0ms (active), 10ms (inactive, ignored), 30ms (active,
        // within 50ms of the emitted event): exactly one press, at t=0.
        let mut d = Debouncer::new(ScriptedSource::default(), THRESHOLD);
        let t0 = Instant::now();
        let first = d.classify(Level::Active, t0);
        assert_eq!(first.map(|p| p.at), Some(t0));
        assert!(d.classify(Level::Inactive, t0 + ms(10)).is_none());
        assert!(d.classify(Level::Active, t0 + ms(30)).is_none());
    }

    #[test]
    fn presses_past_the_threshold_both_emit() {
        let mut d = Debouncer::new(ScriptedSource::default(), THRESHOLD);
        let t0 = Instant::now();
        assert!(d.classify(Level::Active, t0).is_some());
        assert!(d.classify(Level::Active, t0 + ms(60)).is_some());
    }

    #[test]
    fn a_gap_of_exactly_the_threshold_emits() {
        let mut d = Debouncer::new(ScriptedSource::default(), THRESHOLD);
        let t0 = Instant::now();
        assert!(d.classify(Level::Active, t0).is_some());
        assert!(d.classify(Level::Active, t0 + THRESHOLD).is_some());
    }

    #[test]
    fn emitted_events_are_never_closer_than_the_threshold() {
        // Hammer the debouncer with an active edge every 10ms and check the
        // pairwise gaps of everything that came out.
        let mut d = Debouncer::new(ScriptedSource::default(), THRESHOLD);
        let t0 = Instant::now();
        let emitted: Vec<Instant> = (0..40)
            .filter_map(|i| d.classify(Level::Active, t0 + ms(10 * i)).map(|p| p.at))
            .collect();
        assert!(!emitted.is_empty());
        for pair in emitted.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= THRESHOLD);
        }
    }

    #[test]
    fn inactive_edges_do_not_reset_the_gap() {
        // A flurry of release edges between two presses must not delay the
        // second press.
        let mut d = Debouncer::new(ScriptedSource::default(), THRESHOLD);
        let t0 = Instant::now();
        assert!(d.classify(Level::Active, t0).is_some());
        assert!(d.classify(Level::Inactive, t0 + ms(20)).is_none());
        assert!(d.classify(Level::Inactive, t0 + ms(40)).is_none());
        assert!(d.classify(Level::Active, t0 + ms(55)).is_some());
    }
}
