// Collision -> note dispatch, throttled by a trailing-edge debounce.

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::music::{Note, ScaleKind, ScheduledNote};

/// Pending-deadline holder. Arming while already armed pushes the deadline
/// back, so a burst of arms collapses into one fire at the end of the burst.
#[derive(Clone, Copy, Debug, Default)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self { window, deadline: None }
    }

    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    // true exactly once per quiet period
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

pub struct NoteTrigger {
    debounce: Debounce,
    rng: StdRng,
}

impl NoteTrigger {
    pub fn new(window: Duration) -> Self {
        Self::with_rng(window, StdRng::from_entropy())
    }

    pub fn with_seed(window: Duration, seed: u64) -> Self {
        Self::with_rng(window, StdRng::seed_from_u64(seed))
    }

    fn with_rng(window: Duration, rng: StdRng) -> Self {
        Self {
            debounce: Debounce::new(window),
            rng,
        }
    }

    pub fn on_collision(&mut self, now: Instant) {
        self.debounce.arm(now);
    }

    pub fn cancel(&mut self) {
        self.debounce.cancel();
    }

    /// Fire if the quiet period is over. Content comes from whatever scale is
    /// active *now*, not when the collisions happened. When the chain isn't up
    /// yet the fire is consumed and nothing is returned.
    pub fn poll(&mut self, now: Instant, kind: ScaleKind, scale: &[Note], chain_ready: bool) -> Vec<ScheduledNote> {
        if !self.debounce.fire_due(now) || !chain_ready {
            return Vec::new();
        }
        kind.play_pattern(scale, &mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::ScaleType;
    use crate::shared::DEBOUNCE_WINDOW;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn a_minor() -> Vec<Note> {
        ScaleType::Minor.notes("A", 3)
    }

    #[test]
    fn test_burst_collapses_into_one_fire() {
        let t0 = Instant::now();
        let mut trigger = NoteTrigger::with_seed(DEBOUNCE_WINDOW, 3);
        let scale = a_minor();

        trigger.on_collision(t0);
        trigger.on_collision(t0 + ms(10));

        let mut fired = 0;
        for step in 0..20 {
            let now = t0 + ms(step * 5);
            if !trigger.poll(now, ScaleKind::Standard, &scale, true).is_empty() {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert!(trigger.debounce.deadline.is_none());
    }

    #[test]
    fn test_fires_at_end_of_window_not_before() {
        let t0 = Instant::now();
        let mut trigger = NoteTrigger::with_seed(ms(50), 3);
        let scale = a_minor();
        trigger.on_collision(t0);
        trigger.on_collision(t0 + ms(10));
        assert!(trigger.poll(t0 + ms(55), ScaleKind::Standard, &scale, true).is_empty());
        assert_eq!(trigger.poll(t0 + ms(60), ScaleKind::Standard, &scale, true).len(), 1);
    }

    #[test]
    fn test_separate_quiet_periods_fire_separately() {
        let t0 = Instant::now();
        let mut trigger = NoteTrigger::with_seed(ms(50), 9);
        let scale = a_minor();
        trigger.on_collision(t0);
        assert_eq!(trigger.poll(t0 + ms(50), ScaleKind::Standard, &scale, true).len(), 1);
        trigger.on_collision(t0 + ms(200));
        assert_eq!(trigger.poll(t0 + ms(260), ScaleKind::Standard, &scale, true).len(), 1);
    }

    #[test]
    fn test_not_ready_drops_instead_of_queueing() {
        let t0 = Instant::now();
        let mut trigger = NoteTrigger::with_seed(ms(50), 1);
        let scale = a_minor();
        trigger.on_collision(t0);
        assert!(trigger.poll(t0 + ms(60), ScaleKind::Standard, &scale, false).is_empty());
        // the dropped fire is gone for good
        assert!(trigger.poll(t0 + ms(120), ScaleKind::Standard, &scale, true).is_empty());
    }

    #[test]
    fn test_empty_scale_plays_nothing() {
        let t0 = Instant::now();
        let mut trigger = NoteTrigger::with_seed(ms(50), 1);
        trigger.on_collision(t0);
        let bogus = ScaleType::Major.notes("Z", 3);
        assert!(trigger.poll(t0 + ms(60), ScaleKind::Standard, &bogus, true).is_empty());
    }

    #[test]
    fn test_debounce_cancel() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(ms(50));
        debounce.arm(t0);
        debounce.cancel();
        assert!(!debounce.fire_due(t0 + ms(100)));
    }
}
