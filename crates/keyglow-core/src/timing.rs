//! Transport clock for live playback.
//!
//! The clock maps wall-clock [`Instant`]s to performance time in seconds.
//! It keeps an anchor (a performance position at a specific instant) so
//! that stopping preserves the position and starting resumes from it.
//! Callers pass `now` explicitly, which keeps scheduling deterministic in
//! tests.

use std::time::Instant;

#[derive(Clone, Debug)]
pub struct TransportClock {
    running: bool,
    anchor_instant: Instant,
    anchor_seconds: f64,
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportClock {
    /// Create a stopped clock at position zero.
    pub fn new() -> Self {
        Self {
            running: false,
            anchor_instant: Instant::now(),
            anchor_seconds: 0.0,
        }
    }

    /// Start the transport at the given instant.
    pub fn start(&mut self, now: Instant) {
        self.anchor_instant = now;
        self.running = true;
    }

    /// Stop the transport, preserving the current position.
    pub fn stop(&mut self, now: Instant) {
        self.anchor_seconds = self.seconds_at(now);
        self.running = false;
    }

    /// Stop and rewind to zero.
    pub fn reset(&mut self) {
        self.running = false;
        self.anchor_seconds = 0.0;
    }

    /// Performance position at a given instant.
    pub fn seconds_at(&self, time: Instant) -> f64 {
        if !self.running || time <= self.anchor_instant {
            return self.anchor_seconds;
        }
        self.anchor_seconds + time.duration_since(self.anchor_instant).as_secs_f64()
    }

    /// Position at the last anchor.
    pub fn current_seconds(&self) -> f64 {
        self.anchor_seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_advances_only_while_running() {
        let mut clock = TransportClock::new();
        let now = Instant::now();
        assert_eq!(clock.seconds_at(now + Duration::from_secs(3)), 0.0);

        clock.start(now);
        let later = now + Duration::from_millis(1500);
        assert!((clock.seconds_at(later) - 1.5).abs() < 1e-9);

        clock.stop(later);
        assert!(!clock.is_running());
        assert!((clock.seconds_at(later + Duration::from_secs(10)) - 1.5).abs() < 1e-9);
        assert!((clock.current_seconds() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_reset_rewinds() {
        let mut clock = TransportClock::new();
        let now = Instant::now();
        clock.start(now);
        clock.stop(now + Duration::from_secs(2));
        clock.reset();
        assert_eq!(clock.current_seconds(), 0.0);
    }
}
