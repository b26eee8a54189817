//! Real-time playback scheduler.
//!
//! Every timeline event is armed as a task on a single virtual transport.
//! [`PlaybackScheduler::tick`] fires the tasks that have come due, in
//! timestamp order, and for each one drives the audio engine and the stage
//! inside the same call, so no observer ever sees a sounding key that is
//! not lit or a lit key that is not sounding.
//!
//! `start` is `arm` then `run`; `stop` works from either state.
//!
//! ```text
//! Idle --arm--> Armed --run--> Running --stop--> Idle
//! ```

use crate::audio::AudioEngine;
use crate::error::Result;
use crate::stage::Stage;
use crate::timeline::{EventKind, Timeline, TimelineEvent};
use crate::timing::TransportClock;
use std::collections::VecDeque;
use std::time::Instant;

/// Lifecycle of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    /// Audio is up and every event is queued, the clock has not started
    Armed,
    Running,
}

/// A timeline event waiting for its firing time
#[derive(Debug, Clone)]
struct ScheduledTask {
    at: f64,
    event: TimelineEvent,
}

/// Time-ordered task queue bound to a transport clock.
#[derive(Debug, Default)]
struct Transport {
    clock: TransportClock,
    queue: VecDeque<ScheduledTask>,
}

impl Transport {
    /// Queue an event. Tasks with equal times fire in the order they were
    /// queued; a time that is already past fires on the next tick.
    fn schedule(&mut self, at: f64, event: TimelineEvent) {
        let at = at.max(0.0);
        let pos = self.queue.partition_point(|t| t.at <= at);
        self.queue.insert(pos, ScheduledTask { at, event });
    }

    /// Remove and return every task due at `now`.
    fn drain_due(&mut self, now: Instant) -> Vec<ScheduledTask> {
        let position = self.clock.seconds_at(now);
        let due = self.queue.partition_point(|t| t.at <= position);
        self.queue.drain(..due).collect()
    }

    /// Drop every pending task and rewind the clock.
    fn cancel_all(&mut self) -> usize {
        let cancelled = self.queue.len();
        self.queue.clear();
        self.clock.reset();
        cancelled
    }
}

/// Drives audio and visual state from a timeline in real time.
pub struct PlaybackScheduler {
    state: PlaybackState,
    transport: Transport,
    engine: Option<Box<dyn AudioEngine>>,
    fired: usize,
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            transport: Transport::default(),
            engine: None,
            fired: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlaybackState::Running
    }

    /// Number of events still waiting to fire
    pub fn pending(&self) -> usize {
        self.transport.queue.len()
    }

    /// Number of events fired in the current session
    pub fn fired(&self) -> usize {
        self.fired
    }

    /// Playback position at `now`, in seconds
    pub fn position(&self, now: Instant) -> f64 {
        self.transport.clock.seconds_at(now)
    }

    /// True once every armed event has fired
    pub fn is_finished(&self) -> bool {
        self.is_running() && self.pending() == 0
    }

    /// Start playing a timeline from the beginning: [`arm`](Self::arm)
    /// followed by [`run`](Self::run).
    ///
    /// A running session is stopped first. If the engine fails to
    /// activate, the scheduler stays idle and the error is returned.
    pub fn start(
        &mut self,
        timeline: &Timeline,
        engine: Box<dyn AudioEngine>,
        stage: &mut Stage,
        now: Instant,
    ) -> Result<()> {
        self.arm(timeline, engine, stage)?;
        self.run(now);
        log::info!(
            "Playback started: {} events over {:.2}s",
            timeline.len(),
            timeline.end_time()
        );
        Ok(())
    }

    /// Activate the engine and queue every timeline event without starting
    /// the clock. Nothing fires until [`run`](Self::run).
    ///
    /// A session that is armed or running is stopped first.
    pub fn arm(
        &mut self,
        timeline: &Timeline,
        mut engine: Box<dyn AudioEngine>,
        stage: &mut Stage,
    ) -> Result<()> {
        if self.state != PlaybackState::Idle {
            self.stop(stage);
        }

        if let Err(e) = engine.activate() {
            log::error!("Audio engine '{}' failed to start: {}", engine.name(), e);
            engine.dispose();
            return Err(e);
        }

        stage.reset();
        self.fired = 0;
        for event in timeline {
            self.transport.schedule(event.time, event.clone());
        }
        self.engine = Some(engine);
        self.state = PlaybackState::Armed;
        log::debug!("Armed {} event(s) on '{}'", self.pending(), self.engine_name());
        Ok(())
    }

    /// Start the clock of an armed session at `now`. Returns false unless
    /// the scheduler was armed.
    pub fn run(&mut self, now: Instant) -> bool {
        if self.state != PlaybackState::Armed {
            return false;
        }
        self.transport.clock.start(now);
        self.state = PlaybackState::Running;
        true
    }

    fn engine_name(&self) -> &str {
        self.engine.as_deref().map_or("-", |e| e.name())
    }

    /// Fire every event that is due at `now`. Returns how many fired.
    pub fn tick(&mut self, stage: &mut Stage, now: Instant) -> usize {
        if self.state != PlaybackState::Running {
            return 0;
        }
        let due = self.transport.drain_due(now);
        for task in &due {
            self.fire(&task.event, stage);
        }
        self.fired += due.len();
        due.len()
    }

    fn fire(&mut self, event: &TimelineEvent, stage: &mut Stage) {
        if let Some(engine) = self.engine.as_mut() {
            match event.kind {
                EventKind::On => engine.attack(&event.key, event.velocity),
                EventKind::Off => engine.release(&event.key),
            }
        }
        stage.apply(event);
        log::debug!(
            "{:>8.3}s {:?} {} | playing: {}",
            event.time,
            event.kind,
            event.key,
            stage.active_display()
        );
    }

    /// Stop playback: cancel pending events, silence and dispose the audio
    /// engine and clear the stage. Idempotent.
    pub fn stop(&mut self, stage: &mut Stage) {
        let cancelled = self.transport.cancel_all();
        if let Some(mut engine) = self.engine.take() {
            engine.release_all();
            engine.dispose();
        }
        stage.reset();
        if self.state != PlaybackState::Idle {
            log::info!(
                "Playback stopped after {} event(s), {} cancelled",
                self.fired,
                cancelled
            );
        }
        self.state = PlaybackState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::geometry::{build_keyboard, KeyboardLayout, LabelOptions, WHITE_KEY_FILL};
    use crate::performance::{Note, Performance, Track};
    use crate::stage::DEFAULT_HIGHLIGHT;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Journal {
        calls: Vec<String>,
    }

    struct RecordingEngine {
        journal: Arc<Mutex<Journal>>,
        fail: bool,
    }

    impl RecordingEngine {
        fn new(journal: &Arc<Mutex<Journal>>) -> Box<Self> {
            Box::new(Self {
                journal: journal.clone(),
                fail: false,
            })
        }

        fn log(&self, call: String) {
            self.journal.lock().unwrap().calls.push(call);
        }
    }

    impl AudioEngine for RecordingEngine {
        fn activate(&mut self) -> Result<()> {
            if self.fail {
                return Err(Error::Activation("autoplay denied".to_string()));
            }
            self.log("activate".to_string());
            Ok(())
        }
        fn attack(&mut self, pitch: &str, _velocity: f32) {
            self.log(format!("attack {}", pitch));
        }
        fn release(&mut self, pitch: &str) {
            self.log(format!("release {}", pitch));
        }
        fn release_all(&mut self) {
            self.log("release_all".to_string());
        }
        fn dispose(&mut self) {
            self.log("dispose".to_string());
        }
        fn name(&self) -> &str {
            "recording"
        }
    }

    fn stage() -> Stage {
        let keyboard = build_keyboard(KeyboardLayout::default(), LabelOptions::default()).unwrap();
        Stage::new(keyboard, DEFAULT_HIGHLIGHT)
    }

    fn timeline() -> Timeline {
        Timeline::build(&Performance::new(vec![Track::new(
            "piano",
            vec![Note::new("C4", 0.0, 1.0), Note::new("E4", 0.5, 1.0)],
        )]))
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_events_fire_at_their_time() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut scheduler = PlaybackScheduler::new();
        let mut stage = stage();
        let t0 = Instant::now();

        scheduler
            .start(&timeline(), RecordingEngine::new(&journal), &mut stage, t0)
            .unwrap();
        assert_eq!(scheduler.state(), PlaybackState::Running);
        assert_eq!(scheduler.pending(), 4);

        assert_eq!(scheduler.tick(&mut stage, t0), 1);
        assert!(stage.is_active("C4"));
        assert_eq!(stage.keyboard().fill("C4"), Some(DEFAULT_HIGHLIGHT));

        assert_eq!(scheduler.tick(&mut stage, t0 + secs(0.25)), 0);
        assert_eq!(scheduler.tick(&mut stage, t0 + secs(1.2)), 2);
        assert_eq!(stage.active_display(), "E4");
        assert_eq!(stage.keyboard().fill("C4"), Some(WHITE_KEY_FILL));

        assert_eq!(scheduler.tick(&mut stage, t0 + secs(2.0)), 1);
        assert!(scheduler.is_finished());
        assert_eq!(scheduler.fired(), 4);

        let calls = journal.lock().unwrap().calls.clone();
        assert_eq!(
            calls,
            vec!["activate", "attack C4", "attack E4", "release C4", "release E4"]
        );
    }

    #[test]
    fn test_stop_cancels_pending_and_tears_down() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut scheduler = PlaybackScheduler::new();
        let mut stage = stage();
        let t0 = Instant::now();

        scheduler
            .start(&timeline(), RecordingEngine::new(&journal), &mut stage, t0)
            .unwrap();
        scheduler.tick(&mut stage, t0 + secs(0.6));
        assert_eq!(stage.active_keys().len(), 2);

        scheduler.stop(&mut stage);
        assert_eq!(scheduler.state(), PlaybackState::Idle);
        assert_eq!(scheduler.pending(), 0);
        assert!(stage.active_keys().is_empty());
        assert_eq!(stage.keyboard().fill("E4"), Some(WHITE_KEY_FILL));

        // nothing fires after stop, even far past the remaining event times
        assert_eq!(scheduler.tick(&mut stage, t0 + secs(10.0)), 0);
        assert!(stage.active_keys().is_empty());

        let calls = journal.lock().unwrap().calls.clone();
        assert_eq!(&calls[calls.len() - 2..], ["release_all", "dispose"]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut scheduler = PlaybackScheduler::new();
        let mut stage = stage();
        scheduler.stop(&mut stage);
        scheduler.stop(&mut stage);
        assert_eq!(scheduler.state(), PlaybackState::Idle);
        assert_eq!(scheduler.pending(), 0);
        assert!(stage.active_keys().is_empty());
    }

    #[test]
    fn test_restart_stops_previous_session() {
        let first = Arc::new(Mutex::new(Journal::default()));
        let second = Arc::new(Mutex::new(Journal::default()));
        let mut scheduler = PlaybackScheduler::new();
        let mut stage = stage();
        let t0 = Instant::now();

        scheduler
            .start(&timeline(), RecordingEngine::new(&first), &mut stage, t0)
            .unwrap();
        scheduler.tick(&mut stage, t0 + secs(0.1));
        scheduler
            .start(&timeline(), RecordingEngine::new(&second), &mut stage, t0 + secs(0.2))
            .unwrap();

        assert!(first.lock().unwrap().calls.ends_with(&["release_all".to_string(), "dispose".to_string()]));
        assert_eq!(scheduler.pending(), 4);
        assert!(stage.active_keys().is_empty());
        // the new session starts from zero at its own start instant
        assert_eq!(scheduler.tick(&mut stage, t0 + secs(0.2)), 1);
    }

    #[test]
    fn test_activation_failure_leaves_idle() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut engine = RecordingEngine::new(&journal);
        engine.fail = true;
        let mut scheduler = PlaybackScheduler::new();
        let mut stage = stage();

        let err = scheduler
            .start(&timeline(), engine, &mut stage, Instant::now())
            .unwrap_err();
        assert!(matches!(err, Error::Activation(_)));
        assert_eq!(scheduler.state(), PlaybackState::Idle);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_armed_session_waits_for_run() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut scheduler = PlaybackScheduler::new();
        let mut stage = stage();
        let t0 = Instant::now();

        scheduler
            .arm(&timeline(), RecordingEngine::new(&journal), &mut stage)
            .unwrap();
        assert_eq!(scheduler.state(), PlaybackState::Armed);
        assert!(!scheduler.is_running());
        assert!(!scheduler.is_finished());
        assert_eq!(scheduler.pending(), 4);
        assert_eq!(scheduler.tick(&mut stage, t0 + secs(5.0)), 0);
        assert!(stage.active_keys().is_empty());

        assert!(scheduler.run(t0));
        assert!(!scheduler.run(t0));
        assert_eq!(scheduler.state(), PlaybackState::Running);
        assert_eq!(scheduler.tick(&mut stage, t0), 1);
        assert!(stage.is_active("C4"));
    }

    #[test]
    fn test_stop_from_armed() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut scheduler = PlaybackScheduler::new();
        let mut stage = stage();

        scheduler
            .arm(&timeline(), RecordingEngine::new(&journal), &mut stage)
            .unwrap();
        scheduler.stop(&mut stage);
        assert_eq!(scheduler.state(), PlaybackState::Idle);
        assert_eq!(scheduler.pending(), 0);
        assert!(!scheduler.run(Instant::now()));

        let calls = journal.lock().unwrap().calls.clone();
        assert_eq!(calls, vec!["activate", "release_all", "dispose"]);
    }

    #[test]
    fn test_transport_orders_out_of_order_schedules() {
        let mut transport = Transport::default();
        transport.schedule(2.0, TimelineEvent::on(2.0, "B4", 1.0));
        transport.schedule(1.0, TimelineEvent::on(1.0, "A4", 1.0));
        transport.schedule(1.0, TimelineEvent::off(1.0, "G4"));
        transport.schedule(-1.0, TimelineEvent::off(-1.0, "F4"));
        let keys: Vec<&str> = transport.queue.iter().map(|t| t.event.key.as_str()).collect();
        assert_eq!(keys, vec!["F4", "A4", "G4", "B4"]);
    }
}
