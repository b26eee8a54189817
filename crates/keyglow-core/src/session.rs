//! A visualisation session.
//!
//! [`Session`] owns everything one user works with: the configuration, the
//! loaded performance, the stage and the playback scheduler. Playback and
//! export both go through it, which keeps them from fighting over the stage.

use crate::archive::FrameArchive;
use crate::audio::AudioEngine;
use crate::capture::FrameCapture;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{export_frames, ExportOutcome, Progress};
use crate::geometry::build_keyboard;
use crate::performance::Performance;
use crate::scheduler::{PlaybackScheduler, PlaybackState};
use crate::stage::Stage;
use crate::timeline::Timeline;
use std::time::Instant;

pub struct Session {
    config: Config,
    performance: Option<Performance>,
    stage: Stage,
    player: PlaybackScheduler,
}

impl Session {
    /// Create a session with a keyboard built from `config`.
    pub fn new(config: Config) -> Result<Self> {
        let keyboard = build_keyboard(config.layout(), config.label_options())?;
        let stage = Stage::new(keyboard, config.theme.highlight_color);
        Ok(Self {
            config,
            performance: None,
            stage,
            player: PlaybackScheduler::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn performance(&self) -> Option<&Performance> {
        self.performance.as_ref()
    }

    pub fn player(&self) -> &PlaybackScheduler {
        &self.player
    }

    pub fn is_playing(&self) -> bool {
        self.player.state() != PlaybackState::Idle
    }

    /// Replace the loaded performance. Any running playback is stopped.
    pub fn load_performance(&mut self, performance: Performance) {
        self.stop();
        log::info!(
            "Loaded performance: {} track(s), {} note(s), {:.2}s",
            performance.tracks.len(),
            performance.note_count(),
            performance.duration()
        );
        self.performance = Some(performance);
    }

    /// Start playback from the beginning, restarting if already playing.
    pub fn play(&mut self, engine: Box<dyn AudioEngine>, now: Instant) -> Result<()> {
        let performance = self.performance.as_ref().ok_or(Error::InputMissing)?;
        let timeline = Timeline::build(performance);
        self.player.start(&timeline, engine, &mut self.stage, now)
    }

    /// Stop if playing, otherwise start. Returns whether playback is now
    /// running.
    pub fn toggle(&mut self, engine: Box<dyn AudioEngine>, now: Instant) -> Result<bool> {
        if self.is_playing() {
            self.stop();
            Ok(false)
        } else {
            self.play(engine, now)?;
            Ok(true)
        }
    }

    /// Fire due playback events. Returns how many fired.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.player.tick(&mut self.stage, now)
    }

    /// True once playback has fired every event and the last note ended.
    pub fn is_finished(&self) -> bool {
        self.player.is_finished()
    }

    pub fn stop(&mut self) {
        self.player.stop(&mut self.stage);
    }

    /// Export the loaded performance frame by frame at the configured
    /// frame rate. Playback is stopped first.
    pub fn export<C, A, P>(
        &mut self,
        capture: &mut C,
        archive: A,
        progress: P,
    ) -> Result<ExportOutcome<A::Output>>
    where
        C: FrameCapture + ?Sized,
        A: FrameArchive,
        P: FnMut(Progress),
    {
        let performance = self.performance.as_ref().ok_or(Error::InputMissing)?;
        let timeline = Timeline::build(performance);
        let duration = performance.duration();
        self.player.stop(&mut self.stage);
        export_frames(
            &timeline,
            duration,
            self.config.export.frame_rate,
            &mut self.stage,
            capture,
            archive,
            progress,
        )
    }

    /// Apply a new configuration. The keyboard is regenerated only when
    /// geometry or labels changed; lit keys stay lit.
    pub fn apply_config(&mut self, config: Config) -> Result<()> {
        let layout = config.layout();
        let labels = config.label_options();
        let keyboard = self.stage.keyboard();
        if *keyboard.layout() != layout || *keyboard.label_options() != labels {
            let keyboard = build_keyboard(layout, labels)?;
            self.stage.replace_keyboard(keyboard);
        }
        if config.theme.highlight_color != self.stage.highlight() {
            self.stage.set_highlight(config.theme.highlight_color);
        }
        self.config = config;
        Ok(())
    }
}
