//! keyglow-core - MIDI-synchronized keyboard visualization.
//!
//! Renders a performance onto a virtual keyboard, plays it back with
//! audio and highlighting kept in lockstep, and exports it as a sequence
//! of still frames for assembling into a video.
//!
//! - **Geometry** - key rectangles, fills and labels for an octave range
//! - **Timeline** - notes flattened into ordered key-down/key-up events
//! - **Scheduler** - real-time playback against a transport clock
//! - **Export** - deterministic frame-by-frame reconstruction
//! - **Session** - owns config, performance, stage and player
//!
//! # Usage
//!
//! ```no_run
//! use keyglow_core::{Config, MemoryArchive, Performance, Session, SvgCapture};
//!
//! # fn main() -> keyglow_core::Result<()> {
//! let mut session = Session::new(Config::default())?;
//! let bytes = std::fs::read("song.mid")?;
//! session.load_performance(Performance::from_smf(&bytes)?);
//!
//! let outcome = session.export(&mut SvgCapture, MemoryArchive::new(), |p| {
//!     println!("{}%", p.percent());
//! })?;
//! println!("{} frames", outcome.frames);
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `native` (default) - JACK MIDI output engine

pub mod archive;
pub mod audio;
pub mod capture;
pub mod color;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod midi_file;
pub mod performance;
pub mod pitch;
pub mod scheduler;
pub mod session;
pub mod stage;
pub mod timeline;
pub mod timing;

// Re-export main types
pub use archive::{FrameArchive, MemoryArchive, TarArchive};
pub use audio::{AudioEngine, SilentEngine};
pub use capture::{FrameCapture, PngCapture, SvgCapture};
pub use color::Rgb;
pub use config::{Config, FrameFormat};
pub use error::{Error, Result};
pub use export::{export_frames, frame_count, frame_name, ExportCursor, ExportOutcome, Progress};
pub use geometry::{build_keyboard, Key, KeyColor, Keyboard, KeyboardLayout, LabelOptions};
pub use midi_file::load_performance;
pub use performance::{Note, Performance, Track};
pub use scheduler::{PlaybackScheduler, PlaybackState};
pub use session::Session;
pub use stage::{Stage, DEFAULT_HIGHLIGHT};
pub use timeline::{EventKind, Timeline, TimelineEvent};
pub use timing::TransportClock;

#[cfg(feature = "native")]
pub use audio::JackEngine;
