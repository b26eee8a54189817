//! Audio engine backends
//!
//! Playback drives an [`AudioEngine`]: it attacks and releases named
//! pitches at the instant their timeline event fires. The engine is
//! activated at the start of a playback session and disposed at its end.
//!
//! Currently supports JACK MIDI output (feeding any JACK synth) and a
//! silent engine that only logs.

use crate::error::Result;

/// Something that can sound pitches.
pub trait AudioEngine: Send {
    /// Acquire the audio resource. Fails with [`crate::Error::Activation`]
    /// if it cannot be started.
    fn activate(&mut self) -> Result<()>;

    /// Start sounding a pitch (velocity 0.0..=1.0)
    fn attack(&mut self, pitch: &str, velocity: f32);

    /// Stop sounding a pitch
    fn release(&mut self, pitch: &str);

    /// Stop everything that is still sounding
    fn release_all(&mut self);

    /// Release the audio resource. Safe to call more than once.
    fn dispose(&mut self);

    /// Name shown to the user
    fn name(&self) -> &str;
}

/// Engine that produces no sound (useful for testing or muted playback)
#[derive(Debug, Default)]
pub struct SilentEngine {
    sounding: Vec<String>,
}

impl SilentEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioEngine for SilentEngine {
    fn activate(&mut self) -> Result<()> {
        log::debug!("Silent engine activated");
        Ok(())
    }

    fn attack(&mut self, pitch: &str, velocity: f32) {
        log::debug!("Attack {} vel={:.2}", pitch, velocity);
        self.sounding.push(pitch.to_string());
    }

    fn release(&mut self, pitch: &str) {
        log::debug!("Release {}", pitch);
        if let Some(pos) = self.sounding.iter().position(|p| p == pitch) {
            self.sounding.remove(pos);
        }
    }

    fn release_all(&mut self) {
        self.sounding.clear();
    }

    fn dispose(&mut self) {
        self.sounding.clear();
    }

    fn name(&self) -> &str {
        "silent"
    }
}

/// Convert a normalised velocity to a MIDI velocity, never 0 (which would
/// read as a note-off).
pub fn midi_velocity(velocity: f32) -> u8 {
    (velocity.clamp(0.0, 1.0) * 127.0).round().max(1.0) as u8
}

#[cfg(feature = "native")]
pub use self::jack_engine::{JackEngine, MidiMessage};

#[cfg(feature = "native")]
mod jack_engine {
    use super::{midi_velocity, AudioEngine};
    use crate::config::AudioSettings;
    use crate::error::{Error, Result};
    use crate::pitch::parse_note;
    use std::sync::mpsc::{channel, Receiver, Sender};

    /// MIDI controller number for "All Notes Off"
    const ALL_NOTES_OFF: u8 = 123;

    /// MIDI message types
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MidiMessage {
        NoteOn { channel: u8, note: u8, velocity: u8 },
        NoteOff { channel: u8, note: u8 },
        ControlChange { channel: u8, controller: u8, value: u8 },
    }

    impl MidiMessage {
        /// Convert to raw MIDI bytes
        pub fn to_bytes(&self) -> [u8; 3] {
            match *self {
                MidiMessage::NoteOn { channel, note, velocity } => {
                    [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
                }
                MidiMessage::NoteOff { channel, note } => [0x80 | (channel & 0x0F), note & 0x7F, 0],
                MidiMessage::ControlChange { channel, controller, value } => {
                    [0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F]
                }
            }
        }
    }

    /// JACK process handler forwarding queued messages to the output port
    struct JackMidiHandler {
        midi_out: jack::Port<jack::MidiOut>,
        rx: Receiver<MidiMessage>,
    }

    impl jack::ProcessHandler for JackMidiHandler {
        fn process(&mut self, _client: &jack::Client, ps: &jack::ProcessScope) -> jack::Control {
            let mut writer = self.midi_out.writer(ps);
            while let Ok(msg) = self.rx.try_recv() {
                let bytes = msg.to_bytes();
                let raw = jack::RawMidi {
                    time: 0,
                    bytes: &bytes,
                };
                let _ = writer.write(&raw);
            }
            jack::Control::Continue
        }
    }

    struct ActiveJack {
        tx: Sender<MidiMessage>,
        client: jack::AsyncClient<(), JackMidiHandler>,
    }

    /// Sends note on/off to a JACK MIDI output port.
    pub struct JackEngine {
        settings: AudioSettings,
        active: Option<ActiveJack>,
        sounding: Vec<u8>,
    }

    impl JackEngine {
        pub fn new(settings: AudioSettings) -> Self {
            Self {
                settings,
                active: None,
                sounding: Vec::new(),
            }
        }

        fn send(&self, msg: MidiMessage) {
            if let Some(active) = &self.active {
                let _ = active.tx.send(msg);
            }
        }

        fn channel(&self) -> u8 {
            self.settings.channel.min(15)
        }
    }

    impl AudioEngine for JackEngine {
        fn activate(&mut self) -> Result<()> {
            if self.active.is_some() {
                return Ok(());
            }
            let (client, _status) = jack::Client::new(
                &self.settings.client_name,
                jack::ClientOptions::NO_START_SERVER,
            )
            .map_err(|e| Error::Activation(format!("cannot connect to JACK: {}", e)))?;

            let midi_out = client
                .register_port(&self.settings.port_name, jack::MidiOut::default())
                .map_err(|e| Error::Activation(format!("cannot register MIDI port: {}", e)))?;
            let full_port_name = format!("{}:{}", self.settings.client_name, self.settings.port_name);

            let (tx, rx) = channel();
            let client = client
                .activate_async((), JackMidiHandler { midi_out, rx })
                .map_err(|e| Error::Activation(format!("cannot activate JACK client: {}", e)))?;

            for dest in self.settings.auto_connect.iter().flatten() {
                if let Err(e) = client.as_client().connect_ports_by_name(&full_port_name, dest) {
                    log::warn!("Failed to auto-connect to {}: {}", dest, e);
                }
            }

            log::info!("JACK MIDI output active: {}", full_port_name);
            self.active = Some(ActiveJack { tx, client });
            Ok(())
        }

        fn attack(&mut self, pitch: &str, velocity: f32) {
            let Some(note) = parse_note(pitch) else {
                log::warn!("Cannot sound unknown pitch {}", pitch);
                return;
            };
            self.send(MidiMessage::NoteOn {
                channel: self.channel(),
                note,
                velocity: midi_velocity(velocity),
            });
            self.sounding.push(note);
        }

        fn release(&mut self, pitch: &str) {
            let Some(note) = parse_note(pitch) else {
                return;
            };
            self.send(MidiMessage::NoteOff {
                channel: self.channel(),
                note,
            });
            if let Some(pos) = self.sounding.iter().position(|n| *n == note) {
                self.sounding.remove(pos);
            }
        }

        fn release_all(&mut self) {
            let channel = self.channel();
            for note in std::mem::take(&mut self.sounding) {
                self.send(MidiMessage::NoteOff { channel, note });
            }
            self.send(MidiMessage::ControlChange {
                channel,
                controller: ALL_NOTES_OFF,
                value: 0,
            });
        }

        fn dispose(&mut self) {
            if let Some(active) = self.active.take() {
                drop(active.tx);
                if let Err(e) = active.client.deactivate() {
                    log::warn!("Failed to deactivate JACK client: {}", e);
                }
                log::info!("JACK MIDI output closed");
            }
            self.sounding.clear();
        }

        fn name(&self) -> &str {
            &self.settings.client_name
        }
    }

    impl Drop for JackEngine {
        fn drop(&mut self) {
            self.dispose();
        }
    }

}
