//! Standard MIDI File decoding.
//!
//! Turns `.mid` bytes into a [`Performance`]: note-on/note-off pairs become
//! timed [`Note`]s, with tick positions converted to seconds through the
//! file's tempo map.

use crate::error::{Error, Result};
use crate::performance::{Note, Performance, Track};
use crate::pitch::note_name;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{BTreeMap, HashMap, VecDeque};

const US_PER_SECOND: f64 = 1_000_000.0;
/// 120 BPM, the tempo of a file without tempo events.
const DEFAULT_US_PER_BEAT: u64 = 500_000;

/// Piecewise-constant tempo map for metrical files.
#[derive(Debug, Clone)]
struct TempoMap {
    /// (tick, seconds at that tick, microseconds per beat from that tick on)
    segments: Vec<(u64, f64, u64)>,
    ticks_per_beat: f64,
}

impl TempoMap {
    fn new(smf: &Smf, ticks_per_beat: u16) -> Self {
        let mut changes: BTreeMap<u64, u64> = BTreeMap::new();
        for track in &smf.tracks {
            let mut tick = 0u64;
            for event in track {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Meta(MetaMessage::Tempo(uspb)) = event.kind {
                    changes.insert(tick, uspb.as_int() as u64);
                }
            }
        }
        changes.entry(0).or_insert(DEFAULT_US_PER_BEAT);

        let ticks_per_beat = ticks_per_beat.max(1) as f64;
        let mut segments = Vec::with_capacity(changes.len());
        let mut seconds = 0.0;
        let mut previous: Option<(u64, u64)> = None;
        for (tick, uspb) in changes {
            if let Some((p_tick, p_uspb)) = previous {
                seconds += (tick - p_tick) as f64 / ticks_per_beat * p_uspb as f64 / US_PER_SECOND;
            }
            segments.push((tick, seconds, uspb));
            previous = Some((tick, uspb));
        }

        Self {
            segments,
            ticks_per_beat,
        }
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let idx = self.segments.partition_point(|(t, _, _)| *t <= tick);
        let (start_tick, start_seconds, uspb) = self.segments[idx.saturating_sub(1)];
        start_seconds
            + (tick - start_tick) as f64 / self.ticks_per_beat * uspb as f64 / US_PER_SECOND
    }
}

enum Clock {
    Metrical(TempoMap),
    /// Seconds per tick for SMPTE timecode files
    Timecode(f64),
}

impl Clock {
    fn seconds_at(&self, tick: u64) -> f64 {
        match self {
            Clock::Metrical(map) => map.seconds_at(tick),
            Clock::Timecode(seconds_per_tick) => tick as f64 * seconds_per_tick,
        }
    }
}

impl Performance {
    /// Decode a Standard MIDI File.
    pub fn from_smf(bytes: &[u8]) -> Result<Self> {
        let smf = Smf::parse(bytes)?;
        let clock = match smf.header.timing {
            Timing::Metrical(tpb) => Clock::Metrical(TempoMap::new(&smf, tpb.as_int())),
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = fps.as_f32() as f64 * subframes.max(1) as f64;
                Clock::Timecode(1.0 / ticks_per_second)
            }
        };

        let mut tracks = Vec::with_capacity(smf.tracks.len());
        for (index, events) in smf.tracks.iter().enumerate() {
            let mut name = String::new();
            let mut notes = Vec::new();
            // (channel, key) -> queue of (start tick, velocity)
            let mut open: HashMap<(u8, u8), VecDeque<(u64, u8)>> = HashMap::new();
            let mut tick = 0u64;

            for event in events {
                tick += event.delta.as_int() as u64;
                match event.kind {
                    TrackEventKind::Meta(MetaMessage::TrackName(raw)) if name.is_empty() => {
                        name = String::from_utf8_lossy(raw).trim().to_string();
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let channel = channel.as_int();
                        match message {
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                                open.entry((channel, key.as_int()))
                                    .or_default()
                                    .push_back((tick, vel.as_int()));
                            }
                            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                                let key = key.as_int();
                                if let Some((start, vel)) =
                                    open.get_mut(&(channel, key)).and_then(VecDeque::pop_front)
                                {
                                    notes.push(make_note(&clock, key, start, tick, vel));
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }

            let dangling: usize = open.values().map(VecDeque::len).sum();
            if dangling > 0 {
                log::warn!(
                    "Track {} ends with {} unterminated note(s); closing them at the end of the track",
                    index,
                    dangling
                );
                for ((_, key), queue) in open {
                    for (start, vel) in queue {
                        notes.push(make_note(&clock, key, start, tick, vel));
                    }
                }
            }

            notes.sort_by(|a: &Note, b: &Note| a.time.total_cmp(&b.time));
            tracks.push(Track { name, notes });
        }

        let performance = Performance::new(tracks);
        log::info!(
            "Decoded MIDI file: {} track(s), {} note(s), {:.2}s",
            performance.tracks.len(),
            performance.note_count(),
            performance.duration()
        );
        Ok(performance)
    }
}

fn make_note(clock: &Clock, key: u8, start: u64, end: u64, velocity: u8) -> Note {
    let time = clock.seconds_at(start);
    Note::new(note_name(key), time, clock.seconds_at(end) - time)
        .with_velocity(velocity as f32 / 127.0)
}

/// Decode either a MIDI file or a JSON performance based on the file extension.
pub fn load_performance(path: &std::path::Path) -> Result<Performance> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("json") => Performance::from_json(&std::fs::read_to_string(path)?),
        Some("mid") | Some("midi") | Some("smf") => Performance::from_smf(&std::fs::read(path)?),
        other => Err(Error::Midi(format!(
            "unsupported performance file type {:?} for {}",
            other.unwrap_or(""),
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal SMF writer for test fixtures: one track, metrical timing.
    fn smf_bytes(ticks_per_beat: u16, track: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&ticks_per_beat.to_be_bytes());
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
        bytes.extend_from_slice(track);
        bytes
    }

    #[test]
    fn test_decodes_notes_at_default_tempo() {
        // 480 ticks per beat at 120 BPM: one beat = 0.5s
        let track = [
            0x00, 0x90, 60, 100, // C4 on at 0
            0x83, 0x60, 0x80, 60, 0, // C4 off at 480
            0x00, 0x90, 64, 127, // E4 on at 480
            0x83, 0x60, 0x90, 64, 0, // E4 off (velocity 0) at 960
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let performance = Performance::from_smf(&smf_bytes(480, &track)).unwrap();
        let notes = &performance.tracks[0].notes;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].name, "C4");
        assert!((notes[0].time - 0.0).abs() < 1e-9);
        assert!((notes[0].duration - 0.5).abs() < 1e-9);
        assert!((notes[0].velocity - 100.0 / 127.0).abs() < 1e-6);
        assert_eq!(notes[1].name, "E4");
        assert!((notes[1].time - 0.5).abs() < 1e-9);
        assert!((performance.duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_honours_tempo_changes() {
        let track = [
            0x00, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40, // 1_000_000 us/beat (60 BPM)
            0x00, 0x90, 60, 100,
            0x83, 0x60, 0x80, 60, 0, // off after one beat = 1s
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let performance = Performance::from_smf(&smf_bytes(480, &track)).unwrap();
        let note = &performance.tracks[0].notes[0];
        assert!((note.duration - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unterminated_notes_are_closed() {
        let track = [
            0x00, 0x90, 62, 90,
            0x83, 0x60, 0xFF, 0x2F, 0x00, // end of track at 480
        ];
        let performance = Performance::from_smf(&smf_bytes(480, &track)).unwrap();
        let note = &performance.tracks[0].notes[0];
        assert_eq!(note.name, "D4");
        assert!((note.end() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            Performance::from_smf(b"definitely not midi"),
            Err(Error::Midi(_))
        ));
    }
}
