//! Decoded performances: tracks of timed notes.
//!
//! A [`Performance`] is what the MIDI decoder hands to the rest of the
//! engine. It can be produced from a Standard MIDI File (see
//! [`crate::midi_file`]) or from its JSON form:
//!
//! ```json
//! { "tracks": [ { "name": "Piano", "notes": [
//!     { "name": "C4", "time": 0.0, "duration": 0.5, "velocity": 0.8 }
//! ] } ] }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single timed note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Pitch name, e.g. `C#4`
    pub name: String,
    /// Onset in seconds from the start of the performance
    pub time: f64,
    /// Length in seconds
    pub duration: f64,
    /// Normalised velocity (0.0..=1.0)
    #[serde(default = "default_velocity")]
    pub velocity: f32,
}

fn default_velocity() -> f32 {
    1.0
}

impl Note {
    pub fn new(name: impl Into<String>, time: f64, duration: f64) -> Self {
        Self {
            name: name.into(),
            time,
            duration,
            velocity: default_velocity(),
        }
    }

    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = velocity;
        self
    }

    /// Time at which the note stops sounding
    pub fn end(&self) -> f64 {
        self.time + self.duration
    }
}

/// One track of a performance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Track {
    pub fn new(name: impl Into<String>, notes: Vec<Note>) -> Self {
        Self {
            name: name.into(),
            notes,
        }
    }
}

/// A decoded musical piece.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub tracks: Vec<Track>,
}

impl Performance {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Parse the JSON form of a performance.
    ///
    /// Syntax errors surface as [`Error::Json`]; a document without a
    /// `tracks` list or with impossible note timing is
    /// [`Error::MalformedPerformance`].
    pub fn from_json(input: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(input)?;
        match value.get("tracks") {
            Some(serde_json::Value::Array(_)) => {}
            Some(_) => {
                return Err(Error::MalformedPerformance(
                    "'tracks' must be a list".to_string(),
                ))
            }
            None => {
                return Err(Error::MalformedPerformance(
                    "missing 'tracks' field".to_string(),
                ))
            }
        }
        let performance: Performance = serde_json::from_value(value)
            .map_err(|e| Error::MalformedPerformance(e.to_string()))?;
        performance.validate()?;
        Ok(performance)
    }

    /// Serialize to the JSON form accepted by [`Performance::from_json`].
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check note timing: onsets non-negative, durations non-negative, all finite.
    pub fn validate(&self) -> Result<()> {
        for (t, track) in self.tracks.iter().enumerate() {
            for note in &track.notes {
                if !note.time.is_finite() || note.time < 0.0 {
                    return Err(Error::MalformedPerformance(format!(
                        "track {} note {} has invalid onset {}",
                        t, note.name, note.time
                    )));
                }
                if !note.duration.is_finite() || note.duration < 0.0 {
                    return Err(Error::MalformedPerformance(format!(
                        "track {} note {} has invalid duration {}",
                        t, note.name, note.duration
                    )));
                }
            }
        }
        Ok(())
    }

    /// Total number of notes across all tracks
    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }

    /// End of the last sounding note, in seconds
    pub fn duration(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|t| t.notes.iter())
            .map(Note::end)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_is_latest_note_end() {
        let performance = Performance::new(vec![
            Track::new("a", vec![Note::new("C4", 0.0, 1.0), Note::new("E4", 2.0, 0.5)]),
            Track::new("b", vec![Note::new("G4", 1.0, 3.0)]),
        ]);
        assert_eq!(performance.duration(), 4.0);
        assert_eq!(performance.note_count(), 3);
        assert_eq!(Performance::default().duration(), 0.0);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"tracks":[{"name":"Piano","notes":[
            {"name":"C4","time":0.0,"duration":0.5,"velocity":0.8},
            {"name":"E4","time":0.5,"duration":0.5}
        ]}]}"#;
        let performance = Performance::from_json(json).unwrap();
        assert_eq!(performance.tracks.len(), 1);
        assert_eq!(performance.tracks[0].notes[1].velocity, 1.0);
        assert_eq!(performance.duration(), 1.0);
    }

    #[test]
    fn test_missing_tracks_is_malformed() {
        let err = Performance::from_json(r#"{"header":{}}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedPerformance(_)));

        let err = Performance::from_json(r#"{"tracks":3}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedPerformance(_)));

        let err = Performance::from_json("not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_invalid_timing_is_malformed() {
        let json = r#"{"tracks":[{"notes":[{"name":"C4","time":-1.0,"duration":0.5}]}]}"#;
        assert!(matches!(
            Performance::from_json(json),
            Err(Error::MalformedPerformance(_))
        ));
    }

    #[test]
    fn test_empty_performance_is_valid() {
        let performance = Performance::from_json(r#"{"tracks":[]}"#).unwrap();
        assert_eq!(performance.note_count(), 0);
    }
}
