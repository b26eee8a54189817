//! Key-down/key-up timeline.
//!
//! Flattens every note of every track into a pair of discrete events and
//! orders them by time. The sort is stable, so events sharing a timestamp
//! keep the order in which they were produced: track by track, note by
//! note, each note's `On` directly followed by its `Off`.

use crate::performance::Performance;

/// Whether a key goes down or comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    On,
    Off,
}

/// A single key transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEvent {
    /// Seconds from the start of the performance.
    pub time: f64,
    pub kind: EventKind,
    /// Key identifier (pitch name)
    pub key: String,
    /// Normalised attack velocity; zero for `Off` events.
    pub velocity: f32,
}

impl TimelineEvent {
    pub fn on(time: f64, key: impl Into<String>, velocity: f32) -> Self {
        Self {
            time,
            kind: EventKind::On,
            key: key.into(),
            velocity,
        }
    }

    pub fn off(time: f64, key: impl Into<String>) -> Self {
        Self {
            time,
            kind: EventKind::Off,
            key: key.into(),
            velocity: 0.0,
        }
    }
}

/// Chronologically ordered key events of a performance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
}

impl Timeline {
    /// Build the timeline for a performance.
    ///
    /// Pure: the same performance always yields the same sequence.
    pub fn build(performance: &Performance) -> Self {
        let mut events = Vec::with_capacity(performance.note_count() * 2);
        for track in &performance.tracks {
            for note in &track.notes {
                events.push(TimelineEvent::on(note.time, note.name.clone(), note.velocity));
                events.push(TimelineEvent::off(note.end(), note.name.clone()));
            }
        }
        events.sort_by(|a, b| a.time.total_cmp(&b.time));

        log::debug!(
            "Built timeline with {} events from {} track(s)",
            events.len(),
            performance.tracks.len()
        );

        Self { events }
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn get(&self, index: usize) -> Option<&TimelineEvent> {
        self.events.get(index)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Timestamp of the last event (zero for an empty timeline)
    pub fn end_time(&self) -> f64 {
        self.events.last().map(|e| e.time).unwrap_or(0.0)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimelineEvent> {
        self.events.iter()
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a TimelineEvent;
    type IntoIter = std::slice::Iter<'a, TimelineEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
