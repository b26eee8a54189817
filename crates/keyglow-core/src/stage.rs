//! The shared rendering target.
//!
//! A [`Stage`] pairs the generated [`Keyboard`] with the set of keys that
//! are currently lit. Playback and export both mutate it exclusively through
//! [`Stage::apply`] and [`Stage::reset`], so the lit set and the key fills
//! never disagree.

use crate::color::Rgb;
use crate::geometry::Keyboard;
use crate::timeline::{EventKind, TimelineEvent};

/// Default highlight fill for lit keys.
pub const DEFAULT_HIGHLIGHT: Rgb = Rgb::new(0xFF, 0x4D, 0xAC);

#[derive(Debug, Clone)]
pub struct Stage {
    keyboard: Keyboard,
    highlight: Rgb,
    /// Lit keys in activation order
    active: Vec<String>,
}

impl Stage {
    pub fn new(keyboard: Keyboard, highlight: Rgb) -> Self {
        Self {
            keyboard,
            highlight,
            active: Vec::new(),
        }
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn highlight(&self) -> Rgb {
        self.highlight
    }

    /// Apply a single timeline event: `On` lights the key, `Off` restores
    /// its default fill.
    pub fn apply(&mut self, event: &TimelineEvent) {
        match event.kind {
            EventKind::On => {
                if !self.active.iter().any(|k| *k == event.key) {
                    self.active.push(event.key.clone());
                }
                if !self.keyboard.set_fill(&event.key, self.highlight) {
                    log::debug!("Key {} is outside the keyboard range", event.key);
                }
            }
            EventKind::Off => {
                self.active.retain(|k| *k != event.key);
                self.keyboard.reset_fill(&event.key);
            }
        }
    }

    /// Clear the lit set and return every key to its default fill.
    pub fn reset(&mut self) {
        self.active.clear();
        self.keyboard.reset_fills();
    }

    /// Lit keys in the order they went down
    pub fn active_keys(&self) -> &[String] {
        &self.active
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.iter().any(|k| k == key)
    }

    /// Human readable list of lit keys, `"None"` when nothing is lit.
    pub fn active_display(&self) -> String {
        if self.active.is_empty() {
            "None".to_string()
        } else {
            self.active.join(", ")
        }
    }

    /// Change the highlight colour, repainting keys that are currently lit.
    pub fn set_highlight(&mut self, color: Rgb) {
        self.highlight = color;
        for key in &self.active {
            self.keyboard.set_fill(key, color);
        }
    }

    /// Swap in a regenerated keyboard. Keys that are lit stay lit on the
    /// new keyboard if they still exist there.
    pub fn replace_keyboard(&mut self, keyboard: Keyboard) {
        self.keyboard = keyboard;
        for key in &self.active {
            self.keyboard.set_fill(key, self.highlight);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{build_keyboard, KeyboardLayout, LabelOptions, BLACK_KEY_FILL, WHITE_KEY_FILL};

    fn stage() -> Stage {
        let keyboard = build_keyboard(KeyboardLayout::default(), LabelOptions::default()).unwrap();
        Stage::new(keyboard, DEFAULT_HIGHLIGHT)
    }

    #[test]
    fn test_highlight_round_trip() {
        let mut stage = stage();
        stage.apply(&TimelineEvent::on(0.0, "C4", 1.0));
        stage.apply(&TimelineEvent::on(0.1, "C#4", 1.0));
        stage.apply(&TimelineEvent::on(0.2, "G5", 1.0));
        stage.apply(&TimelineEvent::off(0.3, "G5"));
        assert_eq!(stage.keyboard().fill("C4"), Some(DEFAULT_HIGHLIGHT));

        stage.apply(&TimelineEvent::off(0.4, "C4"));
        stage.apply(&TimelineEvent::off(0.5, "C#4"));
        assert_eq!(stage.keyboard().fill("C4"), Some(WHITE_KEY_FILL));
        assert_eq!(stage.keyboard().fill("C#4"), Some(BLACK_KEY_FILL));
        assert!(stage.active_keys().is_empty());
    }

    #[test]
    fn test_active_display() {
        let mut stage = stage();
        assert_eq!(stage.active_display(), "None");
        stage.apply(&TimelineEvent::on(0.0, "E4", 1.0));
        stage.apply(&TimelineEvent::on(0.0, "C4", 1.0));
        assert_eq!(stage.active_display(), "E4, C4");
    }

    #[test]
    fn test_out_of_range_key_is_tracked_but_not_painted() {
        let mut stage = stage();
        stage.apply(&TimelineEvent::on(0.0, "C0", 1.0));
        assert!(stage.is_active("C0"));
        assert!(stage.keyboard().fill("C0").is_none());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut stage = stage();
        stage.apply(&TimelineEvent::on(0.0, "A4", 1.0));
        stage.reset();
        assert!(stage.active_keys().is_empty());
        assert_eq!(stage.keyboard().fill("A4"), Some(WHITE_KEY_FILL));
    }

    #[test]
    fn test_highlight_change_repaints_lit_keys() {
        let mut stage = stage();
        stage.apply(&TimelineEvent::on(0.0, "D4", 1.0));
        let green = Rgb::new(0, 0xFF, 0);
        stage.set_highlight(green);
        assert_eq!(stage.keyboard().fill("D4"), Some(green));
        assert_eq!(stage.keyboard().fill("E4"), Some(WHITE_KEY_FILL));
    }

    #[test]
    fn test_replace_keyboard_keeps_lit_keys() {
        let mut stage = stage();
        stage.apply(&TimelineEvent::on(0.0, "C3", 1.0));
        let narrow = KeyboardLayout {
            start_octave: 4,
            octave_count: 2,
            ..KeyboardLayout::default()
        };
        let mut wide = narrow;
        wide.start_octave = 3;
        stage.replace_keyboard(build_keyboard(narrow, LabelOptions::default()).unwrap());
        assert!(!stage.keyboard().contains("C3"));
        stage.replace_keyboard(build_keyboard(wide, LabelOptions::default()).unwrap());
        assert_eq!(stage.keyboard().fill("C3"), Some(DEFAULT_HIGHLIGHT));
    }
}
