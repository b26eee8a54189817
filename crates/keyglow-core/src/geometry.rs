//! Keyboard geometry
//!
//! Generates the key rectangles and optional labels for a piano keyboard
//! spanning a range of octaves. The resulting [`Keyboard`] is the scene that
//! playback and frame export paint into: every key is addressable by its
//! pitch name and carries its current fill colour.
//!
//! ```text
//!  |C#| |D#|   |F#| |G#| |A#|
//! | C | D | E | F | G | A | B | C ...
//! ```

use crate::color::Rgb;
use crate::error::{Error, Result};
use crate::pitch::{sharp_of, WHITE_LETTERS};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Horizontal gap between neighbouring white keys, in pixels.
pub const KEY_GAP: f32 = 2.0;

/// Resting fill of a white key.
pub const WHITE_KEY_FILL: Rgb = Rgb::new(0xD9, 0xD9, 0xD9);

/// Resting fill of a black key.
pub const BLACK_KEY_FILL: Rgb = Rgb::new(0x11, 0x11, 0x11);

/// Largest supported number of octaves.
pub const MAX_OCTAVES: u32 = 128;

/// Distance of white-key label baselines from the bottom edge.
const WHITE_LABEL_INSET: f32 = 7.0;
/// Distance of black-key label baselines from the bottom edge.
const BLACK_LABEL_INSET: f32 = 5.0;

/// Colour class of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyColor {
    White,
    Black,
}

impl KeyColor {
    /// Fill used when the key is not highlighted
    pub fn default_fill(self) -> Rgb {
        match self {
            KeyColor::White => WHITE_KEY_FILL,
            KeyColor::Black => BLACK_KEY_FILL,
        }
    }

    /// Text colour for labels drawn on this key
    pub fn label_fill(self) -> Rgb {
        match self {
            KeyColor::White => BLACK_KEY_FILL,
            KeyColor::Black => WHITE_KEY_FILL,
        }
    }
}

/// Axis-aligned key rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl KeyRect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// A single key of the generated keyboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    /// Pitch name, e.g. `C#4`
    pub id: String,
    pub color: KeyColor,
    pub rect: KeyRect,
    pub octave: i32,
}

/// Key dimensions and octave range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyboardLayout {
    pub white_width: f32,
    pub white_height: f32,
    pub black_width: f32,
    pub black_height: f32,
    /// Octave number of the leftmost C
    pub start_octave: i32,
    pub octave_count: u32,
}

impl Default for KeyboardLayout {
    fn default() -> Self {
        Self {
            white_width: 24.0,
            white_height: 120.0,
            black_width: 14.0,
            black_height: 75.0,
            start_octave: 3,
            octave_count: 5,
        }
    }
}

impl KeyboardLayout {
    /// Check that the layout can produce a well-formed keyboard.
    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("white key width", self.white_width),
            ("white key height", self.white_height),
            ("black key width", self.black_width),
            ("black key height", self.black_height),
        ];
        for (name, value) in dims {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidGeometry(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.octave_count == 0 {
            return Err(Error::InvalidGeometry(
                "at least one octave is required".to_string(),
            ));
        }
        if self.octave_count > MAX_OCTAVES {
            return Err(Error::InvalidGeometry(format!(
                "at most {} octaves are supported, got {}",
                MAX_OCTAVES, self.octave_count
            )));
        }
        self.last_octave()?;
        // A black key is centred on the right edge of its white key, so it
        // must stay narrower than two white keys to start inside it.
        if self.black_width >= 2.0 * self.white_width {
            return Err(Error::InvalidGeometry(format!(
                "black key width {} must be less than twice the white key width {}",
                self.black_width, self.white_width
            )));
        }
        Ok(())
    }

    /// Octave number of the rightmost key, if it fits in an `i32`.
    fn last_octave(&self) -> Result<i32> {
        i32::try_from(self.octave_count.saturating_sub(1))
            .ok()
            .and_then(|extra| self.start_octave.checked_add(extra))
            .ok_or_else(|| {
                Error::InvalidGeometry(format!(
                    "{} octaves starting at octave {} run past the largest octave number",
                    self.octave_count, self.start_octave
                ))
            })
    }

    pub fn white_key_count(&self) -> usize {
        self.octave_count as usize * WHITE_LETTERS.len()
    }

    pub fn black_key_count(&self) -> usize {
        self.octave_count as usize * 5
    }

    /// Total canvas width: white keys plus the gaps between them.
    pub fn width(&self) -> f32 {
        self.white_key_count() as f32 * (self.white_width + KEY_GAP) - KEY_GAP
    }

    pub fn height(&self) -> f32 {
        self.white_height
    }

    /// Black key height, never taller than the white keys.
    pub fn effective_black_height(&self) -> f32 {
        self.black_height.min(self.white_height)
    }
}

/// Label decoration settings. Labels never influence key geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelOptions {
    pub visible: bool,
    /// Label only the C of every octave
    pub root_only: bool,
    pub font_size: f32,
}

impl Default for LabelOptions {
    fn default() -> Self {
        Self {
            visible: false,
            root_only: false,
            font_size: 12.0,
        }
    }
}

impl LabelOptions {
    fn labels(&self, color: KeyColor, letter: char) -> bool {
        if !self.visible {
            return false;
        }
        match color {
            KeyColor::White => !self.root_only || letter == 'C',
            KeyColor::Black => !self.root_only,
        }
    }
}

/// Text decoration anchored at its centre.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub key_id: String,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub color: Rgb,
}

/// The rendered keyboard: keys addressable by pitch name, each with a fill.
///
/// Keys are stored in paint order (all white keys, then all black keys) so
/// black keys overlap their neighbours when drawn front to back.
#[derive(Debug, Clone)]
pub struct Keyboard {
    layout: KeyboardLayout,
    label_options: LabelOptions,
    keys: Vec<Key>,
    fills: Vec<Rgb>,
    index: HashMap<String, usize>,
    labels: Vec<Label>,
}

/// Build a complete keyboard for the given layout.
///
/// The result replaces any previous keyboard wholesale; there is no
/// incremental update across layout changes.
pub fn build_keyboard(layout: KeyboardLayout, labels: LabelOptions) -> Result<Keyboard> {
    layout.validate()?;

    let mut keys = Vec::with_capacity(layout.white_key_count() + layout.black_key_count());
    let mut text = Vec::new();
    let mut x = 0.0f32;

    for octave in layout.start_octave..=layout.last_octave()? {
        for letter in WHITE_LETTERS {
            let id = format!("{}{}", letter, octave);
            let rect = KeyRect {
                x,
                y: 0.0,
                width: layout.white_width,
                height: layout.white_height,
            };
            if labels.labels(KeyColor::White, letter) {
                text.push(Label {
                    key_id: id.clone(),
                    text: id.clone(),
                    x: rect.center_x(),
                    y: layout.white_height - WHITE_LABEL_INSET,
                    font_size: labels.font_size,
                    color: KeyColor::White.label_fill(),
                });
            }
            keys.push(Key {
                id,
                color: KeyColor::White,
                rect,
                octave,
            });
            x += layout.white_width + KEY_GAP;
        }
    }

    let black_height = layout.effective_black_height();
    let white_count = keys.len();
    for i in 0..white_count {
        let (letter, octave, white_rect) = {
            let white = &keys[i];
            let letter = white.id.chars().next().unwrap_or('C');
            (letter, white.octave, white.rect)
        };
        let Some(sharp) = sharp_of(letter) else {
            continue;
        };
        let id = format!("{}{}", sharp, octave);
        let rect = KeyRect {
            x: white_rect.right() - layout.black_width / 2.0,
            y: 0.0,
            width: layout.black_width,
            height: black_height,
        };
        if labels.labels(KeyColor::Black, letter) {
            text.push(Label {
                key_id: id.clone(),
                text: id.clone(),
                x: rect.center_x(),
                y: black_height - BLACK_LABEL_INSET,
                font_size: labels.font_size,
                color: KeyColor::Black.label_fill(),
            });
        }
        keys.push(Key {
            id,
            color: KeyColor::Black,
            rect,
            octave,
        });
    }

    let fills = keys.iter().map(|k| k.color.default_fill()).collect();
    let index = keys
        .iter()
        .enumerate()
        .map(|(i, k)| (k.id.clone(), i))
        .collect();

    log::debug!(
        "Built keyboard: {} keys from C{} over {} octave(s), {}x{}px",
        keys.len(),
        layout.start_octave,
        layout.octave_count,
        layout.width(),
        layout.height()
    );

    Ok(Keyboard {
        layout,
        label_options: labels,
        keys,
        fills,
        index,
        labels: text,
    })
}

impl Keyboard {
    pub fn layout(&self) -> &KeyboardLayout {
        &self.layout
    }

    pub fn label_options(&self) -> &LabelOptions {
        &self.label_options
    }

    pub fn width(&self) -> f32 {
        self.layout.width()
    }

    pub fn height(&self) -> f32 {
        self.layout.height()
    }

    /// All keys in paint order
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn white_keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|k| k.color == KeyColor::White)
    }

    pub fn black_keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|k| k.color == KeyColor::Black)
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn key(&self, id: &str) -> Option<&Key> {
        self.index.get(id).map(|&i| &self.keys[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Current fill of a key
    pub fn fill(&self, id: &str) -> Option<Rgb> {
        self.index.get(id).map(|&i| self.fills[i])
    }

    /// Fill of a key when it is not highlighted
    pub fn default_fill(&self, id: &str) -> Option<Rgb> {
        self.key(id).map(|k| k.color.default_fill())
    }

    /// Set the fill of a key. Returns false if the key is not on this keyboard.
    pub fn set_fill(&mut self, id: &str, color: Rgb) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.fills[i] = color;
                true
            }
            None => false,
        }
    }

    /// Restore a key to its default fill
    pub fn reset_fill(&mut self, id: &str) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.fills[i] = self.keys[i].color.default_fill();
                true
            }
            None => false,
        }
    }

    /// Restore every key to its default fill
    pub fn reset_fills(&mut self) {
        for (fill, key) in self.fills.iter_mut().zip(&self.keys) {
            *fill = key.color.default_fill();
        }
    }

    /// Keys paired with their current fill, in paint order
    pub fn painted_keys(&self) -> impl Iterator<Item = (&Key, Rgb)> {
        self.keys.iter().zip(self.fills.iter().copied())
    }

    /// Render the keyboard as a standalone SVG document.
    pub fn to_svg(&self) -> String {
        let (width, height) = (self.width(), self.height());
        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
        );
        for color in [KeyColor::White, KeyColor::Black] {
            for (key, fill) in self.painted_keys().filter(|(k, _)| k.color == color) {
                let r = &key.rect;
                let _ = writeln!(
                    svg,
                    r#"  <rect id="{}" x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
                    key.id, r.x, r.y, r.width, r.height, fill
                );
            }
            for label in self.labels.iter().filter(|l| {
                self.key(&l.key_id).map(|k| k.color) == Some(color)
            }) {
                let _ = writeln!(
                    svg,
                    r#"  <text id="label-{}" x="{}" y="{}" fill="{}" font-size="{}" text-anchor="middle" alignment-baseline="middle">{}</text>"#,
                    label.key_id, label.x, label.y, label.color, label.font_size, label.text
                );
            }
        }
        svg.push_str("</svg>\n");
        svg
    }
}
