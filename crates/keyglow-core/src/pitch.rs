//! Pitch naming helpers.
//!
//! Key identifiers are scientific pitch names with sharp spelling
//! (`C4`, `C#4`, `A#-1`), where MIDI note 60 is `C4`.

/// Sharp spellings of the twelve pitch classes, starting at C.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// White-key letters in keyboard order.
pub const WHITE_LETTERS: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];

/// Sharp that sits to the right of a white key, if any.
pub fn sharp_of(letter: char) -> Option<&'static str> {
    match letter {
        'C' => Some("C#"),
        'D' => Some("D#"),
        'F' => Some("F#"),
        'G' => Some("G#"),
        'A' => Some("A#"),
        _ => None,
    }
}

/// Convert a MIDI note number to a note name
pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i32 - 1;
    format!("{}{}", PITCH_CLASSES[(note % 12) as usize], octave)
}

/// Parse a note name (`C4`, `Db3`, `F#-1`) into a MIDI note number.
///
/// Returns `None` for malformed names and for pitches outside 0..=127.
pub fn parse_note(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let base: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (accidental, octave) = if let Some(octave) = rest.strip_prefix('#') {
        (1, octave)
    } else if let Some(octave) = rest.strip_prefix('b') {
        (-1, octave)
    } else {
        (0, rest)
    };
    let octave: i32 = octave.parse().ok()?;
    let midi = (octave + 1) * 12 + base + accidental;
    u8::try_from(midi).ok().filter(|n| *n <= 127)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(48), "C3");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(69), "A4");
        assert_eq!(note_name(0), "C-1");
    }

    #[test]
    fn test_parse_note() {
        assert_eq!(parse_note("C4"), Some(60));
        assert_eq!(parse_note("C#4"), Some(61));
        assert_eq!(parse_note("Db4"), Some(61));
        assert_eq!(parse_note("C-1"), Some(0));
        assert_eq!(parse_note("G9"), Some(127));
        assert_eq!(parse_note("G#9"), None);
        assert_eq!(parse_note("H4"), None);
        assert_eq!(parse_note("C"), None);
    }
}
