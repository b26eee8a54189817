//! Terminal view of the stage
//!
//! Draws the keyboard with each key in its current fill, so lit keys show
//! up in the highlight colour exactly as they would in an exported frame.

use keyglow_core::{KeyColor, Rgb, Stage};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Widest a white key is drawn, in columns
const MAX_KEY_WIDTH: usize = 6;
/// Narrowest a white key is drawn, in columns
const MIN_KEY_WIDTH: usize = 3;

/// What the player shows around the keyboard
pub struct PlayerStatus<'a> {
    pub title: &'a str,
    pub engine: &'a str,
    pub playing: bool,
    pub position: f64,
    pub duration: f64,
    pub message: Option<&'a str>,
}

pub fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

/// Render the player: a bordered box with the keyboard, the lit keys and
/// the transport position.
pub fn render_player(frame: &mut Frame, area: Rect, stage: &Stage, status: &PlayerStatus) {
    if area.height < 6 || area.width < 30 {
        return;
    }

    let state = if status.playing { "playing" } else { "stopped" };
    let block = Block::default()
        .title(format!(" {} [{}] -> {} ", status.title, state, status.engine))
        .title_bottom(" Space play/stop | Esc quit ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let key_rows = inner.height.saturating_sub(2) as usize;
    let mut lines = keyboard_lines(stage, inner.width as usize, key_rows);

    lines.push(Line::from(vec![
        Span::styled("Playing: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            stage.active_display(),
            Style::default()
                .fg(to_color(stage.highlight()))
                .add_modifier(Modifier::BOLD),
        ),
    ]));

    let mut info = vec![Span::styled(
        format!("{:6.2}s / {:.2}s", status.position.min(status.duration), status.duration),
        Style::default().fg(Color::Gray),
    )];
    if let Some(message) = status.message {
        info.push(Span::raw("  "));
        info.push(Span::styled(message.to_string(), Style::default().fg(Color::Yellow)));
    }
    lines.push(Line::from(info));

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Lay the keyboard out as `rows` terminal lines fitting in `width` columns.
///
/// Black keys take the upper two fifths of the rows, rounded up. The last
/// row carries the white key names.
pub fn keyboard_lines(stage: &Stage, width: usize, rows: usize) -> Vec<Line<'static>> {
    let keyboard = stage.keyboard();
    let white_count = keyboard.white_keys().count();
    if white_count == 0 || rows == 0 {
        return Vec::new();
    }
    let key_width = (width / white_count).clamp(MIN_KEY_WIDTH, MAX_KEY_WIDTH);
    let total_width = white_count * key_width;
    let padding = " ".repeat(width.saturating_sub(total_width) / 2);

    let white: Vec<(String, Style)> = keyboard
        .painted_keys()
        .filter(|(key, _)| key.color == KeyColor::White)
        .map(|(key, fill)| (key.id.clone(), Style::default().fg(Color::Black).bg(to_color(fill))))
        .collect();
    let separator = Style::default()
        .fg(Color::Black)
        .bg(to_color(KeyColor::White.default_fill()));

    // black keys sit on the boundary after the white key with the same letter
    let black: Vec<(usize, Style)> = keyboard
        .painted_keys()
        .filter(|(key, _)| key.color == KeyColor::Black)
        .filter_map(|(key, fill)| {
            let left = key.id.replace('#', "");
            let index = white.iter().position(|(id, _)| *id == left)?;
            Some(((index + 1) * key_width, Style::default().bg(to_color(fill))))
        })
        .collect();

    let white_row = |with_black: bool| -> Vec<(char, Style)> {
        let mut chars = vec![(' ', Style::default()); total_width];
        for (index, (_, style)) in white.iter().enumerate() {
            for cell in &mut chars[index * key_width..(index + 1) * key_width] {
                *cell = (' ', *style);
            }
            if index > 0 {
                chars[index * key_width] = ('|', separator);
            }
        }
        if with_black {
            for (boundary, style) in &black {
                let start = boundary.saturating_sub(1);
                let end = (start + 3).min(total_width);
                for cell in &mut chars[start..end] {
                    *cell = (' ', *style);
                }
            }
        }
        chars
    };

    let black_rows = (rows * 2).div_ceil(5).min(rows.saturating_sub(1)).max(1);
    let mut lines = Vec::with_capacity(rows);
    for row in 0..rows {
        let mut chars = white_row(row < black_rows);
        if row + 1 == rows {
            for (index, (id, style)) in white.iter().enumerate() {
                if key_width < 4 && !id.starts_with('C') {
                    continue;
                }
                let start = index * key_width + 1;
                for (offset, ch) in id.chars().take(key_width - 1).enumerate() {
                    if let Some(cell) = chars.get_mut(start + offset) {
                        *cell = (ch, *style);
                    }
                }
            }
        }
        let mut spans = vec![Span::raw(padding.clone())];
        spans.extend(build_spans_from_chars(&chars));
        lines.push(Line::from(spans));
    }
    lines
}

/// Convert a character buffer with styles into spans (grouping consecutive chars with same style)
fn build_spans_from_chars(chars: &[(char, Style)]) -> Vec<Span<'static>> {
    let Some(first) = chars.first() else {
        return vec![];
    };

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current_style = first.1;
    let mut buffer = String::new();

    for (ch, style) in chars {
        if *style != current_style && !buffer.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut buffer), current_style));
        }
        current_style = *style;
        buffer.push(*ch);
    }

    if !buffer.is_empty() {
        spans.push(Span::styled(buffer, current_style));
    }

    spans
}
