use crate::fonts::{FontMetrics, line_height_px, measure_text_width_px};

pub const MIN_FONT_SIZE: u32 = 12;
const FONT_SIZE_STEP: u32 = 2;

/// Greedy word wrap by measured width. Explicit newlines start a new
/// paragraph; a word wider than `max_width` gets a line of its own.
pub fn wrap_words(
    text: &str,
    max_width: f32,
    font_size: f32,
    font: Option<&FontMetrics>,
) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in words {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if measure_text_width_px(&candidate, font_size, font) <= max_width {
                current = candidate;
            } else if current.is_empty() {
                lines.push(word.to_string());
            } else {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

/// Steps the font size down from `base` until the longest line fits
/// `max_width`, never going below [`MIN_FONT_SIZE`].
pub fn optimal_font_size(
    text: &str,
    max_width: f32,
    base: u32,
    font: Option<&FontMetrics>,
) -> u32 {
    let longest = text.split('\n').fold("", |longest, line| {
        if line.chars().count() > longest.chars().count() {
            line
        } else {
            longest
        }
    });
    let mut font_size = base;
    while font_size > MIN_FONT_SIZE {
        if measure_text_width_px(longest, font_size as f32, font) <= max_width {
            break;
        }
        font_size -= FONT_SIZE_STEP;
    }
    font_size.max(MIN_FONT_SIZE)
}

/// Measured lines of a text block drawn with one font size.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub widths: Vec<f32>,
    pub font_size: f32,
    pub line_height: f32,
    pub spacing: f32,
}

impl TextBlock {
    pub fn measure(
        lines: Vec<String>,
        font_size: f32,
        font: Option<&FontMetrics>,
        spacing: impl FnOnce(f32) -> f32,
    ) -> Self {
        let widths = lines
            .iter()
            .map(|line| measure_text_width_px(line, font_size, font))
            .collect();
        let line_height = line_height_px(font_size, font);
        Self {
            lines,
            widths,
            font_size,
            line_height,
            spacing: spacing(line_height),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn width(&self) -> f32 {
        self.widths.iter().copied().fold(0.0, f32::max)
    }

    pub fn height(&self) -> f32 {
        if self.lines.is_empty() {
            return 0.0;
        }
        let count = self.lines.len() as f32;
        count * self.line_height + (count - 1.0) * self.spacing
    }
}
