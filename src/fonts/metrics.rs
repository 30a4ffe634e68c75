use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::Face;
use ttf_parser::name_id;

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    line_gap: i16,
    space_advance: u16,
    family: Option<String>,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn scale(&self, font_size: f32) -> f32 {
        font_size / self.units_per_em.max(1) as f32
    }

    /// True when every non-whitespace character has a glyph in this face.
    pub fn covers(&self, text: &str) -> bool {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return false;
        };
        text.chars()
            .filter(|ch| !ch.is_whitespace())
            .all(|ch| face.glyph_index(ch).is_some())
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

/// Parses the first face of `data`, or the face whose family matches
/// `preferred_family` when the data is a collection.
pub fn load_font_metrics_from_data(
    data: Vec<u8>,
    preferred_family: Option<&str>,
) -> Result<FontMetrics> {
    let data = Arc::new(data);
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(&data, index) {
            let family = extract_family_name(&face);
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            let metrics = FontMetrics {
                data: Arc::clone(&data),
                face_index: index,
                units_per_em,
                ascender: face.ascender(),
                descender: face.descender(),
                line_gap: face.line_gap(),
                space_advance,
                family: family.clone(),
            };
            if let (Some(preferred), Some(found)) = (preferred_family, &family) {
                if found.eq_ignore_ascii_case(preferred) {
                    return Ok(metrics);
                }
            }
            if fallback.is_none() {
                fallback = Some(metrics);
            }
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

pub fn measure_text_width_px(text: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    if let Some(font) = font {
        if let Ok(face) = Face::parse(&font.data, font.face_index) {
            let mut advance = 0u32;
            for ch in text.chars() {
                if ch == '\n' {
                    continue;
                }
                if ch == ' ' {
                    advance = advance.saturating_add(font.space_advance as u32);
                    continue;
                }
                if let Some(glyph) = face.glyph_index(ch) {
                    let glyph_advance = face.glyph_hor_advance(glyph).unwrap_or(font.space_advance);
                    advance = advance.saturating_add(glyph_advance as u32);
                } else {
                    advance = advance.saturating_add(font.space_advance as u32);
                }
            }
            return advance as f32 * font.scale(font_size);
        }
    }
    estimate_text_width_units(text) * font_size
}

/// Distance between consecutive baselines without extra spacing.
pub fn line_height_px(font_size: f32, font: Option<&FontMetrics>) -> f32 {
    match font {
        Some(font) => {
            let units = font.ascender as f32 - font.descender as f32 + font.line_gap.max(0) as f32;
            if units > 0.0 {
                units * font.scale(font_size)
            } else {
                font_size
            }
        }
        None => font_size,
    }
}

/// Distance from the top of a line box to its baseline.
pub fn ascent_px(font_size: f32, font: Option<&FontMetrics>) -> f32 {
    match font {
        Some(font) if font.ascender > 0 => font.ascender as f32 * font.scale(font_size),
        _ => font_size * 0.8,
    }
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xAC00..=0xD7AF
    ) {
        1.0
    } else {
        0.6
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars()
        .filter(|ch| *ch != '\n')
        .map(estimate_char_units_for_width)
        .sum()
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{CYRILLIC_FAMILY, LATIN_FAMILY, cyrillic_font, latin_font};

    #[test]
    fn estimated_width_scales_with_font_size() {
        let narrow = measure_text_width_px("abc", 10.0, None);
        let wide = measure_text_width_px("abc", 20.0, None);
        assert!((narrow - 16.5).abs() < 1e-4);
        assert!((wide - narrow * 2.0).abs() < 1e-4);
    }

    #[test]
    fn estimated_width_weights_scripts() {
        let latin = measure_text_width_px("a", 10.0, None);
        let cyrillic = measure_text_width_px("ж", 10.0, None);
        let cjk = measure_text_width_px("漢", 10.0, None);
        assert!(latin < cyrillic && cyrillic < cjk);
        assert!((measure_text_width_px("a\nb", 10.0, None) - 11.0).abs() < 1e-4);
    }

    #[test]
    fn fallback_vertical_metrics_follow_font_size() {
        assert_eq!(line_height_px(40.0, None), 40.0);
        assert_eq!(ascent_px(40.0, None), 32.0);
    }

    #[test]
    fn parsed_face_reports_family_and_coverage() {
        let latin = load_font_metrics_from_data(latin_font(), None).expect("latin");
        assert_eq!(latin.family(), Some(LATIN_FAMILY));
        assert!(latin.covers("Hello, world!"));
        assert!(latin.covers("  \n"));
        assert!(!latin.covers("Привет"));

        let cyrillic = load_font_metrics_from_data(cyrillic_font(), None).expect("cyrillic");
        assert_eq!(cyrillic.family(), Some(CYRILLIC_FAMILY));
        assert!(cyrillic.covers("Привет мир"));
        assert!(!cyrillic.covers("漢字"));
    }

    #[test]
    fn glyph_advances_drive_measurement() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("latin.ttf");
        std::fs::write(&path, latin_font()).expect("write font");
        let font = load_font_metrics(&path).expect("font");

        assert!((measure_text_width_px("Hi", 20.0, Some(&font)) - 20.0).abs() < 1e-4);
        assert!((measure_text_width_px("a b", 20.0, Some(&font)) - 25.0).abs() < 1e-4);
        // Missing glyphs advance like a space.
        assert!((measure_text_width_px("漢", 20.0, Some(&font)) - 5.0).abs() < 1e-4);
        assert!((line_height_px(20.0, Some(&font)) - 20.0).abs() < 1e-4);
        assert!((ascent_px(20.0, Some(&font)) - 16.0).abs() < 1e-4);

        let cyrillic = load_font_metrics_from_data(cyrillic_font(), None).expect("cyrillic");
        assert!((measure_text_width_px("Пр", 10.0, Some(&cyrillic)) - 12.0).abs() < 1e-4);
    }

    #[test]
    fn garbage_bytes_are_not_a_font() {
        let err = load_font_metrics_from_data(vec![0u8; 64], None).unwrap_err();
        assert!(err.to_string().contains("failed to parse font data"));
    }
}
