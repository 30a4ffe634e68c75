use anyhow::Result;
use image::RgbaImage;
use serde::Serialize;
use tracing::{debug, warn};

use super::{Rendered, canvas_for, draw_line};
use crate::color::Rgba;
use crate::fonts::FontResolver;
use crate::layout::{TextBlock, optimal_font_size, wrap_words};
use crate::preset::{PercentPoint, detect_preset};
use crate::render::{Outline, Rect, Shadow, TextPaint, render_onto};

const MAX_CORNER_RADIUS: u32 = 15;
const LINE_SPACING_RATIO: f32 = 0.2;

#[derive(Debug, Clone)]
pub struct OverlayOptions {
    pub text: String,
    pub font_name: String,
    /// Explicit size; otherwise the largest size fitting the preset width.
    pub font_size: Option<u32>,
    pub font_color: Rgba,
    pub bg_color: Rgba,
    pub transparent_bg: bool,
    pub pos_x: Option<f32>,
    pub pos_y: Option<f32>,
    pub outline_width: u32,
    pub outline_color: Rgba,
    pub shadow: Option<Shadow>,
    /// Word-wrap at the preset's max text width instead of only breaking
    /// on explicit newlines.
    pub wrap: bool,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_name: "arial".to_string(),
            font_size: None,
            font_color: Rgba::WHITE,
            bg_color: Rgba::rgba(0, 0, 0, 180),
            transparent_bg: false,
            pos_x: None,
            pos_y: None,
            outline_width: 3,
            outline_color: Rgba::BLACK,
            shadow: None,
            wrap: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayMetadata {
    pub detected_size: String,
    pub preset_used: String,
    pub calculated_font_size: u32,
    pub position: PercentPoint,
    pub text_lines: usize,
    pub font_used: String,
    pub transliterated: bool,
}

/// Draws the text block anchored at a percentage position, sized for the
/// preset matching the image dimensions.
pub fn preset_overlay(
    image: RgbaImage,
    options: &OverlayOptions,
    fonts: &FontResolver,
) -> Result<Rendered<OverlayMetadata>> {
    let (width, height) = image.dimensions();
    let preset = detect_preset(width, height);
    let choice = fonts.resolve_for_text(&options.font_name, &options.text);
    let font = choice.metrics();
    let text = choice.text.as_str();
    let max_text_width = preset.max_text_width as f32;
    let explicit_size = options.font_size.filter(|size| *size > 0);

    let lines: Vec<String> = if options.wrap {
        let wrap_size = explicit_size.unwrap_or(preset.default_font_size) as f32;
        wrap_words(text, max_text_width, wrap_size, font)
    } else {
        text.split('\n').map(|line| line.to_string()).collect()
    };
    let font_size = explicit_size.unwrap_or_else(|| {
        optimal_font_size(
            &lines.join("\n"),
            max_text_width,
            preset.default_font_size,
            font,
        )
    });
    let size = font_size as f32;
    let spacing = (size * LINE_SPACING_RATIO).floor();
    let block = TextBlock::measure(lines, size, font, |_| spacing);
    let block_width = block.width();
    let block_height = block.height();

    let position = PercentPoint {
        x: options
            .pos_x
            .filter(|x| x.is_finite())
            .unwrap_or(preset.default_position.x),
        y: options
            .pos_y
            .filter(|y| y.is_finite())
            .unwrap_or(preset.default_position.y),
    };
    let anchor_x = (width as f32 * position.x / 100.0).floor();
    let anchor_y = (height as f32 * position.y / 100.0).floor();
    let half_width = (block_width / 2.0).floor();
    let half_height = (block_height / 2.0).floor();

    debug!(
        width,
        height,
        preset = preset.name.as_str(),
        font_size,
        lines = block.len(),
        block_width,
        block_height,
        anchor_x,
        anchor_y,
        "overlay layout"
    );

    let mut canvas = canvas_for(width, height, &choice);
    if !options.transparent_bg && !text.trim().is_empty() {
        let padding = preset.padding as f32;
        let vertical_padding = (preset.padding / 2) as f32;
        let background = Rect::from_edges(
            (anchor_x - half_width - padding).max(0.0),
            (anchor_y - half_height - vertical_padding).max(0.0),
            (anchor_x + half_width + padding).min(width as f32),
            (anchor_y + half_height + vertical_padding).min(height as f32),
        );
        let radius = preset.padding.min(MAX_CORNER_RADIUS) as f32;
        canvas.rounded_rect(background, radius, options.bg_color);
    }

    let paint = TextPaint {
        size,
        fill: options.font_color.opaque(),
        outline: (options.outline_width > 0).then(|| Outline {
            width: options.outline_width as f32,
            color: options.outline_color.opaque(),
        }),
        shadow: options.shadow,
    };
    let mut current_y = anchor_y - half_height;
    for (line, line_width) in block.lines.iter().zip(&block.widths) {
        if line.trim().is_empty() {
            current_y += block.line_height;
            continue;
        }
        let line_x = anchor_x - (line_width / 2.0).floor();
        if line_x < 0.0 || current_y < 0.0 || line_x > width as f32 || current_y > height as f32 {
            warn!(line_x, line_y = current_y, "text line starts outside the image");
        }
        draw_line(
            &mut canvas,
            font,
            line_x,
            current_y,
            (*line_width, block.line_height),
            line,
            &paint,
        );
        current_y += block.line_height + spacing;
    }

    let png = render_onto(image, &canvas.finish(), font, Rgba::WHITE)?;
    Ok(Rendered {
        png,
        meta: OverlayMetadata {
            detected_size: format!("{}x{}", width, height),
            preset_used: preset.name,
            calculated_font_size: font_size,
            position,
            text_lines: block.len(),
            font_used: choice.label(),
            transliterated: choice.transliterated,
        },
    })
}
