use anyhow::Result;
use image::RgbaImage;
use serde::Serialize;
use tracing::debug;

use super::{Rendered, canvas_for, draw_line, smaller_side};
use crate::color::Rgba;
use crate::fonts::FontResolver;
use crate::layout::{TextBlock, wrap_words};
use crate::render::{Outline, Rect, TextPaint, render_onto};

const LINE_SPACING_RATIO: f32 = 0.3;

/// Vertical placement of the text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockAnchor {
    Top,
    #[default]
    Center,
    Bottom,
}

impl BlockAnchor {
    /// Unknown values fall back to `Center`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" => Self::Top,
            "bottom" => Self::Bottom,
            _ => Self::Center,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Center => "center",
            Self::Bottom => "bottom",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmartOptions {
    pub text: String,
    pub font_size: Option<u32>,
    pub position: BlockAnchor,
    /// Position as the caller spelled it; echoed back in the debug output.
    pub requested_position: Option<String>,
    pub margin: Option<u32>,
    pub text_color: Rgba,
    pub outline_color: Rgba,
    pub background: Rgba,
    pub use_background: bool,
    pub font_name: Option<String>,
}

impl Default for SmartOptions {
    fn default() -> Self {
        Self {
            text: "Пример текста".to_string(),
            font_size: None,
            position: BlockAnchor::Center,
            requested_position: None,
            margin: None,
            text_color: Rgba::WHITE,
            outline_color: Rgba::BLACK,
            background: Rgba::rgba(0, 0, 0, 128),
            use_background: true,
            font_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SmartDebug {
    pub image_size: String,
    pub lines_count: usize,
    pub lines: Vec<String>,
    pub position: String,
    pub text_block_size: String,
    pub font_size: u32,
    pub font_used: String,
    pub transliterated: bool,
}

/// Word-wrapped text block placed at the top, centre or bottom of the image.
pub fn smart_overlay(
    image: RgbaImage,
    options: &SmartOptions,
    fonts: &FontResolver,
) -> Result<Rendered<SmartDebug>> {
    let (width, height) = image.dimensions();
    let side = smaller_side(width, height);
    let font_size = options
        .font_size
        .filter(|size| *size > 0)
        .unwrap_or_else(|| (side / 15).max(1));
    let margin = options.margin.unwrap_or(side / 20) as f32;
    let font_name = options
        .font_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| fonts.default_font());
    let choice = fonts.resolve_for_text(font_name, &options.text);
    let font = choice.metrics();
    let size = font_size as f32;

    let max_width = (width as f32 - margin * 2.0).max(1.0);
    let lines = wrap_words(&choice.text, max_width, size, font);
    let block = TextBlock::measure(lines, size, font, |line_height| {
        line_height * LINE_SPACING_RATIO
    });
    let block_width = block.width();
    let block_height = block.height();
    let half_height = (block_height / 2.0).floor();

    let block_x = (width / 2) as f32;
    let block_y = match options.position {
        BlockAnchor::Top => margin + half_height,
        BlockAnchor::Center => (height / 2) as f32,
        BlockAnchor::Bottom => height as f32 - margin - half_height,
    };
    debug!(
        lines = block.len(),
        block_width,
        block_height,
        block_y,
        position = options.position.as_str(),
        "smart overlay layout"
    );

    let mut canvas = canvas_for(width, height, &choice);
    if options.use_background && !block.is_empty() {
        let padding = (margin / 2.0).floor();
        let half_width = (block_width / 2.0).floor();
        let background = Rect::from_edges(
            block_x - half_width - padding,
            block_y - half_height - padding,
            block_x + half_width + padding,
            block_y + half_height + padding,
        );
        canvas.rounded_rect(background, (padding / 3.0).floor(), options.background);
    }

    let paint = TextPaint {
        size,
        fill: options.text_color.opaque(),
        outline: Some(Outline {
            width: (font_size / 20).max(1) as f32,
            color: options.outline_color.opaque(),
        }),
        shadow: None,
    };
    let mut current_y = block_y - half_height;
    for (line, line_width) in block.lines.iter().zip(&block.widths) {
        if line.trim().is_empty() {
            current_y += block.line_height;
            continue;
        }
        let line_x = (block_x - (line_width / 2.0).floor())
            .min(width as f32 - line_width - margin)
            .max(margin);
        current_y = current_y.min(height as f32 - size).max(0.0);
        draw_line(
            &mut canvas,
            font,
            line_x,
            current_y.floor(),
            (*line_width, block.line_height),
            line,
            &paint,
        );
        current_y += block.line_height + block.spacing;
    }

    let png = render_onto(image, &canvas.finish(), font, Rgba::WHITE)?;
    Ok(Rendered {
        png,
        meta: SmartDebug {
            image_size: format!("{}x{}", width, height),
            lines_count: block.len(),
            lines: block.lines.clone(),
            position: options
                .requested_position
                .clone()
                .unwrap_or_else(|| options.position.as_str().to_string()),
            text_block_size: format!(
                "{}x{}",
                block_width.round() as i64,
                block_height.round() as i64
            ),
            font_size,
            font_used: choice.label(),
            transliterated: choice.transliterated,
        },
    })
}
