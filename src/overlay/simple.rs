use anyhow::Result;
use image::RgbaImage;
use serde::Serialize;
use tracing::debug;

use super::{Rendered, canvas_for, draw_line, smaller_side};
use crate::color::Rgba;
use crate::fonts::{FontResolver, line_height_px, measure_text_width_px};
use crate::render::{Rect, TextPaint, render_onto};

const EDGE_GAP: i64 = 10;
const FRAME_MARGIN: f32 = 5.0;
const FRAME_WIDTH: f32 = 3.0;

#[derive(Debug, Clone)]
pub struct SimpleOptions {
    pub text: String,
    pub font_size: Option<u32>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub debug_frame: bool,
}

impl Default for SimpleOptions {
    fn default() -> Self {
        Self {
            text: "HELLO WORLD".to_string(),
            font_size: None,
            x: None,
            y: None,
            debug_frame: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimpleDebug {
    pub image_size: String,
    pub text_position: String,
    pub text_size: String,
    pub font_size: u32,
    pub text: String,
    pub text_length: usize,
}

/// Single line of white text centred on a point and kept inside the image.
pub fn simple_overlay(
    image: RgbaImage,
    options: &SimpleOptions,
    fonts: &FontResolver,
) -> Result<Rendered<SimpleDebug>> {
    let (width, height) = image.dimensions();
    let font_size = options
        .font_size
        .filter(|size| *size > 0)
        .unwrap_or_else(|| (smaller_side(width, height) / 8).max(1));
    let choice = fonts.resolve_for_text(fonts.default_font(), &options.text);
    let font = choice.metrics();
    let text = choice.text.as_str();
    let size = font_size as f32;
    let text_width = measure_text_width_px(text, size, font).round() as i64;
    let text_height = line_height_px(size, font).round() as i64;

    let anchor_x = anchor(options.x, (width / 2) as f32);
    let anchor_y = anchor(options.y, (height / 4) as f32);
    let left = clamp_start(
        anchor_x.saturating_sub(text_width / 2),
        width as i64 - text_width,
    );
    let top = clamp_start(
        anchor_y.saturating_sub(text_height / 2),
        height as i64 - text_height,
    );
    debug!(left, top, text_width, text_height, font_size, "simple overlay position");

    let mut canvas = canvas_for(width, height, &choice);
    let paint = TextPaint {
        size,
        fill: Rgba::WHITE,
        outline: None,
        shadow: None,
    };
    draw_line(
        &mut canvas,
        font,
        left as f32,
        top as f32,
        (text_width as f32, text_height as f32),
        text,
        &paint,
    );
    if options.debug_frame {
        let frame = Rect::from_edges(
            left as f32 - FRAME_MARGIN,
            top as f32 - FRAME_MARGIN,
            (left + text_width) as f32 + FRAME_MARGIN,
            (top + text_height) as f32 + FRAME_MARGIN,
        );
        canvas.stroke_rect(frame, Rgba::rgb(255, 0, 0), FRAME_WIDTH);
    }

    let png = render_onto(image, &canvas.finish(), font, Rgba::WHITE)?;
    Ok(Rendered {
        png,
        meta: SimpleDebug {
            image_size: format!("{}x{}", width, height),
            text_position: format!("({}, {})", left, top),
            text_size: format!("{}x{}", text_width, text_height),
            font_size,
            text: text.to_string(),
            text_length: text.chars().count(),
        },
    })
}

/// Non-finite coordinates fall back to the default anchor.
fn anchor(requested: Option<f32>, default: f32) -> i64 {
    requested
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .floor() as i64
}

/// Keeps a start coordinate at least `EDGE_GAP` from both edges; the
/// leading edge wins when the box is too large to fit.
fn clamp_start(start: i64, room: i64) -> i64 {
    start.min(room.saturating_sub(EDGE_GAP)).max(EDGE_GAP)
}
