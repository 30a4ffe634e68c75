//! Text overlay operations: each takes decoded pixels plus options and
//! returns a PNG together with a small report of the layout decisions.

mod auto;
mod canvas;
mod simple;
mod smart;

pub use auto::{OverlayMetadata, OverlayOptions, preset_overlay};
pub use canvas::{
    CreateTextImageOptions, MAX_CANVAS_SIDE, TEST_IMAGE_SIZE, TextImageDebug, create_text_image,
    generate_test_image, simple_text_test,
};
pub use simple::{SimpleDebug, SimpleOptions, simple_overlay};
pub use smart::{BlockAnchor, SmartDebug, SmartOptions, smart_overlay};

use crate::fonts::{FontChoice, FontMetrics, ascent_px};
use crate::render::{Rect, SvgCanvas, TextPaint};

/// Encoded result of an overlay operation.
#[derive(Debug)]
pub struct Rendered<M> {
    pub png: Vec<u8>,
    pub meta: M,
}

fn canvas_for(width: u32, height: u32, choice: &FontChoice) -> SvgCanvas {
    SvgCanvas::new(width, height).with_font_family(choice.metrics().and_then(FontMetrics::family))
}

/// Draws one line with its top-left corner at (`left`, `top`). Without a
/// font the line is stood in for by a box of its estimated size.
fn draw_line(
    canvas: &mut SvgCanvas,
    font: Option<&FontMetrics>,
    left: f32,
    top: f32,
    size: (f32, f32),
    text: &str,
    paint: &TextPaint,
) {
    if text.trim().is_empty() {
        return;
    }
    match font {
        Some(font) => {
            let baseline = top + ascent_px(paint.size, Some(font));
            canvas.text(left, baseline, text, paint);
        }
        None => {
            let (width, height) = size;
            canvas.rect(
                Rect {
                    x: left,
                    y: top,
                    w: width,
                    h: height,
                },
                paint.fill,
            );
        }
    }
}

fn smaller_side(width: u32, height: u32) -> u32 {
    width.min(height)
}
