//! Operations that paint on a freshly created canvas instead of an upload.

use anyhow::{Result, bail};
use image::RgbaImage;
use serde::Serialize;

use super::{Rendered, canvas_for, draw_line};
use crate::color::Rgba;
use crate::fonts::{FontResolver, line_height_px, measure_text_width_px};
use crate::render::{Outline, Rect, Shadow, TextPaint, render_onto};

pub const MAX_CANVAS_SIDE: u32 = 8192;
pub const TEST_IMAGE_SIZE: u32 = 1024;

const TEST_IMAGE_BACKGROUND: Rgba = Rgba::rgb(0x4a, 0x90, 0xe2);
const GRID_STEP: usize = 128;
const SAMPLE_CANVAS: (u32, u32) = (400, 300);
const SAMPLE_TEXT_SIZE: f32 = 16.0;

#[derive(Debug, Clone)]
pub struct CreateTextImageOptions {
    pub width: u32,
    pub height: u32,
    pub text: String,
    pub font_size: u32,
    pub bg_color: Rgba,
    pub text_color: Rgba,
}

impl Default for CreateTextImageOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            text: "HELLO WORLD".to_string(),
            font_size: 48,
            bg_color: Rgba::rgb(70, 130, 180),
            text_color: Rgba::WHITE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextImageDebug {
    pub image_size: String,
    pub text: String,
    pub font_size: u32,
    pub font_used: String,
}

/// New canvas with the text centred and outlined in black.
pub fn create_text_image(
    options: &CreateTextImageOptions,
    fonts: &FontResolver,
) -> Result<Rendered<TextImageDebug>> {
    let (width, height) = (options.width, options.height);
    if width == 0 || height == 0 || width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
        bail!(
            "canvas size must be between 1 and {} pixels per side, got {}x{}",
            MAX_CANVAS_SIDE,
            width,
            height
        );
    }
    let base = RgbaImage::from_pixel(width, height, options.bg_color.opaque().into());
    let choice = fonts.resolve_for_text(fonts.default_font(), &options.text);
    let font = choice.metrics();
    let size = options.font_size.max(1) as f32;
    let text_width = measure_text_width_px(&choice.text, size, font);
    let text_height = line_height_px(size, font);
    let left = ((width as f32 - text_width) / 2.0).floor();
    let top = ((height as f32 - text_height) / 2.0).floor();

    let mut canvas = canvas_for(width, height, &choice);
    let paint = TextPaint {
        size,
        fill: options.text_color.opaque(),
        outline: Some(Outline {
            width: 2.0,
            color: Rgba::BLACK,
        }),
        shadow: None,
    };
    draw_line(
        &mut canvas,
        font,
        left,
        top,
        (text_width, text_height),
        &choice.text,
        &paint,
    );
    let png = render_onto(base, &canvas.finish(), font, Rgba::WHITE)?;
    Ok(Rendered {
        png,
        meta: TextImageDebug {
            image_size: format!("{}x{}", width, height),
            text: choice.text.clone(),
            font_size: options.font_size,
            font_used: choice.label(),
        },
    })
}

/// Fixed 1024x1024 reference picture: grid, centre circle and a size label.
pub fn generate_test_image(fonts: &FontResolver) -> Result<Vec<u8>> {
    let side = TEST_IMAGE_SIZE;
    let extent = side as f32;
    let base = RgbaImage::from_pixel(side, side, TEST_IMAGE_BACKGROUND.into());
    let label = format!("{}x{}", side, side);
    let choice = fonts.resolve_for_text(fonts.default_font(), &label);
    let font = choice.metrics();

    let mut canvas = canvas_for(side, side, &choice);
    for offset in (0..side as usize).step_by(GRID_STEP) {
        let offset = offset as f32;
        canvas.line((offset, 0.0), (offset, extent), Rgba::WHITE, 2.0);
        canvas.line((0.0, offset), (extent, offset), Rgba::WHITE, 2.0);
    }
    let center = extent / 2.0;
    canvas.circle(
        (center, center),
        200.0,
        Rgba::WHITE,
        Some(Outline {
            width: 4.0,
            color: Rgba::BLACK,
        }),
    );

    let size = 48.0;
    let label_width = measure_text_width_px(&choice.text, size, font);
    let paint = TextPaint {
        size,
        fill: Rgba::WHITE,
        outline: None,
        shadow: Some(Shadow {
            dx: 2.0,
            dy: 2.0,
            color: Rgba::BLACK,
        }),
    };
    draw_line(
        &mut canvas,
        font,
        center - (label_width / 2.0).floor(),
        center - size / 2.0,
        (label_width, line_height_px(size, font)),
        &choice.text,
        &paint,
    );
    render_onto(base, &canvas.finish(), font, Rgba::WHITE)
}

/// Minimal rendering check: three strings and red, green and blue swatches.
pub fn simple_text_test(text: &str, fonts: &FontResolver) -> Result<Vec<u8>> {
    let (width, height) = SAMPLE_CANVAS;
    let base = RgbaImage::from_pixel(width, height, Rgba::rgb(100, 150, 200).into());
    let choice = fonts.resolve_for_text(fonts.default_font(), text);
    let font = choice.metrics();
    let paint = TextPaint {
        size: SAMPLE_TEXT_SIZE,
        fill: Rgba::WHITE,
        outline: None,
        shadow: None,
    };

    let mut canvas = canvas_for(width, height, &choice);
    for (line, top) in [
        (choice.text.as_str(), 50.0),
        ("STATIC TEXT", 100.0),
        ("123456789", 150.0),
    ] {
        let line_width = measure_text_width_px(line, SAMPLE_TEXT_SIZE, font);
        let line_height = line_height_px(SAMPLE_TEXT_SIZE, font);
        draw_line(&mut canvas, font, 50.0, top, (line_width, line_height), line, &paint);
    }
    for (top, color) in [
        (50.0, Rgba::rgb(255, 0, 0)),
        (120.0, Rgba::rgb(0, 255, 0)),
        (190.0, Rgba::rgb(0, 0, 255)),
    ] {
        canvas.rect(Rect::from_edges(200.0, top, 351.0, top + 51.0), color);
    }
    render_onto(base, &canvas.finish(), font, Rgba::WHITE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontStore;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn decode(png: &[u8]) -> image::RgbImage {
        image::load_from_memory(png).expect("png").to_rgb8()
    }

    fn bare_resolver(dir: &std::path::Path) -> FontResolver {
        FontResolver::isolated(FontStore::new(dir), BTreeMap::new())
    }

    #[test]
    fn create_text_image_centres_text_on_background() {
        let dir = tempdir().expect("tempdir");
        let fonts = bare_resolver(dir.path());
        let rendered =
            create_text_image(&CreateTextImageOptions::default(), &fonts).expect("create");
        assert_eq!(rendered.meta.image_size, "800x600");
        assert_eq!(rendered.meta.font_size, 48);
        let out = decode(&rendered.png);
        assert_eq!(out.dimensions(), (800, 600));
        assert_eq!(out.get_pixel(10, 10).0, [70, 130, 180]);
        assert_eq!(out.get_pixel(400, 300).0, [255, 255, 255]);
    }

    #[test]
    fn create_text_image_rejects_bad_sizes() {
        let dir = tempdir().expect("tempdir");
        let fonts = bare_resolver(dir.path());
        for (width, height) in [(0, 10), (10, MAX_CANVAS_SIDE + 1)] {
            let options = CreateTextImageOptions {
                width,
                height,
                ..CreateTextImageOptions::default()
            };
            let err = create_text_image(&options, &fonts).unwrap_err();
            assert!(err.to_string().contains("canvas size"), "{err}");
        }
    }

    #[test]
    fn test_image_has_grid_circle_and_background() {
        let dir = tempdir().expect("tempdir");
        let fonts = bare_resolver(dir.path());
        let out = decode(&generate_test_image(&fonts).expect("generate"));
        assert_eq!(out.dimensions(), (TEST_IMAGE_SIZE, TEST_IMAGE_SIZE));
        assert_eq!(out.get_pixel(60, 60).0, [0x4a, 0x90, 0xe2]);
        assert_eq!(out.get_pixel(128, 60).0, [255, 255, 255]);
        assert_eq!(out.get_pixel(512, 600).0, [255, 255, 255]);
        assert_eq!(out.get_pixel(900, 900).0, [0x4a, 0x90, 0xe2]);
    }

    #[test]
    fn sample_canvas_has_colour_swatches() {
        let dir = tempdir().expect("tempdir");
        let fonts = bare_resolver(dir.path());
        let out = decode(&simple_text_test("TEST", &fonts).expect("sample"));
        assert_eq!(out.dimensions(), (400, 300));
        assert_eq!(out.get_pixel(275, 75).0, [255, 0, 0]);
        assert_eq!(out.get_pixel(275, 145).0, [0, 255, 0]);
        assert_eq!(out.get_pixel(275, 215).0, [0, 0, 255]);
        assert_eq!(out.get_pixel(380, 280).0, [100, 150, 200]);
        assert_eq!(out.get_pixel(55, 55).0, [255, 255, 255]);
    }
}
