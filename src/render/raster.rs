use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use crate::color::Rgba;
use crate::fonts::FontMetrics;

/// Renders an overlay SVG into a straight-alpha RGBA buffer. Only the given
/// face is loaded, so text renders exactly with the font it was measured
/// with.
pub fn rasterize(svg: &str, font: Option<&FontMetrics>) -> Result<RgbaImage> {
    let mut db = fontdb::Database::new();
    let mut options = Options::default();
    if let Some(font) = font {
        db.load_font_data(font.data().to_vec());
        if let Some(family) = font.family() {
            options.font_family = family.to_string();
        }
    }
    options.fontdb = Arc::new(db);
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse overlay SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow!("empty overlay size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);

    let mut image = RgbaImage::new(size.width(), size.height());
    for (src, dst) in pixmap.pixels().iter().zip(image.pixels_mut()) {
        let color = src.demultiply();
        *dst = image::Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    Ok(image)
}

pub fn composite(base: &mut RgbaImage, layer: &RgbaImage) {
    image::imageops::overlay(base, layer, 0, 0);
}

/// Blends the image over a solid background and drops the alpha channel.
pub fn flatten(image: &RgbaImage, background: Rgba) -> RgbImage {
    let bg = [background.r, background.g, background.b];
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y);
        let alpha = pixel[3] as u32;
        let mut out = [0u8; 3];
        for (idx, channel) in out.iter_mut().enumerate() {
            let value = pixel[idx] as u32 * alpha + bg[idx] as u32 * (255 - alpha);
            *channel = ((value + 127) / 255) as u8;
        }
        image::Rgb(out)
    })
}

pub fn encode_png(image: DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .with_context(|| "failed to encode PNG")?;
    Ok(bytes)
}

/// Renders `svg` onto `base` and returns the flattened PNG.
pub fn render_onto(
    mut base: RgbaImage,
    svg: &str,
    font: Option<&FontMetrics>,
    background: Rgba,
) -> Result<Vec<u8>> {
    let layer = rasterize(svg, font)?;
    if layer.dimensions() != base.dimensions() {
        return Err(anyhow!(
            "overlay size {:?} does not match image size {:?}",
            layer.dimensions(),
            base.dimensions()
        ));
    }
    composite(&mut base, &layer);
    encode_png(DynamicImage::ImageRgb8(flatten(&base, background)))
}
