use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbaImage;

const DATA_URL_PREFIX: &str = "data:image";

#[derive(Debug, Clone, Copy)]
pub struct ImageLimits {
    pub min_bytes: usize,
    pub min_dimension: u32,
}

impl ImageLimits {
    pub const NONE: ImageLimits = ImageLimits {
        min_bytes: 0,
        min_dimension: 1,
    };
}

/// Decodes a base64 payload, with or without a `data:image/...;base64,`
/// prefix.
pub fn decode_base64_image(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let encoded = if trimmed.starts_with(DATA_URL_PREFIX) {
        trimmed
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| anyhow!("data URL has no payload"))?
    } else {
        trimmed
    };
    let compact: String = encoded
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    BASE64
        .decode(compact.as_bytes())
        .with_context(|| "image is not valid base64")
}

pub fn load_image(bytes: &[u8], limits: ImageLimits) -> Result<RgbaImage> {
    if bytes.len() < limits.min_bytes {
        return Err(anyhow!(
            "image is too small: {} bytes (minimum {} bytes)",
            bytes.len(),
            limits.min_bytes
        ));
    }
    let decoded = image::load_from_memory(bytes).map_err(|err| {
        let detected = infer::get(bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("unknown");
        anyhow!(
            "cannot open image ({}; detected type: {}); check the base64 data",
            err,
            detected
        )
    })?;
    let (width, height) = (decoded.width(), decoded.height());
    if width < limits.min_dimension || height < limits.min_dimension {
        return Err(anyhow!(
            "image is too small: {}x{} (minimum {}x{} pixels)",
            width,
            height,
            limits.min_dimension,
            limits.min_dimension
        ));
    }
    Ok(decoded.to_rgba8())
}
