//! Size presets for the social-media formats the overlay is tuned for.

use serde::Serialize;

/// Anchor point of a text block, in percent of the image size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizePreset {
    pub name: String,
    pub default_font_size: u32,
    pub max_text_width: u32,
    pub default_position: PercentPoint,
    pub padding: u32,
}

struct BuiltinPreset {
    width: u32,
    height: u32,
    name: &'static str,
    default_font_size: u32,
    max_text_width: u32,
    position: (f32, f32),
    padding: u32,
}

const BUILTIN_PRESETS: &[BuiltinPreset] = &[
    BuiltinPreset {
        width: 600,
        height: 600,
        name: "square_small",
        default_font_size: 28,
        max_text_width: 540,
        position: (50.0, 85.0),
        padding: 20,
    },
    BuiltinPreset {
        width: 1080,
        height: 1350,
        name: "instagram_portrait",
        default_font_size: 48,
        max_text_width: 972,
        position: (50.0, 88.0),
        padding: 35,
    },
    BuiltinPreset {
        width: 1080,
        height: 607,
        name: "facebook_landscape",
        default_font_size: 42,
        max_text_width: 972,
        position: (50.0, 82.0),
        padding: 30,
    },
];

const APPROXIMATE_TOLERANCE: f32 = 0.05;

impl BuiltinPreset {
    fn to_preset(&self) -> SizePreset {
        SizePreset {
            name: self.name.to_string(),
            default_font_size: self.default_font_size,
            max_text_width: self.max_text_width,
            default_position: PercentPoint {
                x: self.position.0,
                y: self.position.1,
            },
            padding: self.padding,
        }
    }

    fn is_close_to(&self, width: u32, height: u32) -> bool {
        let width_diff = (width as f32 - self.width as f32).abs() / self.width as f32;
        let height_diff = (height as f32 - self.height as f32).abs() / self.height as f32;
        width_diff <= APPROXIMATE_TOLERANCE && height_diff <= APPROXIMATE_TOLERANCE
    }
}

/// `WxH` keys of the built-in presets, in table order.
pub fn supported_sizes() -> Vec<String> {
    BUILTIN_PRESETS
        .iter()
        .map(|preset| format!("{}x{}", preset.width, preset.height))
        .collect()
}

/// Picks the preset for an image: exact match, then a preset within 5% on
/// both axes, then a preset derived from the image itself.
pub fn detect_preset(width: u32, height: u32) -> SizePreset {
    if let Some(exact) = BUILTIN_PRESETS
        .iter()
        .find(|preset| preset.width == width && preset.height == height)
    {
        return exact.to_preset();
    }
    if let Some(close) = BUILTIN_PRESETS
        .iter()
        .find(|preset| preset.is_close_to(width, height))
    {
        return close.to_preset();
    }
    dynamic_preset(width, height)
}

fn dynamic_preset(width: u32, height: u32) -> SizePreset {
    let w = width.max(1) as f64;
    let h = height.max(1) as f64;
    let aspect_ratio = w / h;
    let base_font_size = ((w * h).sqrt() / 25.0).floor().clamp(20.0, 80.0) as u32;
    let padding = ((w.min(h) * 0.03).floor() as u32).max(15);
    SizePreset {
        name: format!("custom_{}x{}", width, height),
        default_font_size: base_font_size,
        max_text_width: (w * 0.9).floor() as u32,
        default_position: PercentPoint {
            x: 50.0,
            y: if aspect_ratio < 1.2 { 85.0 } else { 80.0 },
        },
        padding,
    }
}
