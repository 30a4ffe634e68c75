use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn opaque(self) -> Self {
        Self { a: 255, ..self }
    }

    pub fn channels(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Accepts `[r, g, b]`, `[r, g, b, a]` (extra entries ignored),
    /// `"#rrggbb"`, `"#rrggbbaa"` and `"r,g,b[,a]"`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => {
                if items.len() < 3 {
                    return None;
                }
                let mut channels = [0u8, 0, 0, 255];
                for (slot, item) in channels.iter_mut().zip(items.iter().take(4)) {
                    *slot = channel_from_value(item)?;
                }
                Some(Self::from_channels(channels))
            }
            Value::String(text) => Self::parse(text),
            _ => None,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            return parse_hex(hex);
        }
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            if value.is_array() {
                return Self::from_value(&value);
            }
        }
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        if !(3..=4).contains(&parts.len()) {
            return None;
        }
        let mut channels = [0u8, 0, 0, 255];
        for (slot, part) in channels.iter_mut().zip(parts) {
            let number: f64 = part.parse().ok()?;
            *slot = clamp_channel(number);
        }
        Some(Self::from_channels(channels))
    }

    fn from_channels([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }

    pub fn svg_rgb(&self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }

    pub fn svg_opacity(&self) -> f32 {
        self.a as f32 / 255.0
    }
}

impl From<Rgba> for image::Rgba<u8> {
    fn from(color: Rgba) -> Self {
        image::Rgba(color.channels())
    }
}

fn channel_from_value(value: &Value) -> Option<u8> {
    value.as_f64().map(clamp_channel)
}

fn clamp_channel(number: f64) -> u8 {
    number.round().clamp(0.0, 255.0) as u8
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
    let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
    Some(Rgba::rgba(byte(0)?, byte(2)?, byte(4)?, alpha))
}

/// Lenient color field: malformed input reads as absent so the caller's
/// default applies.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<Rgba>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Rgba::from_value))
}
