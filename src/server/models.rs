use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::color::{Rgba, deserialize_lenient as lenient_color};
use crate::overlay::{
    BlockAnchor, CreateTextImageOptions, OverlayMetadata, OverlayOptions, SimpleDebug,
    SimpleOptions, SmartDebug, SmartOptions, TextImageDebug,
};
use crate::render::Shadow;
use crate::settings::Settings;

const DEFAULT_SHADOW_OFFSET: f32 = 2.0;

/// Options of the preset overlay, shared by the JSON and multipart routes.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct OverlayRequest {
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) image: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) text: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) font_name: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub(crate) font_size: Option<u32>,
    #[serde(deserialize_with = "lenient_color")]
    pub(crate) font_color: Option<Rgba>,
    #[serde(deserialize_with = "lenient_color")]
    pub(crate) bg_color: Option<Rgba>,
    #[serde(deserialize_with = "lenient_bool")]
    pub(crate) transparent_bg: Option<bool>,
    #[serde(deserialize_with = "lenient_f32")]
    pub(crate) pos_x: Option<f32>,
    #[serde(deserialize_with = "lenient_f32")]
    pub(crate) pos_y: Option<f32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub(crate) outline_width: Option<u32>,
    #[serde(deserialize_with = "lenient_color")]
    pub(crate) outline_color: Option<Rgba>,
    #[serde(deserialize_with = "lenient_bool")]
    pub(crate) shadow: Option<bool>,
    #[serde(deserialize_with = "lenient_color")]
    pub(crate) shadow_color: Option<Rgba>,
    #[serde(deserialize_with = "lenient_f32")]
    pub(crate) shadow_offset: Option<f32>,
    #[serde(deserialize_with = "lenient_bool")]
    pub(crate) wrap: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub(crate) include_data_url: Option<bool>,
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) format: Option<String>,
}

impl OverlayRequest {
    pub(crate) fn options(&self, settings: &Settings) -> OverlayOptions {
        let defaults = OverlayOptions::default();
        let shadow = self.shadow.unwrap_or(false).then(|| {
            let offset = self.shadow_offset.unwrap_or(DEFAULT_SHADOW_OFFSET);
            Shadow {
                dx: offset,
                dy: offset,
                color: self.shadow_color.unwrap_or(Rgba::BLACK),
            }
        });
        OverlayOptions {
            text: self.text.clone().unwrap_or_default(),
            font_name: self
                .font_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| settings.default_font.clone()),
            font_size: self.font_size,
            font_color: self.font_color.unwrap_or(defaults.font_color),
            bg_color: self.bg_color.unwrap_or(defaults.bg_color),
            transparent_bg: self.transparent_bg.unwrap_or(false),
            pos_x: self.pos_x,
            pos_y: self.pos_y,
            outline_width: self.outline_width.unwrap_or(settings.outline_width),
            outline_color: self.outline_color.unwrap_or(defaults.outline_color),
            shadow,
            wrap: self.wrap.unwrap_or(false),
        }
    }

    pub(crate) fn wants_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|format| format.trim().eq_ignore_ascii_case("json"))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct SimpleRequest {
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) image: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) text: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub(crate) font_size: Option<u32>,
    #[serde(deserialize_with = "lenient_f32")]
    pub(crate) x: Option<f32>,
    #[serde(deserialize_with = "lenient_f32")]
    pub(crate) y: Option<f32>,
    #[serde(deserialize_with = "lenient_bool")]
    pub(crate) debug_frame: Option<bool>,
}

impl SimpleRequest {
    pub(crate) fn options(&self) -> SimpleOptions {
        let defaults = SimpleOptions::default();
        SimpleOptions {
            text: self.text.clone().unwrap_or(defaults.text),
            font_size: self.font_size,
            x: self.x,
            y: self.y,
            debug_frame: self.debug_frame.unwrap_or(defaults.debug_frame),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct SmartRequest {
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) image: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) text: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub(crate) font_size: Option<u32>,
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) position: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub(crate) margin: Option<u32>,
    #[serde(deserialize_with = "lenient_color")]
    pub(crate) text_color: Option<Rgba>,
    #[serde(deserialize_with = "lenient_color")]
    pub(crate) outline_color: Option<Rgba>,
    #[serde(deserialize_with = "lenient_color")]
    pub(crate) background_color: Option<Rgba>,
    #[serde(deserialize_with = "lenient_bool")]
    pub(crate) use_background: Option<bool>,
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) font_name: Option<String>,
}

impl SmartRequest {
    pub(crate) fn options(&self) -> SmartOptions {
        let defaults = SmartOptions::default();
        SmartOptions {
            text: self.text.clone().unwrap_or(defaults.text),
            font_size: self.font_size,
            position: self
                .position
                .as_deref()
                .map(BlockAnchor::parse)
                .unwrap_or_default(),
            requested_position: self.position.clone(),
            margin: self.margin,
            text_color: self.text_color.unwrap_or(defaults.text_color),
            outline_color: self.outline_color.unwrap_or(defaults.outline_color),
            background: self.background_color.unwrap_or(defaults.background),
            use_background: self.use_background.unwrap_or(defaults.use_background),
            font_name: self.font_name.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct CreateTextImageRequest {
    #[serde(deserialize_with = "lenient_u32")]
    pub(crate) width: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub(crate) height: Option<u32>,
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) text: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub(crate) font_size: Option<u32>,
    #[serde(deserialize_with = "lenient_color")]
    pub(crate) bg_color: Option<Rgba>,
    #[serde(deserialize_with = "lenient_color")]
    pub(crate) text_color: Option<Rgba>,
}

impl CreateTextImageRequest {
    pub(crate) fn options(&self) -> CreateTextImageOptions {
        let defaults = CreateTextImageOptions::default();
        CreateTextImageOptions {
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            text: self.text.clone().unwrap_or(defaults.text),
            font_size: self.font_size.unwrap_or(defaults.font_size),
            bg_color: self.bg_color.unwrap_or(defaults.bg_color),
            text_color: self.text_color.unwrap_or(defaults.text_color),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SimpleTextTestRequest {
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OverlayResponse {
    pub(crate) success: bool,
    pub(crate) image: String,
    pub(crate) metadata: OverlayMetadata,
}

#[derive(Debug, Serialize)]
pub(crate) struct DebugImageResponse<D> {
    pub(crate) success: bool,
    pub(crate) image: String,
    pub(crate) debug: D,
}

pub(crate) type SimpleResponse = DebugImageResponse<SimpleDebug>;
pub(crate) type SmartResponse = DebugImageResponse<SmartDebug>;
pub(crate) type TextImageResponse = DebugImageResponse<TextImageDebug>;

#[derive(Debug, Serialize)]
pub(crate) struct FontListResponse {
    pub(crate) system_fonts: Vec<String>,
    pub(crate) custom_fonts: Vec<String>,
    pub(crate) total: usize,
    pub(crate) unicode_support: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct FontUploadResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
    pub(crate) font_name: String,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value)
        .filter(|number| *number >= 0.0)
        .map(|number| number.trunc().min(u32::MAX as f64) as u32))
}

fn lenient_f32<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value)
        .filter(|number| number.abs() <= f32::MAX as f64)
        .map(|number| number as f32))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => Some(flag),
        Value::Number(number) => number.as_f64().map(|number| number != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    })
}
