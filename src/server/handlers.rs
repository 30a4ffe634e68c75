use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::multipart::{Field, Multipart, MultipartError, MultipartRejection};
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::ServerError;
use super::models::{
    CreateTextImageRequest, DebugImageResponse, FontListResponse, FontUploadResponse,
    OverlayRequest, OverlayResponse, SimpleRequest, SimpleResponse, SimpleTextTestRequest,
    SmartRequest, SmartResponse, TextImageResponse,
};
use super::state::ServerState;
use crate::fonts::{FontSource, prepare_upload};
use crate::input::{ImageLimits, decode_base64_image, load_image};
use crate::overlay::{self, MAX_CANVAS_SIDE, OverlayMetadata, Rendered, TEST_IMAGE_SIZE};
use crate::preset::supported_sizes;
use crate::settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DATA_URL_PNG: &str = "data:image/png;base64,";
const MIN_IMAGE_FIELD_LEN: usize = 100;
const DATA_PREVIEW_LEN: usize = 100;
/// Multipart fields that stay strings even when they look like JSON.
const STRING_FIELDS: &[&str] = &["text", "fontName", "position", "format"];

pub async fn run_server(settings: Settings, addr: String) -> Result<()> {
    let state = Arc::new(ServerState::new(settings));
    state.fonts.store().ensure_dir()?;
    let fonts_dir = state.fonts.store().dir().display().to_string();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!(
        addr = addr.as_str(),
        fonts_dir = fonts_dir.as_str(),
        "text overlay server listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) fn router(state: Arc<ServerState>) -> Router {
    let body_limit = state.settings.max_body_bytes;
    Router::new()
        .route("/", get(index))
        .route("/overlay", post(overlay))
        .route("/overlay-raw", post(overlay_raw))
        .route("/overlay/upload", post(overlay_upload))
        .route("/simple-overlay", post(simple_overlay))
        .route("/smart-overlay", post(smart_overlay))
        .route("/create-text-image", post(create_text_image))
        .route("/simple-text-test", post(simple_text_test))
        .route("/generate-test-image", get(generate_test_image))
        .route("/upload-font", post(upload_font))
        .route("/fonts", get(list_fonts))
        .route("/fonts/:name", delete(delete_font))
        .route("/health", get(health))
        .route("/test-fonts", get(test_fonts))
        .route("/test", post(echo))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({
        "service": "Text Overlay API",
        "version": VERSION,
        "status": "running",
        "unicode_support": true,
        "supported_sizes": supported_sizes(),
        "endpoints": {
            "POST /overlay": "overlay text on a base64 image",
            "POST /overlay-raw": "overlay text, image returned as bare base64",
            "POST /overlay/upload": "overlay text on a multipart image upload",
            "POST /simple-overlay": "single centred line with a debug frame",
            "POST /smart-overlay": "wrapped text block at top, center or bottom",
            "POST /create-text-image": "new image with centred text",
            "POST /simple-text-test": "rendering self-check",
            "GET /generate-test-image": "1024x1024 reference image",
            "POST /upload-font": "upload a TTF/OTF font",
            "GET /fonts": "list fonts",
            "DELETE /fonts/{name}": "delete an uploaded font",
            "GET /health": "service status",
            "GET /test-fonts": "probe system fonts",
            "POST /test": "echo the received request"
        }
    }))
}

async fn health(State(state): State<Arc<ServerState>>) -> Json<Value> {
    let fonts_available = state.fonts.store().count() + state.fonts.system_font_names().len();
    Json(json!({
        "status": "healthy",
        "fonts_available": fonts_available,
        "unicode_support": true,
        "version": VERSION,
    }))
}

async fn not_found() -> ServerError {
    ServerError::not_found("endpoint not found")
}

async fn overlay(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<OverlayResponse>, ServerError> {
    run_json_overlay(state, &headers, body, true).await
}

async fn overlay_raw(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<OverlayResponse>, ServerError> {
    run_json_overlay(state, &headers, body, false).await
}

async fn run_json_overlay(
    state: Arc<ServerState>,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
    allow_data_url: bool,
) -> Result<Json<OverlayResponse>, ServerError> {
    let body = body.map_err(|rejection| {
        ServerError::rejected(
            rejection.status(),
            rejection.body_text(),
            state.settings.max_body_mb(),
        )
    })?;
    let content_type = content_type(headers);
    let request = validate_overlay_body(&body, &content_type)?;
    let debug_info = json!({
        "content_type": content_type,
        "method": "POST",
        "data_length": body.len(),
    });
    let include_data_url = allow_data_url && request.include_data_url.unwrap_or(false);
    let image = request.image.clone().unwrap_or_default();

    let rendered = render_preset_overlay(state, request, move || decode_base64_image(&image))
        .await
        .map_err(|err| err.with_detail("debug_info", debug_info))?;
    let encoded = BASE64.encode(&rendered.png);
    let image = if include_data_url {
        format!("{}{}", DATA_URL_PNG, encoded)
    } else {
        encoded
    };
    Ok(Json(OverlayResponse {
        success: true,
        image,
        metadata: rendered.meta,
    }))
}

/// Checks the `/overlay` body in the order clients rely on for their error
/// messages, then reads the options.
fn validate_overlay_body(body: &[u8], content_type: &str) -> Result<OverlayRequest, ServerError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ServerError::bad_request("request body is empty"));
    }
    let data: Value = serde_json::from_slice(body).map_err(|err| {
        let preview_len = body.len().min(DATA_PREVIEW_LEN);
        ServerError::bad_request(format!("failed to parse JSON: {}", err))
            .with_detail("content_type", content_type)
            .with_detail(
                "data_preview",
                String::from_utf8_lossy(&body[..preview_len]).into_owned(),
            )
    })?;
    if is_empty_value(&data) {
        return Err(ServerError::bad_request("request body is empty"));
    }
    let Some(fields) = data.as_object() else {
        return Err(ServerError::bad_request("field 'image' is required")
            .with_detail("received_fields", "not_dict"));
    };
    let Some(image) = fields.get("image") else {
        let received: Vec<&String> = fields.keys().collect();
        return Err(ServerError::bad_request("field 'image' is required")
            .with_detail("received_fields", json!(received)));
    };
    let text_is_blank = match fields.get("text") {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    };
    if text_is_blank {
        let received = fields
            .get("text")
            .cloned()
            .unwrap_or_else(|| Value::String("missing".to_string()));
        return Err(
            ServerError::bad_request("field 'text' is required and must not be empty")
                .with_detail("received_text", received),
        );
    }
    let Some(image) = image.as_str() else {
        return Err(ServerError::bad_request("field 'image' must be a string"));
    };
    if image.len() < MIN_IMAGE_FIELD_LEN {
        return Err(ServerError::bad_request("image is too small or corrupted"));
    }
    serde_json::from_value(data.clone())
        .map_err(|err| ServerError::bad_request(format!("invalid overlay options: {}", err)))
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// Decodes the image with `load_bytes` and runs the preset overlay on the
/// blocking pool. Decoding problems are client errors.
async fn render_preset_overlay<F>(
    state: Arc<ServerState>,
    request: OverlayRequest,
    load_bytes: F,
) -> Result<Rendered<OverlayMetadata>, ServerError>
where
    F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
{
    let rendered = run_blocking(move || {
        let bytes = load_bytes().map_err(|err| ServerError::bad_request(format!("{:#}", err)))?;
        let image = load_image(&bytes, state.image_limits())
            .map_err(|err| ServerError::bad_request(format!("{:#}", err)))?;
        let options = request.options(&state.settings);
        Ok(overlay::preset_overlay(image, &options, &state.fonts)?)
    })
    .await?;
    info!(
        preset = rendered.meta.preset_used.as_str(),
        font_size = rendered.meta.calculated_font_size,
        lines = rendered.meta.text_lines,
        font = rendered.meta.font_used.as_str(),
        "overlay rendered"
    );
    Ok(rendered)
}

async fn overlay_upload(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let max_body_mb = state.settings.max_body_mb();
    let mut multipart = multipart.map_err(|rejection| {
        ServerError::rejected(rejection.status(), rejection.body_text(), max_body_mb)
    })?;
    let mut image: Option<Vec<u8>> = None;
    let mut fields = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, max_body_mb))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            image = Some(field_bytes(field, max_body_mb).await?);
            continue;
        }
        let text = field
            .text()
            .await
            .map_err(|err| multipart_error(err, max_body_mb))?;
        fields.insert(name.clone(), form_value(&name, text));
    }
    let Some(image) = image else {
        return Err(ServerError::bad_request("image file is required"));
    };
    let request: OverlayRequest = serde_json::from_value(Value::Object(fields))
        .map_err(|err| ServerError::bad_request(format!("invalid overlay options: {}", err)))?;
    if request.text.as_deref().is_none_or(|text| text.trim().is_empty()) {
        return Err(ServerError::bad_request(
            "field 'text' is required and must not be empty",
        ));
    }
    let wants_json = request.wants_json();
    let rendered = render_preset_overlay(state, request, move || Ok(image)).await?;
    if wants_json {
        return Ok(Json(OverlayResponse {
            success: true,
            image: BASE64.encode(&rendered.png),
            metadata: rendered.meta,
        })
        .into_response());
    }
    Ok(([(header::CONTENT_TYPE, "image/png")], rendered.png).into_response())
}

/// Multipart text parts carry JSON-encoded values for numbers, booleans and
/// colours; anything unparsable is kept as a string.
fn form_value(name: &str, text: String) -> Value {
    if STRING_FIELDS.contains(&name) {
        return Value::String(text);
    }
    serde_json::from_str(text.trim()).unwrap_or(Value::String(text))
}

async fn field_bytes(field: Field<'_>, max_body_mb: usize) -> Result<Vec<u8>, ServerError> {
    field
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|err| multipart_error(err, max_body_mb))
}

fn multipart_error(err: MultipartError, max_body_mb: usize) -> ServerError {
    ServerError::rejected(err.status(), err.body_text(), max_body_mb)
}

async fn simple_overlay(
    State(state): State<Arc<ServerState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SimpleResponse>, ServerError> {
    let request: SimpleRequest = parse_body(&state, body)?;
    let image = require_image(request.image.as_deref())?;
    let options = request.options();
    let rendered = run_blocking(move || {
        let image = decode_image(&image, ImageLimits::NONE)?;
        Ok(overlay::simple_overlay(image, &options, &state.fonts)?)
    })
    .await?;
    info!(
        position = rendered.meta.text_position.as_str(),
        font_size = rendered.meta.font_size,
        "simple overlay rendered"
    );
    Ok(Json(debug_image_response(rendered)))
}

async fn smart_overlay(
    State(state): State<Arc<ServerState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SmartResponse>, ServerError> {
    let request: SmartRequest = parse_body(&state, body)?;
    let image = require_image(request.image.as_deref())?;
    let options = request.options();
    let rendered = run_blocking(move || {
        let image = decode_image(&image, ImageLimits::NONE)?;
        Ok(overlay::smart_overlay(image, &options, &state.fonts)?)
    })
    .await?;
    info!(
        lines = rendered.meta.lines_count,
        position = rendered.meta.position.as_str(),
        "smart overlay rendered"
    );
    Ok(Json(debug_image_response(rendered)))
}

async fn create_text_image(
    State(state): State<Arc<ServerState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<TextImageResponse>, ServerError> {
    let request: CreateTextImageRequest = parse_body(&state, body)?;
    let options = request.options();
    let valid_side = 1..=MAX_CANVAS_SIDE;
    if !valid_side.contains(&options.width) || !valid_side.contains(&options.height) {
        return Err(ServerError::bad_request(format!(
            "width and height must be between 1 and {}",
            MAX_CANVAS_SIDE
        )));
    }
    let rendered =
        run_blocking(move || Ok(overlay::create_text_image(&options, &state.fonts)?)).await?;
    Ok(Json(debug_image_response(rendered)))
}

async fn simple_text_test(
    State(state): State<Arc<ServerState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, ServerError> {
    let request: SimpleTextTestRequest = parse_body(&state, body)?;
    let text = request.text.unwrap_or_else(|| "TEST".to_string());
    let png = run_blocking(move || Ok(overlay::simple_text_test(&text, &state.fonts)?)).await?;
    Ok(Json(json!({
        "success": true,
        "image": BASE64.encode(&png),
        "message": "simple test completed",
    })))
}

async fn generate_test_image(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Value>, ServerError> {
    let png = run_blocking(move || Ok(overlay::generate_test_image(&state.fonts)?)).await?;
    let encoded = BASE64.encode(&png);
    Ok(Json(json!({
        "success": true,
        "image_with_prefix": format!("{}{}", DATA_URL_PNG, encoded),
        "image": encoded,
        "size": format!("{}x{}", TEST_IMAGE_SIZE, TEST_IMAGE_SIZE),
        "message": "test image generated",
    })))
}

async fn upload_font(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<FontUploadResponse>, ServerError> {
    let max_body_mb = state.settings.max_body_mb();
    let mut multipart = multipart.map_err(|rejection| {
        ServerError::rejected(rejection.status(), rejection.body_text(), max_body_mb)
    })?;
    let mut font: Option<(String, Vec<u8>)> = None;
    let mut name: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, max_body_mb))?
    {
        match field.name().unwrap_or_default() {
            "font" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                font = Some((file_name, field_bytes(field, max_body_mb).await?));
            }
            "name" => {
                name = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| multipart_error(err, max_body_mb))?,
                );
            }
            _ => {}
        }
    }
    let Some((file_name, bytes)) = font else {
        return Err(ServerError::bad_request("font file is required"));
    };
    let prepared = prepare_upload(name.as_deref(), &file_name, bytes)
        .map_err(|err| ServerError::bad_request(format!("{:#}", err)))?;
    let font_name = prepared.name.clone();
    let path = state.fonts.store().install(&prepared)?;
    state.fonts.forget(&path);
    match state.fonts.resolve(&font_name) {
        Some(font) if font.source == FontSource::Custom(path.clone()) => info!(
            font = font_name.as_str(),
            family = prepared.family.as_deref().unwrap_or("unknown"),
            path = %path.display(),
            "font uploaded"
        ),
        _ => warn!(
            font = font_name.as_str(),
            path = %path.display(),
            "uploaded font is stored but does not resolve"
        ),
    }
    Ok(Json(FontUploadResponse {
        success: true,
        message: format!("font '{}' uploaded", font_name),
        font_name,
    }))
}

async fn list_fonts(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<FontListResponse>, ServerError> {
    let system_fonts = state.fonts.system_font_names();
    let custom_fonts = state.fonts.store().list()?;
    Ok(Json(FontListResponse {
        total: system_fonts.len() + custom_fonts.len(),
        system_fonts,
        custom_fonts,
        unicode_support: true,
    }))
}

async fn delete_font(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let store = state.fonts.store();
    if !store.delete(&name)? {
        return Err(ServerError::not_found("font not found"));
    }
    if let Some(path) = store.path_for(&name) {
        state.fonts.forget(&path);
    }
    info!(font = name.as_str(), "font deleted");
    Ok(Json(json!({
        "success": true,
        "message": format!("font '{}' deleted", name),
    })))
}

async fn test_fonts(State(state): State<Arc<ServerState>>) -> Result<Json<Value>, ServerError> {
    let report = run_blocking(move || Ok(state.fonts.probe_report())).await?;
    Ok(Json(json!({
        "font_test_results": report,
        "platform": std::env::consts::OS,
    })))
}

async fn echo(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, ServerError> {
    let body = body.map_err(|rejection| {
        ServerError::rejected(
            rejection.status(),
            rejection.body_text(),
            state.settings.max_body_mb(),
        )
    })?;
    let data: Value = serde_json::from_slice(&body)
        .map_err(|err| ServerError::bad_request(format!("failed to parse JSON: {}", err)))?;
    let fields = data.as_object();
    let keys = fields
        .map(|fields| json!(fields.keys().collect::<Vec<_>>()))
        .unwrap_or_else(|| json!("not_dict"));
    let field = |key: &str| fields.and_then(|fields| fields.get(key));
    let image_length = field("image")
        .and_then(Value::as_str)
        .map(|image| image.chars().count())
        .unwrap_or(0);
    let text_value = field("text")
        .cloned()
        .unwrap_or_else(|| Value::String("missing".to_string()));
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    Ok(Json(json!({
        "received_data": {
            "keys": keys,
            "image_length": image_length,
            "text_value": text_value,
            "has_image": field("image").is_some(),
            "has_text": field("text").is_some(),
        },
        "content_type": content_type,
        "method": "POST",
    })))
}

/// Reads a JSON object body whatever the content type says. An empty body
/// means "all defaults".
fn parse_body<T>(
    state: &ServerState,
    body: Result<Bytes, BytesRejection>,
) -> Result<T, ServerError>
where
    T: DeserializeOwned + Default,
{
    let body = body.map_err(|rejection| {
        ServerError::rejected(
            rejection.status(),
            rejection.body_text(),
            state.settings.max_body_mb(),
        )
    })?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    let data: Value = serde_json::from_slice(&body)
        .map_err(|err| ServerError::bad_request(format!("failed to parse JSON: {}", err)))?;
    if !data.is_object() {
        return Err(ServerError::bad_request(
            "request body must be a JSON object",
        ));
    }
    serde_json::from_value(data)
        .map_err(|err| ServerError::bad_request(format!("invalid request: {}", err)))
}

fn require_image(image: Option<&str>) -> Result<String, ServerError> {
    match image.map(str::trim) {
        Some(image) if !image.is_empty() => Ok(image.to_string()),
        _ => Err(ServerError::bad_request("field 'image' is required")),
    }
}

fn decode_image(encoded: &str, limits: ImageLimits) -> Result<image::RgbaImage, ServerError> {
    decode_base64_image(encoded)
        .and_then(|bytes| load_image(&bytes, limits))
        .map_err(|err| ServerError::bad_request(format!("{:#}", err)))
}

fn debug_image_response<D>(rendered: Rendered<D>) -> DebugImageResponse<D> {
    DebugImageResponse {
        success: true,
        image: BASE64.encode(&rendered.png),
        debug: rendered.meta,
    }
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Runs CPU-bound rendering off the async workers.
async fn run_blocking<T, F>(task: F) -> Result<T, ServerError>
where
    F: FnOnce() -> Result<T, ServerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|err| {
        warn!(error = %err, "render task failed");
        ServerError::internal(format!("server task failed: {}", err))
    })?
}
