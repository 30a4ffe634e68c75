use crate::color::Rgba;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn from_edges(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            x: left,
            y: top,
            w: (right - left).max(0.0),
            h: (bottom - top).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outline {
    pub width: f32,
    pub color: Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub dx: f32,
    pub dy: f32,
    pub color: Rgba,
}

#[derive(Debug, Clone, Copy)]
pub struct TextPaint {
    pub size: f32,
    pub fill: Rgba,
    pub outline: Option<Outline>,
    pub shadow: Option<Shadow>,
}

/// Overlay layer assembled as SVG markup, rendered later by resvg.
pub struct SvgCanvas {
    width: u32,
    height: u32,
    font_family: Option<String>,
    body: String,
}

impl SvgCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            font_family: None,
            body: String::new(),
        }
    }

    pub fn with_font_family(mut self, family: Option<&str>) -> Self {
        self.font_family = family.map(|family| family.to_string());
        self
    }

    pub fn rect(&mut self, rect: Rect, fill: Rgba) {
        self.rounded_rect(rect, 0.0, fill);
    }

    pub fn rounded_rect(&mut self, rect: Rect, radius: f32, fill: Rgba) {
        if rect.w <= 0.0 || rect.h <= 0.0 {
            return;
        }
        let radius = radius.max(0.0).min(rect.w / 2.0).min(rect.h / 2.0);
        self.body.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" rx="{r}" ry="{r}"{paint}/>"#,
            x = rect.x,
            y = rect.y,
            w = rect.w,
            h = rect.h,
            r = radius,
            paint = fill_attrs(fill)
        ));
    }

    pub fn stroke_rect(&mut self, rect: Rect, color: Rgba, width: f32) {
        self.body.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none"{paint} stroke-width="{sw}"/>"#,
            x = rect.x,
            y = rect.y,
            w = rect.w,
            h = rect.h,
            paint = stroke_attrs(color),
            sw = width
        ));
    }

    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgba, width: f32) {
        self.body.push_str(&format!(
            r#"<line x1="{x1}" y1="{y1}" x2="{x2}" y2="{y2}"{paint} stroke-width="{sw}"/>"#,
            x1 = from.0,
            y1 = from.1,
            x2 = to.0,
            y2 = to.1,
            paint = stroke_attrs(color),
            sw = width
        ));
    }

    pub fn circle(&mut self, center: (f32, f32), radius: f32, fill: Rgba, stroke: Option<Outline>) {
        let stroke = stroke
            .map(|outline| {
                format!(
                    r#"{} stroke-width="{}""#,
                    stroke_attrs(outline.color),
                    outline.width
                )
            })
            .unwrap_or_default();
        self.body.push_str(&format!(
            r#"<circle cx="{cx}" cy="{cy}" r="{r}"{fill}{stroke}/>"#,
            cx = center.0,
            cy = center.1,
            r = radius,
            fill = fill_attrs(fill),
            stroke = stroke
        ));
    }

    /// Draws one line of text with its left edge at `x` and baseline at
    /// `baseline`: shadow first, then outline, then fill.
    pub fn text(&mut self, x: f32, baseline: f32, text: &str, paint: &TextPaint) {
        if text.trim().is_empty() {
            return;
        }
        let escaped = escape_xml(text);
        if let Some(shadow) = paint.shadow {
            self.push_text(
                x + shadow.dx,
                baseline + shadow.dy,
                &escaped,
                paint.size,
                &fill_attrs(shadow.color),
            );
        }
        if let Some(outline) = paint.outline.filter(|outline| outline.width > 0.0) {
            let attrs = format!(
                r#"{}{} stroke-width="{}" stroke-linejoin="round""#,
                fill_attrs(outline.color),
                stroke_attrs(outline.color),
                outline.width * 2.0
            );
            self.push_text(x, baseline, &escaped, paint.size, &attrs);
        }
        self.push_text(x, baseline, &escaped, paint.size, &fill_attrs(paint.fill));
    }

    fn push_text(&mut self, x: f32, baseline: f32, escaped: &str, size: f32, attrs: &str) {
        let family = self
            .font_family
            .as_deref()
            .map(|family| format!(r#" font-family="{}""#, escape_xml(family)))
            .unwrap_or_default();
        self.body.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}"{family}{attrs} xml:space="preserve">{text}</text>"#,
            x = x,
            y = baseline,
            size = size,
            family = family,
            attrs = attrs,
            text = escaped
        ));
    }

    pub fn finish(self) -> String {
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">{body}</svg>"#,
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

fn fill_attrs(color: Rgba) -> String {
    if color.a == 255 {
        format!(r#" fill="{}""#, color.svg_rgb())
    } else {
        format!(
            r#" fill="{}" fill-opacity="{}""#,
            color.svg_rgb(),
            color.svg_opacity()
        )
    }
}

fn stroke_attrs(color: Rgba) -> String {
    if color.a == 255 {
        format!(r#" stroke="{}""#, color.svg_rgb())
    } else {
        format!(
            r#" stroke="{}" stroke-opacity="{}""#,
            color.svg_rgb(),
            color.svg_opacity()
        )
    }
}

pub(crate) fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_layers_shadow_outline_and_fill_in_order() {
        let mut canvas = SvgCanvas::new(100, 50).with_font_family(Some("DejaVu Sans"));
        canvas.text(
            10.0,
            30.0,
            "Tom & <Jerry>",
            &TextPaint {
                size: 20.0,
                fill: Rgba::WHITE,
                outline: Some(Outline {
                    width: 3.0,
                    color: Rgba::BLACK,
                }),
                shadow: Some(Shadow {
                    dx: 2.0,
                    dy: 2.0,
                    color: Rgba::rgba(0, 0, 0, 128),
                }),
            },
        );
        let svg = canvas.finish();
        let shadow = svg.find(r#"x="12" y="32""#).expect("shadow");
        let outline = svg.find(r#"stroke-width="6""#).expect("outline");
        let fill = svg.rfind(r#"fill="rgb(255,255,255)""#).expect("fill");
        assert!(shadow < outline && outline < fill);
        assert!(svg.contains("Tom &amp; &lt;Jerry&gt;"));
        assert!(svg.contains(r#"font-family="DejaVu Sans""#));
        assert!(svg.contains(r#"fill-opacity="0.50"#));
    }

    #[test]
    fn blank_text_and_empty_rects_are_skipped() {
        let mut canvas = SvgCanvas::new(10, 10);
        canvas.text(0.0, 5.0, "   ", &TextPaint {
            size: 5.0,
            fill: Rgba::WHITE,
            outline: None,
            shadow: None,
        });
        canvas.rect(Rect::from_edges(5.0, 5.0, 2.0, 8.0), Rgba::BLACK);
        assert_eq!(
            canvas.finish(),
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 10 10"></svg>"#
        );
    }

    #[test]
    fn rounded_radius_is_bounded_by_rect() {
        let mut canvas = SvgCanvas::new(10, 10);
        canvas.rounded_rect(
            Rect {
                x: 0.0,
                y: 0.0,
                w: 8.0,
                h: 4.0,
            },
            15.0,
            Rgba::BLACK,
        );
        assert!(canvas.finish().contains(r#"rx="2" ry="2""#));
    }
}
