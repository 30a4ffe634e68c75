mod raster;
mod svg;

pub use raster::{composite, encode_png, flatten, rasterize, render_onto};
pub use svg::{Outline, Rect, Shadow, SvgCanvas, TextPaint};
