mod metrics;
mod resolver;
mod store;

pub use metrics::{
    FontMetrics, ascent_px, line_height_px, load_font_metrics, load_font_metrics_from_data,
    measure_text_width_px,
};
pub use resolver::{FontChoice, FontResolver, FontSource, ResolvedFont};
pub use store::{FontStore, PreparedFont, prepare_upload};
