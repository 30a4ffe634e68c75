use crate::fonts::FontResolver;
use crate::input::ImageLimits;
use crate::settings::Settings;

pub(crate) struct ServerState {
    pub(crate) settings: Settings,
    pub(crate) fonts: FontResolver,
}

impl ServerState {
    pub(crate) fn new(settings: Settings) -> Self {
        let fonts = FontResolver::new(&settings);
        Self { settings, fonts }
    }

    #[cfg(test)]
    pub(crate) fn with_fonts(settings: Settings, fonts: FontResolver) -> Self {
        Self { settings, fonts }
    }

    /// Limits applied to images sent to the preset overlay.
    pub(crate) fn image_limits(&self) -> ImageLimits {
        ImageLimits {
            min_bytes: self.settings.min_image_bytes,
            min_dimension: self.settings.min_dimension,
        }
    }
}
