use anyhow::Result;
use std::path::{Path, PathBuf};

pub mod color;
pub mod fonts;
pub mod input;
pub mod layout;
pub mod logging;
pub mod overlay;
pub mod preset;
pub mod render;
pub mod server;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod translit;

pub use overlay::{OverlayMetadata, OverlayOptions, Rendered, preset_overlay};
pub use settings::Settings;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub addr: Option<String>,
    pub settings_path: Option<String>,
    pub fonts_dir: Option<PathBuf>,
}

/// Loads the layered settings, applies command-line overrides and serves
/// until the listener fails.
pub async fn run(config: Config) -> Result<()> {
    let settings = resolve_settings(&config)?;
    let addr = settings.server_addr.clone();
    server::run_server(settings, addr).await
}

pub fn resolve_settings(config: &Config) -> Result<Settings> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    if let Some(addr) = config.addr.as_deref().map(str::trim).filter(|addr| !addr.is_empty()) {
        settings.server_addr = addr.to_string();
    }
    if let Some(dir) = config.fonts_dir.clone() {
        settings.fonts_dir = dir;
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn command_line_overrides_win_over_settings() {
        with_temp_home(|_| {
            let config = Config {
                addr: Some("127.0.0.1:8080".to_string()),
                settings_path: None,
                fonts_dir: Some(PathBuf::from("/tmp/overlay-fonts")),
            };
            let settings = resolve_settings(&config).expect("settings");
            assert_eq!(settings.server_addr, "127.0.0.1:8080");
            assert_eq!(settings.fonts_dir, PathBuf::from("/tmp/overlay-fonts"));
        });
    }

    #[test]
    fn blank_addr_keeps_configured_one() {
        with_temp_home(|_| {
            let config = Config {
                addr: Some("  ".to_string()),
                ..Config::default()
            };
            let settings = resolve_settings(&config).expect("settings");
            assert_eq!(settings.server_addr, "0.0.0.0:5000");
        });
    }
}
