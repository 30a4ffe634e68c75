use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_addr: String,
    pub max_body_bytes: usize,
    pub fonts_dir: PathBuf,
    pub default_font: String,
    pub fallback_families: Vec<String>,
    pub system_fonts: BTreeMap<String, Vec<PathBuf>>,
    pub outline_width: u32,
    pub min_image_bytes: usize,
    pub min_dimension: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:5000".to_string(),
            max_body_bytes: 32 * 1024 * 1024,
            fonts_dir: PathBuf::from("fonts"),
            default_font: "arial".to_string(),
            fallback_families: vec!["sans-serif".to_string()],
            system_fonts: BTreeMap::new(),
            outline_width: 3,
            min_image_bytes: 1000,
            min_dimension: 10,
        }
    }
}

impl Settings {
    pub fn max_body_mb(&self) -> usize {
        self.max_body_bytes / (1024 * 1024)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    fonts: Option<FontSettings>,
    overlay: Option<OverlaySettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
    max_body_mb: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    dir: Option<String>,
    default_font: Option<String>,
    fallback_families: Option<Vec<String>>,
    system: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    outline_width: Option<u32>,
    min_image_bytes: Option<usize>,
    min_dimension: Option<u32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let builtin: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse built-in settings")?;
    settings.merge(builtin);
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.server_addr = addr;
                }
            }
            if let Some(mb) = server.max_body_mb {
                if mb > 0 {
                    self.max_body_bytes = mb * 1024 * 1024;
                }
            }
        }
        if let Some(fonts) = incoming.fonts {
            if let Some(dir) = fonts.dir {
                if !dir.trim().is_empty() {
                    self.fonts_dir = PathBuf::from(dir);
                }
            }
            if let Some(name) = fonts.default_font {
                if !name.trim().is_empty() {
                    self.default_font = name.trim().to_lowercase();
                }
            }
            if let Some(families) = fonts.fallback_families {
                let families: Vec<String> = families
                    .into_iter()
                    .filter(|family| !family.trim().is_empty())
                    .collect();
                if !families.is_empty() {
                    self.fallback_families = families;
                }
            }
            if let Some(system) = fonts.system {
                for (family, paths) in system {
                    self.system_fonts.insert(
                        family.trim().to_lowercase(),
                        paths.into_iter().map(PathBuf::from).collect(),
                    );
                }
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(width) = overlay.outline_width {
                self.outline_width = width;
            }
            if let Some(bytes) = overlay.min_image_bytes {
                self.min_image_bytes = bytes;
            }
            if let Some(dimension) = overlay.min_dimension {
                if dimension > 0 {
                    self.min_dimension = dimension;
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".text-overlay-rust"))
        }
    })
}
