use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::metrics::{FontMetrics, load_font_metrics_from_data};

const STORED_EXTENSION: &str = "ttf";
const ACCEPTED_EXTENSIONS: &[&str] = &["ttf", "otf"];
const MAX_NAME_LEN: usize = 128;

/// Flat folder of uploaded fonts, one `{name}.ttf` per font.
#[derive(Debug, Clone)]
pub struct FontStore {
    dir: PathBuf,
}

/// An upload that passed validation and is ready to be written.
#[derive(Debug)]
pub struct PreparedFont {
    pub name: String,
    pub family: Option<String>,
    bytes: Vec<u8>,
}

impl FontStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create fonts dir: {}", self.dir.display()))
    }

    /// Path a font would be stored at. `None` for names that are not plain
    /// file names.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        validate_font_name(name).ok()?;
        Some(self.dir.join(format!("{}.{}", name, STORED_EXTENSION)))
    }

    pub fn install(&self, font: &PreparedFont) -> Result<PathBuf> {
        self.ensure_dir()?;
        let dest = self.dir.join(format!("{}.{}", font.name, STORED_EXTENSION));
        let mut file = tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .with_context(|| "failed to create temp font file")?;
        file.write_all(&font.bytes)
            .with_context(|| "failed to write uploaded font")?;
        file.persist(&dest)
            .with_context(|| format!("failed to store font: {}", dest.display()))?;
        Ok(dest)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read fonts dir: {}", self.dir.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| "failed to read fonts dir entry")?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_stored = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(STORED_EXTENSION))
                .unwrap_or(false);
            if !is_stored {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn count(&self) -> usize {
        self.list().map(|names| names.len()).unwrap_or(0)
    }

    /// Returns `Ok(false)` when no such font exists.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let Some(path) = self.path_for(name) else {
            return Ok(false);
        };
        if !path.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to delete font: {}", path.display()))?;
        Ok(true)
    }
}

/// Validates an upload: name (explicit or the file stem), extension and
/// font data.
pub fn prepare_upload(
    name: Option<&str>,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<PreparedFont> {
    let file_path = Path::new(file_name);
    let extension = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(anyhow!("only TTF and OTF fonts are supported"));
    }
    let name = match name.map(str::trim).filter(|value| !value.is_empty()) {
        Some(explicit) => explicit.to_string(),
        None => file_name
            .split('.')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string(),
    };
    validate_font_name(&name)?;
    if let Some(kind) = infer::get(&bytes) {
        if kind.matcher_type() != infer::MatcherType::Font {
            return Err(anyhow!(
                "uploaded file looks like {}, not a font",
                kind.mime_type()
            ));
        }
    }
    let metrics: FontMetrics = load_font_metrics_from_data(bytes, None)
        .map_err(|err| anyhow!("unable to load font: {}", err))?;
    let family = metrics.family().map(|family| family.to_string());
    Ok(PreparedFont {
        name,
        family,
        bytes: metrics.data().to_vec(),
    })
}

fn validate_font_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow!("font name is empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(anyhow!("font name is too long"));
    }
    if name.starts_with('.')
        || name
            .chars()
            .any(|ch| matches!(ch, '/' | '\\' | ':') || ch.is_control())
    {
        return Err(anyhow!("font name must be a plain file name: {}", name));
    }
    Ok(())
}
