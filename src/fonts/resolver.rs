use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::{debug, warn};
use usvg::fontdb;

use super::metrics::{FontMetrics, load_font_metrics, load_font_metrics_from_data};
use super::store::FontStore;
use crate::settings::Settings;
use crate::translit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    Custom(PathBuf),
    System(PathBuf),
    Database(String),
}

#[derive(Debug, Clone)]
pub struct ResolvedFont {
    pub metrics: FontMetrics,
    pub source: FontSource,
}

impl ResolvedFont {
    pub fn label(&self) -> String {
        if let Some(family) = self.metrics.family() {
            return family.to_string();
        }
        match &self.source {
            FontSource::Custom(path) | FontSource::System(path) => path.display().to_string(),
            FontSource::Database(family) => family.clone(),
        }
    }
}

/// Font picked for a piece of text, with the text to draw (possibly
/// transliterated). `font == None` means glyphs cannot be drawn at all.
#[derive(Debug, Clone)]
pub struct FontChoice {
    pub font: Option<ResolvedFont>,
    pub text: String,
    pub transliterated: bool,
}

impl FontChoice {
    pub fn metrics(&self) -> Option<&FontMetrics> {
        self.font.as_ref().map(|font| &font.metrics)
    }

    pub fn label(&self) -> String {
        self.font
            .as_ref()
            .map(ResolvedFont::label)
            .unwrap_or_else(|| "placeholder".to_string())
    }
}

#[derive(Debug, Clone)]
enum Candidate {
    Custom(PathBuf),
    System(PathBuf),
    Family(String),
}

pub struct FontResolver {
    store: FontStore,
    default_font: String,
    system_paths: BTreeMap<String, Vec<PathBuf>>,
    fallback_families: Vec<String>,
    use_font_database: bool,
    cache: Mutex<HashMap<PathBuf, FontMetrics>>,
    family_cache: Mutex<HashMap<String, Option<FontMetrics>>>,
    database: OnceLock<fontdb::Database>,
}

impl FontResolver {
    pub fn new(settings: &Settings) -> Self {
        Self {
            store: FontStore::new(settings.fonts_dir.clone()),
            default_font: settings.default_font.clone(),
            system_paths: settings.system_fonts.clone(),
            fallback_families: settings.fallback_families.clone(),
            use_font_database: true,
            cache: Mutex::new(HashMap::new()),
            family_cache: Mutex::new(HashMap::new()),
            database: OnceLock::new(),
        }
    }

    /// Resolver that only looks at the given store and probe table.
    pub fn isolated(store: FontStore, system_paths: BTreeMap<String, Vec<PathBuf>>) -> Self {
        Self {
            store,
            default_font: "arial".to_string(),
            system_paths,
            fallback_families: Vec::new(),
            use_font_database: false,
            cache: Mutex::new(HashMap::new()),
            family_cache: Mutex::new(HashMap::new()),
            database: OnceLock::new(),
        }
    }

    pub fn store(&self) -> &FontStore {
        &self.store
    }

    pub fn default_font(&self) -> &str {
        &self.default_font
    }

    /// Family names that have a probe table.
    pub fn system_font_names(&self) -> Vec<String> {
        self.system_paths.keys().cloned().collect()
    }

    /// Drops a cached face, e.g. after an upload replaced the file.
    pub fn forget(&self, path: &Path) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(path);
        }
    }

    pub fn resolve(&self, name: &str) -> Option<ResolvedFont> {
        self.candidates(name)
            .into_iter()
            .find_map(|candidate| self.load(&candidate))
    }

    /// Picks the first candidate able to draw `text`. Falls back to a
    /// transliterated text, then to any loadable font, then to no font.
    pub fn resolve_for_text(&self, name: &str, text: &str) -> FontChoice {
        let mut loaded: Vec<ResolvedFont> = Vec::new();
        for candidate in self.candidates(name) {
            let Some(font) = self.load(&candidate) else {
                continue;
            };
            if font.metrics.covers(text) {
                debug!(font = %font.label(), "font covers text");
                return FontChoice {
                    font: Some(font),
                    text: text.to_string(),
                    transliterated: false,
                };
            }
            loaded.push(font);
        }

        if loaded.is_empty() {
            warn!(requested = name, "no usable font found; drawing placeholders");
            return FontChoice {
                font: None,
                text: text.to_string(),
                transliterated: false,
            };
        }

        if translit::has_cyrillic(text) {
            let latin = translit::transliterate(text);
            if let Some(index) = loaded.iter().position(|font| font.metrics.covers(&latin)) {
                let font = loaded.swap_remove(index);
                warn!(font = %font.label(), "no font covers the text; transliterated");
                return FontChoice {
                    font: Some(font),
                    text: latin,
                    transliterated: true,
                };
            }
        }

        let fallback = loaded.swap_remove(0);
        warn!(font = %fallback.label(), "no font covers every character of the text");
        FontChoice {
            font: Some(fallback),
            text: text.to_string(),
            transliterated: false,
        }
    }

    /// Availability of every probe path plus the font database default.
    pub fn probe_report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        for paths in self.system_paths.values() {
            for path in paths {
                let key = path.display().to_string();
                if report.contains_key(&key) {
                    continue;
                }
                let status = if !path.exists() {
                    "Not found".to_string()
                } else {
                    match load_font_metrics(path) {
                        Ok(_) => "Available".to_string(),
                        Err(err) => format!("Error: {}", err),
                    }
                };
                report.insert(key, status);
            }
        }
        let database_default = self
            .fallback_families
            .iter()
            .find_map(|family| self.load(&Candidate::Family(family.clone())))
            .map(|font| format!("Available ({})", font.label()))
            .unwrap_or_else(|| "Not found".to_string());
        report.insert("default_font".to_string(), database_default);
        report
    }

    fn candidates(&self, name: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let trimmed = name.trim();
        if let Some(path) = self.store.path_for(trimmed) {
            candidates.push(Candidate::Custom(path));
        }
        let key = trimmed.to_lowercase();
        let table = self
            .system_paths
            .get(&key)
            .or_else(|| self.system_paths.get(&self.default_font));
        if let Some(paths) = table {
            for path in paths {
                candidates.push(Candidate::System(path.clone()));
            }
        }
        for family in &self.fallback_families {
            candidates.push(Candidate::Family(family.clone()));
        }
        candidates
    }

    fn load(&self, candidate: &Candidate) -> Option<ResolvedFont> {
        match candidate {
            Candidate::Custom(path) => self.load_path(path).map(|metrics| ResolvedFont {
                metrics,
                source: FontSource::Custom(path.clone()),
            }),
            Candidate::System(path) => self.load_path(path).map(|metrics| ResolvedFont {
                metrics,
                source: FontSource::System(path.clone()),
            }),
            Candidate::Family(family) => {
                if !self.use_font_database {
                    return None;
                }
                self.cached_family(family).map(|metrics| ResolvedFont {
                    metrics,
                    source: FontSource::Database(family.clone()),
                })
            }
        }
    }

    fn load_path(&self, path: &Path) -> Option<FontMetrics> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(metrics) = cache.get(path) {
                return Some(metrics.clone());
            }
        }
        if !path.is_file() {
            return None;
        }
        match load_font_metrics(path) {
            Ok(metrics) => {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(path.to_path_buf(), metrics.clone());
                }
                Some(metrics)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable font");
                None
            }
        }
    }

    /// Database lookups are remembered per family, misses included; the
    /// system font set does not change while the server runs.
    fn cached_family(&self, family: &str) -> Option<FontMetrics> {
        if let Ok(cache) = self.family_cache.lock() {
            if let Some(entry) = cache.get(family) {
                return entry.clone();
            }
        }
        let loaded = match self.load_family(family) {
            Ok(metrics) => Some(metrics),
            Err(err) => {
                debug!(family, error = %err, "font family unavailable");
                None
            }
        };
        if let Ok(mut cache) = self.family_cache.lock() {
            cache.insert(family.to_string(), loaded.clone());
        }
        loaded
    }

    fn load_family(&self, family: &str) -> Result<FontMetrics> {
        let db = self.database.get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            debug!(faces = db.len(), "loaded system font database");
            db
        });
        let is_sans =
            family.eq_ignore_ascii_case("sans-serif") || family.eq_ignore_ascii_case("sans");
        let families = if is_sans {
            vec![fontdb::Family::SansSerif]
        } else {
            vec![fontdb::Family::Name(family)]
        };
        let query = fontdb::Query {
            families: &families,
            ..Default::default()
        };
        let id = db
            .query(&query)
            .ok_or_else(|| anyhow!("font not found: {}", family))?;
        let data = db
            .with_face_data(id, |data, _index| data.to_vec())
            .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
        let preferred = if is_sans { None } else { Some(family) };
        load_font_metrics_from_data(data, preferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::prepare_upload;
    use crate::test_util::{CYRILLIC_FAMILY, LATIN_FAMILY, cyrillic_font, latin_font};
    use tempfile::tempdir;

    fn write_font(dir: &Path, file_name: &str, bytes: Vec<u8>) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, bytes).expect("write font");
        path
    }

    fn resolver_with(store_dir: &Path, paths: Vec<PathBuf>) -> FontResolver {
        let mut table = BTreeMap::new();
        table.insert("arial".to_string(), paths);
        FontResolver::isolated(FontStore::new(store_dir), table)
    }

    #[test]
    fn nothing_available_degrades_to_placeholders() {
        let dir = tempdir().expect("tempdir");
        let mut table = BTreeMap::new();
        table.insert(
            "arial".to_string(),
            vec![dir.path().join("missing.ttf")],
        );
        let resolver = FontResolver::isolated(FontStore::new(dir.path()), table);
        let choice = resolver.resolve_for_text("arial", "Привет");
        assert!(choice.font.is_none());
        assert_eq!(choice.text, "Привет");
        assert!(!choice.transliterated);
        assert_eq!(choice.label(), "placeholder");
        assert!(resolver.resolve("roboto").is_none());
    }

    #[test]
    fn unknown_family_uses_default_path_table() {
        let dir = tempdir().expect("tempdir");
        let mut table = BTreeMap::new();
        table.insert("arial".to_string(), vec![PathBuf::from("/a.ttf")]);
        table.insert("roboto".to_string(), vec![PathBuf::from("/r.ttf")]);
        let resolver = FontResolver::isolated(FontStore::new(dir.path()), table);
        let paths: Vec<PathBuf> = resolver
            .candidates("Comic")
            .into_iter()
            .map(|candidate| match candidate {
                Candidate::Custom(path) | Candidate::System(path) => path,
                Candidate::Family(family) => PathBuf::from(family),
            })
            .collect();
        assert_eq!(paths, vec![dir.path().join("Comic.ttf"), PathBuf::from("/a.ttf")]);
        assert_eq!(resolver.system_font_names(), vec!["arial", "roboto"]);
    }

    #[test]
    fn probe_report_marks_missing_paths() {
        let dir = tempdir().expect("tempdir");
        let broken = dir.path().join("broken.ttf");
        std::fs::write(&broken, b"not a font").unwrap();
        let mut table = BTreeMap::new();
        table.insert(
            "arial".to_string(),
            vec![dir.path().join("missing.ttf"), broken.clone()],
        );
        let resolver = FontResolver::isolated(FontStore::new(dir.path()), table);
        let report = resolver.probe_report();
        assert_eq!(
            report[&dir.path().join("missing.ttf").display().to_string()],
            "Not found"
        );
        assert!(report[&broken.display().to_string()].starts_with("Error: "));
        assert_eq!(report["default_font"], "Not found");
    }

    #[test]
    fn first_covering_face_wins() {
        let system = tempdir().expect("tempdir");
        let store = tempdir().expect("tempdir");
        let latin = write_font(system.path(), "latin.ttf", latin_font());
        let cyrillic = write_font(system.path(), "cyrillic.ttf", cyrillic_font());
        let resolver = resolver_with(store.path(), vec![latin.clone(), cyrillic.clone()]);

        let choice = resolver.resolve_for_text("arial", "Hello");
        assert_eq!(choice.label(), LATIN_FAMILY);
        assert!(!choice.transliterated);

        let choice = resolver.resolve_for_text("Arial", "Привет мир");
        assert_eq!(choice.label(), CYRILLIC_FAMILY);
        assert_eq!(choice.text, "Привет мир");
        assert!(!choice.transliterated);
        let font = choice.font.expect("font");
        assert_eq!(font.source, FontSource::System(cyrillic));
    }

    #[test]
    fn uncovered_cyrillic_is_transliterated_before_falling_back() {
        let system = tempdir().expect("tempdir");
        let store = tempdir().expect("tempdir");
        let latin = write_font(system.path(), "latin.ttf", latin_font());
        let resolver = resolver_with(store.path(), vec![latin]);

        let choice = resolver.resolve_for_text("arial", "Привет мир");
        assert_eq!(choice.label(), LATIN_FAMILY);
        assert_eq!(choice.text, "Privet mir");
        assert!(choice.transliterated);

        let choice = resolver.resolve_for_text("arial", "漢字");
        assert_eq!(choice.label(), LATIN_FAMILY);
        assert_eq!(choice.text, "漢字");
        assert!(!choice.transliterated);
    }

    #[test]
    fn uploaded_font_takes_priority_and_forget_drops_stale_face() {
        let system = tempdir().expect("tempdir");
        let store_dir = tempdir().expect("tempdir");
        let cyrillic = write_font(system.path(), "cyrillic.ttf", cyrillic_font());
        let resolver = resolver_with(store_dir.path(), vec![cyrillic]);

        let prepared = prepare_upload(Some("brand"), "brand.ttf", latin_font()).expect("prepare");
        let path = resolver.store().install(&prepared).expect("install");
        let font = resolver.resolve("brand").expect("custom font");
        assert_eq!(font.source, FontSource::Custom(path.clone()));
        assert_eq!(font.label(), LATIN_FAMILY);

        let replacement =
            prepare_upload(Some("brand"), "brand.otf", cyrillic_font()).expect("prepare");
        resolver.store().install(&replacement).expect("install");
        assert_eq!(resolver.resolve("brand").expect("cached").label(), LATIN_FAMILY);

        resolver.forget(&path);
        let font = resolver.resolve("brand").expect("reloaded");
        assert_eq!(font.source, FontSource::Custom(path));
        assert_eq!(font.label(), CYRILLIC_FAMILY);
    }

    #[test]
    fn database_misses_are_remembered() {
        let dir = tempdir().expect("tempdir");
        let settings = Settings {
            fonts_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };
        let resolver = FontResolver::new(&settings);
        assert!(resolver.cached_family("No Such Overlay Family").is_none());
        assert!(resolver.cached_family("No Such Overlay Family").is_none());
        let cache = resolver.family_cache.lock().expect("cache");
        assert_eq!(cache.len(), 1);
        assert!(matches!(cache.get("No Such Overlay Family"), Some(None)));
    }
}
