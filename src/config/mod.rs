//! Configuration: paths, the theme library, and module manifests.
//!
//! Everything lives under one config directory (see [`paths::Paths`]):
//!
//! ```text
//! config.toml            current selection
//! base_style.toml        base style layer
//! styles/<name>.toml     global styles
//! palettes/<name>.toml   global palettes
//! themes/<name>/         theme.toml plus wallpaper images
//! modules/<name>/        module.toml, templates/, files/
//! ```
pub mod manifest;
pub mod palette;
pub mod paths;
pub mod theme;
pub mod toml_loader;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::document::Mapping;
use crate::error::ConfigError;
use crate::logging::Log;
use palette::Palette;
use paths::Paths;
use theme::{THEME_FILE, Theme};

fn default_mode() -> String {
    "dark".to_string()
}

/// The theme and mode last applied, stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Current theme, if any theme was ever applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Current mode.
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            theme: None,
            mode: default_mode(),
        }
    }
}

impl Selection {
    /// Load `config.toml`; a missing file is the default selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed.
    pub fn load(paths: &Paths) -> Result<Self, ConfigError> {
        toml_loader::load_config(&paths.config_file())
    }

    /// Write `config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, paths: &Paths) -> Result<(), ConfigError> {
        toml_loader::save_toml(&paths.config_file(), self)
    }
}

/// Filters for picking a random theme.
#[derive(Debug, Clone, Default)]
pub struct ThemeFilter<'a> {
    /// Theme name must contain this.
    pub name_includes: Option<&'a str>,
    /// Theme must carry at least one of these tags, when not empty.
    pub include_tags: &'a [String],
    /// Theme must carry none of these tags.
    pub exclude_tags: &'a [String],
}

impl ThemeFilter<'_> {
    fn accepts(&self, theme: &Theme) -> bool {
        self.name_includes.is_none_or(|s| theme.name.contains(s))
            && (self.include_tags.is_empty()
                || self.include_tags.iter().any(|t| theme.tags.contains(t)))
            && !self.exclude_tags.iter().any(|t| theme.tags.contains(t))
    }
}

/// Everything the compositor reads: styles, palettes, themes, selection.
#[derive(Debug, Clone, Default)]
pub struct Library {
    /// The base style layer.
    pub base_style: Mapping,
    /// Global styles by name.
    pub styles: BTreeMap<String, Mapping>,
    /// Global palettes by name.
    pub palettes: BTreeMap<String, Palette>,
    /// Themes by name.
    pub themes: BTreeMap<String, Theme>,
    /// Current selection.
    pub selection: Selection,
}

impl Library {
    /// Load the whole library under `paths`.
    ///
    /// Styles, palettes, and themes that fail to load are logged and left
    /// out.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_style.toml` or `config.toml` is malformed.
    pub fn load(paths: &Paths, log: &dyn Log) -> Result<Self, ConfigError> {
        let base_style = toml_loader::load_mapping(&paths.base_style_file())?;
        let selection = Selection::load(paths)?;

        let (styles, errors) = toml_loader::load_dir_mappings(&paths.styles_dir());
        for e in errors {
            log.error(&format!("skipping style: {e}"));
        }

        let mut palettes = BTreeMap::new();
        for path in toml_loader::files_with_extension(&paths.palettes_dir(), "toml") {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match Palette::load(&path) {
                Ok(palette) => {
                    palettes.insert(name.to_string(), palette);
                }
                Err(e) => log.error(&format!("skipping palette \"{name}\": {e}")),
            }
        }

        let mut themes = BTreeMap::new();
        for dir in toml_loader::subdirectories(&paths.themes_dir()) {
            if !dir.join(THEME_FILE).is_file() {
                continue;
            }
            match Theme::load(&dir) {
                Ok(theme) => {
                    themes.insert(theme.name.clone(), theme);
                }
                Err(e) => log.error(&format!("skipping theme {}: {e}", dir.display())),
            }
        }

        log.debug(&format!(
            "library loaded: {} themes, {} styles, {} palettes",
            themes.len(),
            styles.len(),
            palettes.len()
        ));
        Ok(Self {
            base_style,
            styles,
            palettes,
            themes,
            selection,
        })
    }

    /// Every tag used by any theme.
    #[must_use]
    pub fn tags(&self) -> BTreeSet<&str> {
        self.themes
            .values()
            .flat_map(|t| t.tags.iter().map(String::as_str))
            .collect()
    }

    /// Themes accepted by `filter`, excluding the current theme.
    #[must_use]
    pub fn candidates(&self, filter: &ThemeFilter<'_>) -> Vec<&Theme> {
        let current = self.selection.theme.as_deref();
        self.themes
            .values()
            .filter(|t| Some(t.name.as_str()) != current && filter.accepts(t))
            .collect()
    }

    /// A random theme accepted by `filter`, never the current theme.
    #[must_use]
    pub fn random_theme(&self, filter: &ThemeFilter<'_>) -> Option<&Theme> {
        let candidates = self.candidates(filter);
        if candidates.is_empty() {
            return None;
        }
        let seed = usize::try_from(chrono::Utc::now().timestamp_subsec_nanos()).unwrap_or_default();
        candidates.get(seed % candidates.len()).copied()
    }
}
