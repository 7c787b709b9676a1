//! Themes: wallpaper, modes, style, and tags, stored as
//! `themes/<name>/theme.toml`.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use super::palette::PaletteRef;
use super::toml_loader;
use crate::document::Mapping;
use crate::error::ConfigError;

/// File name of a theme definition inside its directory.
pub const THEME_FILE: &str = "theme.toml";

/// Maximum length of a generated theme name.
const NAME_CHAR_LIMIT: usize = 20;

/// How a wallpaper is fitted to the display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallpaperMode {
    /// Cover the whole display, cropping if needed.
    #[default]
    Fill,
    /// Fit inside the display, letterboxing if needed.
    Fit,
}

impl fmt::Display for WallpaperMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fill => write!(f, "fill"),
            Self::Fit => write!(f, "fit"),
        }
    }
}

/// A wallpaper image and its fit mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallpaper {
    /// Absolute path of the image.
    pub path: PathBuf,
    /// Fit mode.
    pub mode: WallpaperMode,
}

impl Wallpaper {
    /// The wallpaper as it appears in the composed document.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "path": self.path.to_string_lossy(),
            "mode": self.mode.to_string(),
        })
    }
}

/// On-disk wallpaper: a bare file name, or a table with an explicit mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WallpaperSpec {
    Path(PathBuf),
    Full {
        path: PathBuf,
        #[serde(default)]
        mode: WallpaperMode,
    },
}

impl WallpaperSpec {
    fn resolve(self, theme_dir: &Path) -> Wallpaper {
        match self {
            Self::Path(path) => Wallpaper {
                path: theme_dir.join(path),
                mode: WallpaperMode::Fill,
            },
            Self::Full { path, mode } => Wallpaper {
                path: theme_dir.join(path),
                mode,
            },
        }
    }

    fn from_wallpaper(wallpaper: &Wallpaper) -> Self {
        let file_name = wallpaper
            .path
            .file_name()
            .map_or_else(|| wallpaper.path.clone(), PathBuf::from);
        match wallpaper.mode {
            WallpaperMode::Fill => Self::Path(file_name),
            mode => Self::Full {
                path: file_name,
                mode,
            },
        }
    }
}

/// A variant of a theme (`dark`, `light`) with its own palette.
#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    /// Mode name.
    pub name: String,
    /// Palette for this mode.
    pub palette: PaletteRef,
    /// Wallpaper override; the theme's wallpaper when absent.
    pub wallpaper: Option<Wallpaper>,
    /// Mode-specific style layer.
    pub style: Mapping,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModeFile {
    #[serde(default)]
    palette: PaletteRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wallpaper: Option<WallpaperSpec>,
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    style: Mapping,
}

#[derive(Debug, Serialize, Deserialize)]
struct ThemeFile {
    wallpaper: WallpaperSpec,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    style: Mapping,
    #[serde(default)]
    modes: Mapping,
}

/// A named bundle of wallpaper, modes, and style overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    /// Theme name (its directory name).
    pub name: String,
    /// Theme directory.
    pub dir: PathBuf,
    /// Default wallpaper.
    pub wallpaper: Wallpaper,
    /// Modes in file order.
    pub modes: Vec<Mode>,
    /// Theme-wide style layer.
    pub style: Mapping,
    /// Free-form tags used for filtering.
    pub tags: BTreeSet<String>,
}

impl Theme {
    /// Load `<dir>/theme.toml`; the theme is named after `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(THEME_FILE);
        let file: ThemeFile = toml_loader::load_required(&path)?;
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let mut modes = Vec::with_capacity(file.modes.len());
        for (mode_name, raw) in file.modes.iter() {
            let mode: ModeFile =
                serde_json::from_value(raw.clone()).map_err(|e| ConfigError::InvalidContent {
                    path: path.clone(),
                    message: format!("mode \"{mode_name}\": {e}"),
                })?;
            if let PaletteRef::Inline(palette) = &mode.palette {
                palette
                    .validate()
                    .map_err(|message| ConfigError::InvalidContent {
                        path: path.clone(),
                        message: format!("mode \"{mode_name}\": {message}"),
                    })?;
            }
            modes.push(Mode {
                name: mode_name.clone(),
                palette: mode.palette,
                wallpaper: mode.wallpaper.map(|w| w.resolve(dir)),
                style: mode.style,
            });
        }

        Ok(Self {
            name,
            dir: dir.to_path_buf(),
            wallpaper: file.wallpaper.resolve(dir),
            modes,
            style: file.style,
            tags: file.tags,
        })
    }

    /// Write the theme to `<dir>/theme.toml`, dropping defaulted fields and
    /// storing wallpapers by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.dir.join(THEME_FILE);
        let mut modes = Mapping::new();
        for mode in &self.modes {
            let wallpaper = mode
                .wallpaper
                .as_ref()
                .filter(|w| **w != self.wallpaper)
                .map(WallpaperSpec::from_wallpaper);
            let file = ModeFile {
                palette: mode.palette.clone(),
                wallpaper,
                style: mode.style.clone(),
            };
            let value = serde_json::to_value(file).map_err(|e| ConfigError::InvalidContent {
                path: path.clone(),
                message: e.to_string(),
            })?;
            modes.insert(mode.name.clone(), value);
        }
        let file = ThemeFile {
            wallpaper: WallpaperSpec::from_wallpaper(&self.wallpaper),
            tags: self.tags.clone(),
            style: self.style.clone(),
            modes,
        };
        toml_loader::save_toml(&path, &file)
    }

    /// Find a mode by name.
    #[must_use]
    pub fn mode(&self, name: &str) -> Option<&Mode> {
        self.modes.iter().find(|m| m.name == name)
    }

    /// Names of every mode, in file order.
    #[must_use]
    pub fn mode_names(&self) -> Vec<&str> {
        self.modes.iter().map(|m| m.name.as_str()).collect()
    }

    /// Wallpaper for `mode`, falling back to the theme's.
    #[must_use]
    pub fn wallpaper_for<'a>(&'a self, mode: &'a Mode) -> &'a Wallpaper {
        mode.wallpaper.as_ref().unwrap_or(&self.wallpaper)
    }
}

/// Turn `name` into a safe, unique theme directory name.
///
/// Keeps ASCII letters, digits, and `-_.() `, truncates to 20 characters,
/// replaces spaces with `_`, and lowercases. When `exists` reports a
/// collision, `_2`, `_3`, ... is appended.
#[must_use]
pub fn valid_theme_name(name: &str, exists: impl Fn(&str) -> bool) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "-_.() ".contains(*c))
        .take(NAME_CHAR_LIMIT)
        .collect();
    let base = cleaned.replace(' ', "_").to_lowercase();
    let mut candidate = base.clone();
    let mut suffix = 2;
    while exists(&candidate) {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    candidate
}
