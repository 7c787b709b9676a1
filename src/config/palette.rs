//! Palettes and the palette generator collaborator.
use anyhow::{Context as _, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::toml_loader;
use crate::document::Mapping;
use crate::document::color::Color;
use crate::document::template::display_value;
use crate::exec::Executor;

/// A fixed-shape set of named color groups.
///
/// Every group is optional and maps color names to color strings
/// (`term.color0 = "#1d2021"`, `primary.bg = "#458588"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Palette {
    /// Terminal colors (`color0` .. `color15`, `foreground`, `background`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<Mapping>,
    /// Default surface colors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<Mapping>,
    /// Panels and bars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel: Option<Mapping>,
    /// Dialogs and popups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog: Option<Mapping>,
    /// Text inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Mapping>,
    /// Borders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Mapping>,
    /// De-emphasized content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<Mapping>,
    /// Primary accent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<Mapping>,
    /// Secondary accent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Mapping>,
    /// Tertiary accent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<Mapping>,
    /// Destructive actions and errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destructive: Option<Mapping>,
}

impl Palette {
    /// The palette as a document layer, omitting absent groups.
    #[must_use]
    pub fn to_mapping(&self) -> Mapping {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| Mapping::try_from(v).ok())
            .unwrap_or_default()
    }

    fn groups(&self) -> [(&'static str, Option<&Mapping>); 11] {
        [
            ("term", self.term.as_ref()),
            ("normal", self.normal.as_ref()),
            ("panel", self.panel.as_ref()),
            ("dialog", self.dialog.as_ref()),
            ("input", self.input.as_ref()),
            ("border", self.border.as_ref()),
            ("muted", self.muted.as_ref()),
            ("primary", self.primary.as_ref()),
            ("secondary", self.secondary.as_ref()),
            ("accent", self.accent.as_ref()),
            ("destructive", self.destructive.as_ref()),
        ]
    }

    /// Check that every entry of every group is a color string.
    ///
    /// # Errors
    ///
    /// Returns the dotted path and value of the first entry that is not.
    pub fn validate(&self) -> Result<(), String> {
        for (group, colors) in self.groups() {
            for (name, value) in colors.into_iter().flat_map(Mapping::iter) {
                let parsed = value.as_str().map(Color::parse);
                if !matches!(parsed, Some(Ok(_))) {
                    return Err(format!(
                        "{group}.{name}: invalid color \"{}\"",
                        display_value(value)
                    ));
                }
            }
        }
        Ok(())
    }

    /// Load a palette from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, contains
    /// unknown groups, or holds a malformed color.
    pub fn load(path: &Path) -> Result<Self, crate::error::ConfigError> {
        let palette: Self = toml_loader::load_required(path)?;
        palette
            .validate()
            .map_err(|message| crate::error::ConfigError::InvalidContent {
                path: path.to_path_buf(),
                message,
            })?;
        Ok(palette)
    }
}

/// Reference from a theme mode to its palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaletteRef {
    /// `palette = { from_global = "nord" }`: a palette under `palettes/`.
    Link {
        /// Name of the global palette.
        from_global: String,
    },
    /// A palette written inline in the theme.
    Inline(Palette),
}

impl Default for PaletteRef {
    fn default() -> Self {
        Self::Inline(Palette::default())
    }
}

/// Creates a palette from an image.
pub trait PaletteGenerator: Send + Sync + std::fmt::Debug {
    /// Generator name, used as the generated mode's name (`dark`, `light`).
    fn name(&self) -> &str;

    /// Generate a palette for `image`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be processed.
    fn generate(&self, image: &Path) -> Result<Palette>;
}

/// Runs an executable that prints a palette as JSON on stdout.
///
/// The executable is called with the image path as its only argument.
#[derive(Debug)]
pub struct CommandPaletteGenerator {
    name: String,
    program: PathBuf,
    executor: Arc<dyn Executor>,
}

impl CommandPaletteGenerator {
    /// Wrap `program` as a generator called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, program: PathBuf, executor: Arc<dyn Executor>) -> Self {
        Self {
            name: name.into(),
            program,
            executor,
        }
    }

    /// Discover every executable under `dir`, named after its file stem.
    #[must_use]
    pub fn discover(dir: &Path, executor: &Arc<dyn Executor>) -> Vec<Self> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut programs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        programs.sort();
        programs
            .into_iter()
            .filter_map(|program| {
                let stem = program.file_stem()?.to_str()?.to_string();
                Some(Self::new(stem, program, Arc::clone(executor)))
            })
            .collect()
    }
}

impl PaletteGenerator for CommandPaletteGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, image: &Path) -> Result<Palette> {
        let program = self.program.to_string_lossy();
        let image = image.to_string_lossy();
        let result = self.executor.run(&program, &[&image])?;
        if result.stdout.trim().is_empty() {
            bail!("generator \"{}\" printed no palette", self.name);
        }
        let palette: Palette = serde_json::from_str(&result.stdout)
            .with_context(|| format!("generator \"{}\" printed an invalid palette", self.name))?;
        if let Err(message) = palette.validate() {
            bail!("generator \"{}\" printed an invalid palette: {message}", self.name);
        }
        Ok(palette)
    }
}
