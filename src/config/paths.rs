//! Filesystem locations, resolved once at startup and threaded through every
//! component.
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::platform::Os;

/// Application directory name under the platform config/cache dirs.
pub const APP_NAME: &str = "ricer";

/// Resolved directories for one process.
///
/// ```text
/// <root>/config.toml               current theme and mode
/// <root>/base_style.toml           base style layer
/// <root>/styles/<name>.toml        global styles
/// <root>/palettes/<name>.toml      global palettes
/// <root>/generators/<name>         palette generator executables
/// <root>/themes/<name>/theme.toml  themes
/// <root>/modules/<name>/           module.toml, templates/, files/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// User home directory.
    pub home: PathBuf,
    /// Platform configuration directory (`~/.config` on Linux).
    pub config_dir: PathBuf,
    /// Root of the ricer configuration tree.
    pub root: PathBuf,
    /// Cache directory for logs.
    pub cache_dir: PathBuf,
    /// Directory holding the run lock.
    pub runtime_dir: PathBuf,
}

impl Paths {
    /// Resolve paths from the process environment.
    ///
    /// `root_override` (from `--config-dir`) wins over `$RICER_CONFIG_DIR`,
    /// which wins over `<config_dir>/ricer`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHome`] if no home directory can be found.
    pub fn detect(os: Os, root_override: Option<&Path>) -> Result<Self, ConfigError> {
        Self::detect_with(os, root_override, |key| std::env::var_os(key))
    }

    /// Resolve paths using `env` to look up environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHome`] if no home directory can be found.
    pub fn detect_with(
        os: Os,
        root_override: Option<&Path>,
        env: impl Fn(&str) -> Option<OsString>,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| env(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        let home = var("HOME")
            .or_else(|| var("USERPROFILE"))
            .ok_or_else(|| ConfigError::NoHome("neither HOME nor USERPROFILE is set".into()))?;

        let (config_dir, cache_base, runtime_dir) = match os {
            Os::Linux => {
                let config = var("XDG_CONFIG_HOME").unwrap_or_else(|| home.join(".config"));
                let cache = var("XDG_CACHE_HOME").unwrap_or_else(|| home.join(".cache"));
                let runtime = var("XDG_RUNTIME_DIR")
                    .unwrap_or_else(|| home.join(".local").join("run"))
                    .join(APP_NAME);
                (config, cache, runtime)
            }
            Os::Windows => {
                let config = var("APPDATA").unwrap_or_else(|| home.join("AppData").join("Roaming"));
                let cache =
                    var("LOCALAPPDATA").unwrap_or_else(|| home.join("AppData").join("Local"));
                let runtime = cache.join(APP_NAME);
                (config, cache, runtime)
            }
            Os::Mac => {
                let config = home.join("Library").join("Application Support");
                let cache = home.join("Library").join("Caches");
                let runtime = config.join(APP_NAME).join("run");
                (config, cache, runtime)
            }
        };

        let root = root_override
            .map(Path::to_path_buf)
            .or_else(|| var("RICER_CONFIG_DIR"))
            .unwrap_or_else(|| config_dir.join(APP_NAME));

        Ok(Self {
            home,
            config_dir,
            root,
            cache_dir: cache_base.join(APP_NAME),
            runtime_dir,
        })
    }

    /// Build paths rooted entirely under `base`, for tests and sandboxes.
    #[must_use]
    pub fn sandboxed(base: &Path) -> Self {
        Self {
            home: base.join("home"),
            config_dir: base.join("home").join(".config"),
            root: base.join("ricer"),
            cache_dir: base.join("cache"),
            runtime_dir: base.join("run"),
        }
    }

    /// `config.toml`: the current theme selection.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// `base_style.toml`: the first style layer of every document.
    #[must_use]
    pub fn base_style_file(&self) -> PathBuf {
        self.root.join("base_style.toml")
    }

    /// Directory of global styles.
    #[must_use]
    pub fn styles_dir(&self) -> PathBuf {
        self.root.join("styles")
    }

    /// Directory of global palettes.
    #[must_use]
    pub fn palettes_dir(&self) -> PathBuf {
        self.root.join("palettes")
    }

    /// Directory of palette generator executables.
    #[must_use]
    pub fn generators_dir(&self) -> PathBuf {
        self.root.join("generators")
    }

    /// Directory of themes.
    #[must_use]
    pub fn themes_dir(&self) -> PathBuf {
        self.root.join("themes")
    }

    /// Directory of one theme.
    #[must_use]
    pub fn theme_dir(&self, name: &str) -> PathBuf {
        self.themes_dir().join(name)
    }

    /// Directory of modules.
    #[must_use]
    pub fn modules_dir(&self) -> PathBuf {
        self.root.join("modules")
    }

    /// Directory of one module.
    #[must_use]
    pub fn module_dir(&self, name: &str) -> PathBuf {
        self.modules_dir().join(name)
    }

    /// PID file guarding orchestration runs.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.runtime_dir.join("ricer.lock")
    }

    /// Log file of one subcommand.
    #[must_use]
    pub fn log_file(&self, command: &str) -> PathBuf {
        self.cache_dir.join(format!("{command}.log"))
    }

    /// Expand a leading `~` to the home directory.
    #[must_use]
    pub fn expand_user(&self, path: &str) -> PathBuf {
        if path == "~" {
            return self.home.clone();
        }
        path.strip_prefix("~/")
            .or_else(|| path.strip_prefix("~\\"))
            .map_or_else(|| PathBuf::from(path), |rest| self.home.join(rest))
    }
}
