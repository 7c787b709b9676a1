//! Module manifests: `modules/<name>/module.toml`.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::toml_loader;
use crate::actions::ActionKind;
use crate::error::ConfigError;
use crate::platform::Os;

/// File name of a module manifest inside its directory.
pub const MANIFEST_FILE: &str = "module.toml";

const fn default_true() -> bool {
    true
}

fn all_os() -> Vec<Os> {
    Os::ALL.to_vec()
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_true(value: &bool) -> bool {
    *value
}

fn is_all_os(os: &[Os]) -> bool {
    Os::ALL.iter().all(|o| os.contains(o))
}

/// Actions bound to each lifecycle event, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OnEvents {
    /// Run once when the module is installed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub module_install: Vec<ActionKind>,
    /// Run sequentially before any module applies; may transform the document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before_theme_apply: Vec<ActionKind>,
    /// Run concurrently with other modules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub theme_apply: Vec<ActionKind>,
    /// Run sequentially once every module has applied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after_theme_apply: Vec<ActionKind>,
}

impl OnEvents {
    /// Whether nothing is bound to any event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.module_install.is_empty()
            && self.before_theme_apply.is_empty()
            && self.theme_apply.is_empty()
            && self.after_theme_apply.is_empty()
    }
}

/// Contents of `module.toml`.
///
/// ```toml
/// os = ["linux"]
///
/// [[on_events.theme_apply]]
/// action = "file"
/// target = "{{ config_dir }}/kitty/theme.conf"
///
/// [[scripts.reload]]
/// action = "shell"
/// command = "pkill -USR1 kitty"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    /// Whether the module takes part in runs.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub enabled: bool,
    /// Operating systems the module supports.
    #[serde(default = "all_os", skip_serializing_if = "is_all_os")]
    pub os: Vec<Os>,
    /// Lifecycle actions.
    #[serde(default, skip_serializing_if = "OnEvents::is_empty")]
    pub on_events: OnEvents,
    /// Named action lists run on demand.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: BTreeMap<String, Vec<ActionKind>>,
}

impl Default for ModuleManifest {
    fn default() -> Self {
        Self {
            enabled: true,
            os: all_os(),
            on_events: OnEvents::default(),
            scripts: BTreeMap::new(),
        }
    }
}

impl ModuleManifest {
    /// Load `<dir>/module.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is missing or malformed.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        toml_loader::load_required(&dir.join(MANIFEST_FILE))
    }

    /// Write `<dir>/module.toml`, omitting fields left at their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be written.
    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        toml_loader::save_toml(&dir.join(MANIFEST_FILE), self)
    }
}
