//! Discovery and management of the modules under `modules/`.
use std::collections::BTreeMap;
use std::path::Path;

use super::{Context, Module, ModuleState, ModuleStates};
use crate::actions::ActionResult;
use crate::config::manifest::MANIFEST_FILE;
use crate::config::toml_loader::subdirectories;
use crate::document::Mapping;
use crate::error::ModuleError;

/// Every loaded module, keyed and ordered by name.
///
/// Name order is registration order: stages that run sequentially visit
/// modules in this order.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Module>,
}

impl ModuleRegistry {
    /// Load every directory under `modules/` that has a `module.toml`.
    ///
    /// A module that fails to load is logged and left out. A module whose
    /// manifest excludes this OS is kept, disabled, with a warning.
    #[must_use]
    pub fn load(ctx: &Context) -> Self {
        let mut modules = BTreeMap::new();
        for dir in subdirectories(&ctx.paths.modules_dir()) {
            if !dir.join(MANIFEST_FILE).is_file() {
                continue;
            }
            match Module::load(&dir, &ctx.platform) {
                Ok(module) => {
                    if module.manifest.enabled && module.incompatible_with(ctx.platform.os) {
                        ctx.log.warn(&format!(
                            "module \"{}\" does not support {}, disabling",
                            module.name, ctx.platform.os
                        ));
                    }
                    ctx.log.debug(&format!("module \"{}\" loaded", module.name));
                    modules.insert(module.name.clone(), module);
                }
                Err(e) => {
                    let name = dir.file_name().unwrap_or_default().to_string_lossy();
                    ctx.log.error(&format!("error loading module \"{name}\": {e}"));
                }
            }
        }
        ctx.log.debug(&format!("{} modules loaded", modules.len()));
        Self { modules }
    }

    /// Build a registry from already loaded modules.
    #[must_use]
    pub fn from_modules(modules: impl IntoIterator<Item = Module>) -> Self {
        Self {
            modules: modules.into_iter().map(|m| (m.name.clone(), m)).collect(),
        }
    }

    /// Look up a module.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::NotFound`] if no module has this name.
    pub fn get(&self, name: &str) -> Result<&Module, ModuleError> {
        self.modules
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Module, ModuleError> {
        self.modules
            .get_mut(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))
    }

    /// Whether a module with this name is loaded.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Modules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Number of loaded modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no module is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Log every module with its status.
    pub fn list(&self, ctx: &Context) {
        for module in self.iter() {
            let status = if module.enabled { "enabled" } else { "disabled" };
            ctx.log.info(&format!("{} ({status})", module.name));
        }
    }

    /// Enable or disable a module and persist the change to its manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the module is unknown or its manifest cannot be
    /// written.
    pub fn set_enabled(&mut self, ctx: &Context, name: &str, enabled: bool) -> Result<(), ModuleError> {
        let status = if enabled { "enabled" } else { "disabled" };
        let module = self.get_mut(name)?;
        if module.manifest.enabled == enabled {
            ctx.log.info(&format!("module \"{name}\" is already {status}"));
            return Ok(());
        }
        module.set_enabled(enabled, ctx.platform.os);
        module
            .manifest
            .save(&module.dir)
            .map_err(|source| ModuleError::Manifest {
                module: name.to_string(),
                source,
            })?;
        ctx.log.info(&format!("module \"{name}\" {status}"));
        Ok(())
    }

    /// Rewrite the manifests of modules whose name contains `name_includes`
    /// (every module when `None`), dropping defaulted fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a manifest cannot be written.
    pub fn rewrite(&self, ctx: &Context, name_includes: Option<&str>) -> Result<usize, ModuleError> {
        let mut count = 0;
        for module in self.iter() {
            if name_includes.is_some_and(|filter| !module.name.contains(filter)) {
                continue;
            }
            module
                .manifest
                .save(&module.dir)
                .map_err(|source| ModuleError::Manifest {
                    module: module.name.clone(),
                    source,
                })?;
            ctx.log.info(&format!("module \"{}\" rewritten", module.name));
            count += 1;
        }
        Ok(count)
    }

    /// Delete a module's directory and forget it.
    ///
    /// # Errors
    ///
    /// Returns an error if the module is unknown, its directory is not
    /// inside the modules directory, or it cannot be removed.
    pub fn delete(&mut self, ctx: &Context, name: &str) -> Result<(), ModuleError> {
        let dir = self.get(name)?.dir.clone();
        let modules_dir = ctx.paths.modules_dir();
        if dir.parent() != Some(modules_dir.as_path()) {
            return Err(ModuleError::OutsideModulesDir(dir));
        }
        std::fs::remove_dir_all(&dir).map_err(|source| ModuleError::Manifest {
            module: name.to_string(),
            source: crate::error::ConfigError::Io {
                path: dir.clone(),
                source,
            },
        })?;
        self.modules.remove(name);
        ctx.log.info(&format!("module \"{name}\" deleted"));
        Ok(())
    }

    /// Copy the module folder at `source` into `modules/`, load it, and run
    /// its install actions. Returns the new module's name.
    ///
    /// # Errors
    ///
    /// Returns an error if `source` has no manifest, a module with that name
    /// exists, the copy or load fails, or an install action fails.
    pub fn install(&mut self, ctx: &Context, source: &Path) -> Result<String, ModuleError> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ModuleError::NotFound(source.display().to_string()))?;
        if !source.join(MANIFEST_FILE).is_file() {
            return Err(ModuleError::NotFound(source.display().to_string()));
        }
        let dest = ctx.paths.module_dir(&name);
        if self.contains(&name) || dest.exists() {
            return Err(ModuleError::AlreadyPresent(name));
        }

        let io_error = |e: anyhow::Error| ModuleError::Manifest {
            module: name.clone(),
            source: crate::error::ConfigError::InvalidContent {
                path: dest.clone(),
                message: format!("{e:#}"),
            },
        };
        crate::fs::copy_dir_recursive(source, &dest, true).map_err(io_error)?;
        ctx.log.info(&format!("module \"{name}\" cloned"));

        let module = Module::load(&dest, &ctx.platform).map_err(|source| ModuleError::Manifest {
            module: name.clone(),
            source,
        })?;
        let res = module.execute_install(ctx);
        self.modules.insert(name.clone(), module);
        if res.failed() {
            return Err(ModuleError::InstallFailed(name));
        }
        ctx.log.info(&format!("module \"{name}\" installed"));
        Ok(name)
    }

    /// Run a module's install actions again.
    ///
    /// # Errors
    ///
    /// Returns an error if the module is unknown or an action fails.
    pub fn init(&self, ctx: &Context, name: &str) -> Result<(), ModuleError> {
        if self.get(name)?.execute_install(ctx).failed() {
            return Err(ModuleError::InstallFailed(name.to_string()));
        }
        Ok(())
    }

    /// Run a module's script against `document`.
    ///
    /// # Errors
    ///
    /// Returns an error if the module or script is unknown.
    pub fn run_script(
        &self,
        ctx: &Context,
        name: &str,
        script: &str,
        args: &[String],
        document: &Mapping,
    ) -> Result<ActionResult, ModuleError> {
        self.get(name)?.execute_script(ctx, script, args, document)
    }

    /// Initial run states: `Skipped` unless the module is enabled, allowed
    /// by `include` (when given), not in `exclude`, and has apply actions.
    #[must_use]
    pub fn eligibility(&self, include: &[String], exclude: &[String]) -> ModuleStates {
        self.iter()
            .map(|module| {
                let state = if module.skip_reason(include, exclude).is_some() {
                    ModuleState::Skipped
                } else {
                    ModuleState::Pending
                };
                (module.name.clone(), state)
            })
            .collect()
    }
}
