//! Subcommand handlers.
pub mod apply;
pub mod generate;
pub mod list;
pub mod module;
pub mod theme;
pub mod version;

use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::Library;
use crate::config::paths::Paths;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Log, Logger, init_subscriber};
use crate::modules::{Context, ModuleRegistry};
use crate::platform::Platform;

/// Shared state produced by the common command setup sequence.
///
/// Encapsulates platform detection and path resolution so that each command
/// does not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Logger backing `ctx.log`, also used for per-module buffers.
    pub logger: Arc<Logger>,
    /// Services handed to modules and actions.
    pub ctx: Context,
}

impl CommandSetup {
    /// Detect the platform, resolve every path, and start logging to
    /// `<cache_dir>/<command>.log`.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be found.
    pub fn init(global: &GlobalOpts, verbose: bool, command: &str) -> Result<Self> {
        let platform = Platform::detect();
        let paths = Paths::detect(platform.os, global.config_dir.as_deref())
            .context("resolving configuration paths")?;
        let log_file = paths.log_file(command);
        init_subscriber(verbose, Some(&log_file), command);
        let logger = Arc::new(Logger::new(Some(log_file)));
        logger.debug(&format!("config dir: {}", paths.root.display()));
        Ok(Self::with(paths, platform, logger, Arc::new(SystemExecutor)))
    }

    /// Build a setup from explicit parts.
    #[must_use]
    pub fn with(
        paths: Paths,
        platform: Platform,
        logger: Arc<Logger>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let ctx = Context::new(
            Arc::new(paths),
            Arc::new(platform),
            Arc::clone(&logger) as Arc<dyn Log>,
            executor,
        );
        Self { logger, ctx }
    }

    /// Load the theme library.
    ///
    /// # Errors
    ///
    /// Returns an error if the base style or the selection file is malformed.
    pub fn library(&self) -> Result<Library> {
        Library::load(&self.ctx.paths, self.ctx.log.as_ref()).context("loading theme library")
    }

    /// Load every module.
    #[must_use]
    pub fn registry(&self) -> ModuleRegistry {
        ModuleRegistry::load(&self.ctx)
    }
}

/// Print the summary and bail if any module recorded a failure.
///
/// # Errors
///
/// Returns an error if one or more modules failed.
pub fn finish(log: &Logger) -> Result<()> {
    log.print_summary();
    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} module(s) failed");
    }
    Ok(())
}
