//! Domain-specific error types for the ricer engine.
//!
//! Internal modules return typed errors (e.g., [`ConfigError`],
//! [`ComposeError`]) while command handlers at the CLI boundary convert them
//! to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! RicerError
//! ├── Config(ConfigError)       : unreadable or malformed files, unknown names
//! ├── Compose(ComposeError)     : layer composition and reference resolution
//! ├── Module(ModuleError)       : module lookup, scripts, management
//! └── Orchestrate(OrchestrateError) : lock, eligibility, "no modules to run"
//! ```
//!
//! Errors raised by a single action never appear here: they are captured in
//! the action's [`ActionResult`](crate::actions::ActionResult).

use std::path::PathBuf;

use thiserror::Error;

use crate::document::resolve::ResolveError;

/// Top-level error type for the ricer engine.
#[derive(Error, Debug)]
pub enum RicerError {
    /// Configuration-related error (parsing, lookup, I/O).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Document composition or resolution error.
    #[error("Composition error: {0}")]
    Compose(#[from] ComposeError),

    /// Module management error.
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// Orchestration run error.
    #[error("Orchestration error: {0}")]
    Orchestrate(#[from] OrchestrateError),
}

/// Errors that arise from loading and saving configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading or writing a config file.
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path to the file that could not be accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file contains a syntax error that prevents parsing.
    #[error("Invalid TOML in {path}: {message}")]
    InvalidSyntax {
        /// Path to the offending file.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },

    /// The file parsed but its content does not have the expected shape.
    #[error("Invalid content in {path}: {message}")]
    InvalidContent {
        /// Path to the offending file.
        path: PathBuf,
        /// Human-readable description of the problem.
        message: String,
    },

    /// The home directory could not be determined.
    #[error("cannot determine home directory: {0}")]
    NoHome(String),
}

/// Errors that arise while composing the theme document.
#[derive(Error, Debug)]
pub enum ComposeError {
    /// The requested theme does not exist.
    #[error("theme \"{0}\" not found")]
    UnknownTheme(String),

    /// No theme was requested and none is currently selected.
    #[error("no current theme")]
    NoCurrentTheme,

    /// The theme defines no modes at all.
    #[error("theme \"{0}\" has no modes")]
    NoModes(String),

    /// A global style referenced by name does not exist.
    #[error("global style \"{name}\" not found in {known:?}")]
    UnknownStyle {
        /// Name that was looked up.
        name: String,
        /// Names of every known global style.
        known: Vec<String>,
    },

    /// A global palette referenced by name does not exist.
    #[error("palette \"{name}\" not found in {known:?}")]
    UnknownPalette {
        /// Name that was looked up.
        name: String,
        /// Names of every known global palette.
        known: Vec<String>,
    },

    /// Template references could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Errors that arise from module lookup and management.
#[derive(Error, Debug)]
pub enum ModuleError {
    /// No module with this name is registered.
    #[error("module \"{0}\" not found")]
    NotFound(String),

    /// A module with this name is already registered.
    #[error("module \"{0}\" already present")]
    AlreadyPresent(String),

    /// The requested script is not defined by the module.
    #[error("script \"{script}\" not found in [{known}]")]
    UnknownScript {
        /// Requested script name.
        script: String,
        /// Comma-separated names of the module's scripts.
        known: String,
    },

    /// The module's manifest could not be loaded or saved.
    #[error("module \"{module}\": {source}")]
    Manifest {
        /// Module name.
        module: String,
        /// Underlying configuration error.
        source: ConfigError,
    },

    /// A path outside the modules directory was about to be touched.
    #[error("\"{0}\" is not inside the modules directory")]
    OutsideModulesDir(PathBuf),

    /// The module's install actions failed.
    #[error("module \"{0}\" install actions failed")]
    InstallFailed(String),
}

/// Errors that abort an orchestration run before any action executes.
#[derive(Error, Debug)]
pub enum OrchestrateError {
    /// Another live process holds the run lock.
    #[error("another instance is applying a theme (pid {0})")]
    Locked(u32),

    /// The lock file could not be read or written.
    #[error("lock file {path}: {source}")]
    LockIo {
        /// Path to the lock file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The lock file exists but does not name a process yet.
    #[error("lock file {0} is being taken by another process")]
    LockBusy(PathBuf),

    /// An include/exclude list named an unknown module.
    #[error(transparent)]
    UnknownModule(#[from] ModuleError),

    /// No eligible module has any apply-stage action.
    #[error("no modules to run")]
    NothingToRun,
}
