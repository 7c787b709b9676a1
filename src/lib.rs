//! Layered theme compositor and module orchestration engine.
//!
//! A theme (wallpaper, modes, palettes, styles) is composed into a single
//! document, which is then handed to user-installed modules that render
//! templates, link files, run commands, and call scripts to restyle the
//! desktop.
//!
//! The public API is organised into layers:
//!
//! - **[`document`]**: the nested document model, deep merge, templating,
//!   and reference resolution
//! - **[`config`]**: paths, themes, palettes, styles, module manifests
//! - **[`actions`]**: the primitive steps a module runs
//! - **[`modules`]**: module loading, lifecycle, and the registry
//! - **[`orchestrator`]**: the staged, locked run over every module
//! - **[`commands`]**: top-level subcommand handlers
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod actions;
pub mod cli;
pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod exec;
pub mod fs;
pub mod lock;
pub mod logging;
pub mod modules;
pub mod orchestrator;
pub mod platform;
