// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed configuration tree and a fluent
// builder so each integration test can set up themes, palettes, styles, and
// modules without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ricer::commands::CommandSetup;
use ricer::config::paths::Paths;
use ricer::exec::SystemExecutor;
use ricer::logging::Logger;
use ricer::platform::{Os, Platform};

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, content).expect("write file");
}

/// An isolated configuration tree backed by a [`tempfile::TempDir`].
///
/// The directory is automatically deleted when dropped.
pub struct Sandbox {
    /// Temporary directory holding the whole tree.
    pub root: tempfile::TempDir,
    /// Paths resolved under `root`.
    pub paths: Paths,
}

impl Sandbox {
    /// A command setup over this tree using the real executor.
    pub fn setup(&self) -> CommandSetup {
        CommandSetup::with(
            self.paths.clone(),
            Platform::new(Os::Linux),
            Arc::new(Logger::default()),
            Arc::new(SystemExecutor),
        )
    }

    /// Path of a file generated under the sandboxed `~/.config`.
    pub fn config_file(&self, relative: &str) -> PathBuf {
        self.paths.config_dir.join(relative)
    }

    /// Read a generated file under `~/.config`.
    pub fn read_config(&self, relative: &str) -> String {
        std::fs::read_to_string(self.config_file(relative)).expect("read generated file")
    }
}

/// Fluent builder for [`Sandbox`].
pub struct SandboxBuilder {
    sandbox: Sandbox,
}

impl SandboxBuilder {
    /// Begin building an empty tree.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let paths = Paths::sandboxed(root.path());
        Self {
            sandbox: Sandbox { root, paths },
        }
    }

    /// Write `themes/<name>/theme.toml`.
    pub fn with_theme(self, name: &str, content: &str) -> Self {
        write(
            &self.sandbox.paths.theme_dir(name).join("theme.toml"),
            content,
        );
        self
    }

    /// Write `palettes/<name>.toml`.
    pub fn with_palette(self, name: &str, content: &str) -> Self {
        write(
            &self.sandbox.paths.palettes_dir().join(format!("{name}.toml")),
            content,
        );
        self
    }

    /// Write `styles/<name>.toml`.
    pub fn with_style(self, name: &str, content: &str) -> Self {
        write(
            &self.sandbox.paths.styles_dir().join(format!("{name}.toml")),
            content,
        );
        self
    }

    /// Write `base_style.toml`.
    pub fn with_base_style(self, content: &str) -> Self {
        write(&self.sandbox.paths.base_style_file(), content);
        self
    }

    /// Write `modules/<name>/module.toml`.
    pub fn with_module(self, name: &str, manifest: &str) -> Self {
        write(
            &self.sandbox.paths.module_dir(name).join("module.toml"),
            manifest,
        );
        self
    }

    /// Write `modules/<module>/templates/<name>`.
    pub fn with_template(self, module: &str, name: &str, content: &str) -> Self {
        write(
            &self
                .sandbox
                .paths
                .module_dir(module)
                .join("templates")
                .join(name),
            content,
        );
        self
    }

    /// Finish building and return the tree.
    pub fn build(self) -> Sandbox {
        self.sandbox
    }
}
