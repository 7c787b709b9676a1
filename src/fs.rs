//! File-system helpers shared by actions and module management.
use anyhow::{Context as _, Result};
use std::path::Path;

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Write `content` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if a directory cannot be created or the file written.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    std::fs::write(path, content).with_context(|| format!("write {}", path.display()))
}

/// Whether anything, including a broken symlink, exists at `path`.
#[must_use]
pub fn entry_exists(path: &Path) -> bool {
    path.exists() || path.symlink_metadata().is_ok()
}

/// Recursively copy a directory tree, skipping `.git` when `skip_git` is set.
///
/// Symlinks within the source tree are followed: their content is copied,
/// not the link itself.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created, a source
/// entry cannot be read, or a file cannot be copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path, skip_git: bool) -> Result<()> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("creating directory {}", dst.display()))?;
    for entry in
        std::fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?
    {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            if skip_git && entry.file_name() == ".git" {
                continue;
            }
            copy_dir_recursive(&src_path, &dst_path, skip_git)?;
        } else {
            std::fs::copy(&src_path, &dst_path).with_context(|| {
                format!("copying {} to {}", src_path.display(), dst_path.display())
            })?;
        }
    }
    Ok(())
}

/// Create a symlink at `link` pointing to `target`.
///
/// # Errors
///
/// Returns an error if the link cannot be created.
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!(
                "creating symlink {} -> {}",
                link.display(),
                target.display()
            )
        })
    }

    #[cfg(windows)]
    {
        let result = if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        };
        result.with_context(|| {
            format!(
                "creating symlink {} -> {} (requires developer mode or admin)",
                link.display(),
                target.display()
            )
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn write_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("c.conf");
        write_file(&path, "x = 1").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 1");
    }

    #[test]
    fn copies_files_and_subdirectories() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        std::fs::write(src.path().join("module.toml"), b"enabled = true").unwrap();
        std::fs::create_dir(src.path().join("templates")).unwrap();
        std::fs::write(src.path().join("templates/kitty.conf.j2"), b"bg").unwrap();

        let target = dst.path().join("out");
        copy_dir_recursive(src.path(), &target, false).unwrap();

        assert_eq!(std::fs::read(target.join("module.toml")).unwrap(), b"enabled = true");
        assert_eq!(std::fs::read(target.join("templates/kitty.conf.j2")).unwrap(), b"bg");
    }

    #[test]
    fn skips_git_directory_when_flag_set() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        std::fs::write(src.path().join("module.toml"), b"").unwrap();
        std::fs::create_dir(src.path().join(".git")).unwrap();
        std::fs::write(src.path().join(".git/HEAD"), b"ref: refs/heads/main").unwrap();

        let target = dst.path().join("out");
        copy_dir_recursive(src.path(), &target, true).unwrap();

        assert!(target.join("module.toml").exists());
        assert!(!target.join(".git").exists());
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlink_still_exists() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("dangling");
        create_symlink(&dir.path().join("missing"), &link).unwrap();
        assert!(!link.exists());
        assert!(entry_exists(&link));
    }
}
