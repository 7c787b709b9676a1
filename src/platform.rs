//! Operating system detection for module compatibility checks.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Linux and other Unix-likes without a dedicated variant.
    Linux,
    /// Microsoft Windows.
    Windows,
    /// macOS.
    Mac,
}

impl Os {
    /// Every supported operating system, in declaration order.
    pub const ALL: [Self; 3] = [Self::Linux, Self::Windows, Self::Mac];
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
            Self::Mac => write!(f, "mac"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, Copy)]
pub struct Platform {
    /// Operating system the process is running on.
    pub os: Os,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub const fn detect() -> Self {
        Self {
            os: Self::detect_os(),
        }
    }

    /// Create a platform with an explicit OS.
    #[must_use]
    pub const fn new(os: Os) -> Self {
        Self { os }
    }

    /// Whether the platform is Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Whether a module declaring `compat` may run on this platform.
    #[must_use]
    pub fn supports(&self, compat: &[Os]) -> bool {
        compat.contains(&self.os)
    }

    const fn detect_os() -> Os {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::Mac
        } else {
            // Default to Linux for other Unix-like systems
            Os::Linux
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_new_linux() {
        let p = Platform::new(Os::Linux);
        assert!(!p.is_windows());
        assert_eq!(p.os, Os::Linux);
    }

    #[test]
    fn supports_checks_membership() {
        let p = Platform::new(Os::Mac);
        assert!(p.supports(&Os::ALL));
        assert!(!p.supports(&[Os::Linux, Os::Windows]));
        assert!(!p.supports(&[]));
    }

    #[test]
    fn os_display() {
        assert_eq!(Os::Linux.to_string(), "linux");
        assert_eq!(Os::Windows.to_string(), "windows");
        assert_eq!(Os::Mac.to_string(), "mac");
    }

    #[test]
    fn os_deserializes_lowercase() {
        let os: Vec<Os> = serde_json::from_str(r#"["linux","mac"]"#).unwrap_or_default();
        assert_eq!(os, vec![Os::Linux, Os::Mac]);
    }
}
