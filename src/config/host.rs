use std::fmt;
use std::path::{Path, PathBuf};

/// Host platform identifier as it appears in package file names,
/// e.g. `Preferences (linux).sublime-settings`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Osx,
    Windows,
    Other(String),
}

impl Platform {
    pub fn current() -> Self {
        Self::from_id(std::env::consts::OS)
    }

    pub fn from_id(id: &str) -> Self {
        match id.to_ascii_lowercase().as_str() {
            "linux" => Platform::Linux,
            "osx" | "macos" => Platform::Osx,
            "windows" => Platform::Windows,
            other => Platform::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Platform::Linux => "linux",
            Platform::Osx => "osx",
            Platform::Windows => "windows",
            Platform::Other(id) => id,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where packages live and which platform files apply
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Root directory scanned for packages
    pub packages_path: PathBuf,
    /// The user scope, holding the user's own preferences
    pub user_path: PathBuf,
    pub platform: Platform,
}

impl HostConfig {
    pub fn new(packages_path: impl Into<PathBuf>, user_path: impl Into<PathBuf>) -> Self {
        Self {
            packages_path: packages_path.into(),
            user_path: user_path.into(),
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Get the config directory path
    /// Uses ~/.config/plume/ on all platforms for consistency
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("plume"))
    }

    /// The packages path for a scope: `"user"` is the user directory,
    /// anything else the shared packages root
    pub fn packages_path_for(&self, scope: &str) -> &PathBuf {
        if scope.eq_ignore_ascii_case("user") {
            &self.user_path
        } else {
            &self.packages_path
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        let base = Self::config_dir().unwrap_or_else(|| PathBuf::from(".plume"));
        Self::new(base.join("Packages"), base.join("User"))
    }
}

/// Packages and plugins are keyed by absolute path. A path that cannot be
/// made absolute is kept as given.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
