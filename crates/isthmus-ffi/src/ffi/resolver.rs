//! Library path resolution
//!
//! Turns the name a caller gives into the path handed to the native host,
//! following platform naming conventions and the configured search paths.

use isthmus_config::Config;
use std::path::{Path, PathBuf};

/// Resolves library names against search paths
///
/// Names that resolve to nothing are passed through unchanged, so the
/// system loader can still apply its own search rules.
#[derive(Debug, Clone)]
pub struct LibraryResolver {
    search_paths: Vec<PathBuf>,
}

impl LibraryResolver {
    /// Resolver with the platform's default search paths
    pub fn new() -> Self {
        Self {
            search_paths: Self::default_search_paths(),
        }
    }

    /// Resolver with only the given search paths
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Configured search paths first, then the platform defaults
    pub fn from_config(config: &Config) -> Self {
        let mut search_paths = config.search_paths();
        search_paths.extend(Self::default_search_paths());
        Self { search_paths }
    }

    /// Platform-specific default library search paths, current directory first
    pub fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }

        #[cfg(target_os = "linux")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/lib"));
            if cfg!(target_pointer_width = "64") {
                paths.push(PathBuf::from("/usr/lib64"));
                paths.push(PathBuf::from("/lib64"));
            }
        }

        #[cfg(target_os = "macos")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/opt/homebrew/lib"));
        }

        #[cfg(target_os = "windows")]
        {
            if let Ok(system_root) = std::env::var("SystemRoot") {
                paths.push(PathBuf::from(system_root).join("System32"));
            } else {
                paths.push(PathBuf::from("C:\\Windows\\System32"));
            }
        }

        paths
    }

    /// Prepend a search path
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.insert(0, path.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Path to hand to the native host for `name`
    ///
    /// - `file://` prefixes are stripped
    /// - absolute paths that exist are used as-is
    /// - short names are tried as `lib{name}.{ext}` and `{name}.{ext}`
    /// - anything else comes back unchanged
    pub fn resolve(&self, name: &str) -> String {
        let name = name.strip_prefix("file://").unwrap_or(name);

        let path = Path::new(name);
        if path.is_absolute() {
            return name.to_string();
        }

        self.search(name)
            .map(|found| found.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string())
    }

    fn search(&self, name: &str) -> Option<PathBuf> {
        let extensions: &[&str] = if cfg!(target_os = "windows") {
            &["dll"]
        } else if cfg!(target_os = "macos") {
            &["dylib", "so"]
        } else {
            &["so"]
        };
        let prefixes: &[&str] = if cfg!(target_os = "windows") {
            &["", "lib"]
        } else {
            &["lib", ""]
        };

        for dir in &self.search_paths {
            let exact = dir.join(name);
            if exact.is_file() {
                return Some(exact);
            }
            for prefix in prefixes {
                for ext in extensions {
                    let candidate = dir.join(format!("{}{}.{}", prefix, name, ext));
                    if candidate.is_file() {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }
}

impl Default for LibraryResolver {
    fn default() -> Self {
        Self::new()
    }
}
