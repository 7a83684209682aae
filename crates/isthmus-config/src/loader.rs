//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::{validate_log_format, validate_log_level, GlobalConfig, LoggingConfig};
use crate::project::{FfiConfig, LibraryConfig, ProjectConfig};
use crate::ConfigResult;
use std::env;
use std::path::{Path, PathBuf};

/// Project file name searched for when walking up from a directory
pub const PROJECT_FILE: &str = "isthmus.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.isthmus/config.toml) - lowest priority
/// 2. Project config (./isthmus.toml) - overrides global
/// 3. Environment variables (ISTHMUS_*) - overrides both
pub struct ConfigLoader {
    /// Global config path; resolved from the home directory when unset
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where isthmus.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config file instead of ~/.isthmus/config.toml
    pub fn with_global_config_path(path: PathBuf) -> Self {
        Self {
            global_config_path: Some(path),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find isthmus.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;
        let global_config = self.load_global_config().unwrap_or_default();

        let (project_config, global_config) =
            self.apply_env_overrides(project_config, global_config)?;

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global_config = self.load_global_config().unwrap_or_default();
        let (project_config, global_config) =
            self.apply_env_overrides(project_config, global_config)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config); the default config when no file exists
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.isthmus/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        // Global config is optional - if it doesn't exist, return default
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides
    ///
    /// - ISTHMUS_LOG_LEVEL / ISTHMUS_LOG_FORMAT replace the global logging settings
    /// - ISTHMUS_LIBRARY_PATH (platform path list) is prepended to the project search paths
    fn apply_env_overrides(
        &self,
        mut project: ProjectConfig,
        mut global: GlobalConfig,
    ) -> ConfigResult<(ProjectConfig, GlobalConfig)> {
        if let Ok(level) = env::var("ISTHMUS_LOG_LEVEL") {
            validate_log_level("ISTHMUS_LOG_LEVEL", &level)?;
            global
                .logging
                .get_or_insert_with(LoggingConfig::default)
                .level = Some(level);
        }

        if let Ok(format) = env::var("ISTHMUS_LOG_FORMAT") {
            validate_log_format("ISTHMUS_LOG_FORMAT", &format)?;
            global
                .logging
                .get_or_insert_with(LoggingConfig::default)
                .format = Some(format);
        }

        if let Some(paths) = env::var_os("ISTHMUS_LIBRARY_PATH") {
            let ffi = project.ffi.get_or_insert_with(FfiConfig::default);
            let mut merged: Vec<PathBuf> = env::split_paths(&paths).collect();
            merged.append(&mut ffi.search_paths);
            ffi.search_paths = merged;
        }

        Ok((project, global))
    }

    /// Get the global configuration directory (~/.isthmus)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(crate::ConfigError::HomeNotFound)?;
        Ok(home.join(".isthmus"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Effective log level (env > global > none)
    pub fn log_level(&self) -> Option<&str> {
        self.global.log_level()
    }

    /// Effective log format (env > global > none)
    pub fn log_format(&self) -> Option<&str> {
        self.global.log_format()
    }

    /// Library search paths: project paths first (resolved against the
    /// project root), then global defaults
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let project = self.project.search_paths().iter().map(|p| match &self.project_root {
            Some(root) if p.is_relative() => root.join(p),
            _ => p.clone(),
        });
        project
            .chain(self.global.search_paths().iter().cloned())
            .collect()
    }

    /// Worker bound for non-blocking calls
    pub fn blocking_threads(&self) -> Option<usize> {
        self.project.blocking_threads()
    }

    /// Declared libraries
    pub fn libraries(&self) -> &[LibraryConfig] {
        &self.project.libraries
    }

    /// Look up a declared library by name
    pub fn library(&self, name: &str) -> Option<&LibraryConfig> {
        self.project.library(name)
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has isthmus.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(PROJECT_FILE);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn loader_without_global(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::with_global_config_path(dir.path().join("missing-global.toml"))
    }

    #[test]
    #[serial]
    fn test_load_project_config() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[[library]]
name = "demo"
path = "demo"
"#,
        );

        let mut loader = loader_without_global(&temp_dir);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        assert!(config.is_project());
        assert_eq!(config.libraries().len(), 1);
        assert!(config.library("demo").is_some());
    }

    #[test]
    #[serial]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[ffi]
search_paths = ["lib"]
"#,
        );

        let sub_dir = temp_dir.path().join("subdir");
        fs::create_dir(&sub_dir).unwrap();

        let mut loader = loader_without_global(&temp_dir);
        let config = loader.load_from_directory(&sub_dir).unwrap();

        assert_eq!(config.project_root(), Some(temp_dir.path()));
        assert_eq!(config.search_paths(), vec![temp_dir.path().join("lib")]);
    }

    #[test]
    #[serial]
    fn test_no_project_config() {
        let temp_dir = TempDir::new().unwrap();

        let mut loader = loader_without_global(&temp_dir);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        assert!(!config.is_project());
        assert!(config.libraries().is_empty());
    }

    #[test]
    #[serial]
    fn test_global_search_paths_follow_project_paths() {
        let temp_dir = TempDir::new().unwrap();
        let global_path = temp_dir.path().join("global.toml");
        fs::write(
            &global_path,
            r#"
[logging]
level = "debug"

[ffi]
search_paths = ["/opt/global/lib"]
"#,
        )
        .unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[ffi]
search_paths = ["/opt/project/lib"]
"#,
        );

        let mut loader = ConfigLoader::with_global_config_path(global_path);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        assert_eq!(config.log_level(), Some("debug"));
        assert_eq!(
            config.search_paths(),
            vec![
                PathBuf::from("/opt/project/lib"),
                PathBuf::from("/opt/global/lib")
            ]
        );
    }

    #[test]
    #[serial]
    fn test_env_override_log_level() {
        let temp_dir = TempDir::new().unwrap();
        env::set_var("ISTHMUS_LOG_LEVEL", "trace");

        let mut loader = loader_without_global(&temp_dir);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();
        env::remove_var("ISTHMUS_LOG_LEVEL");

        assert_eq!(config.log_level(), Some("trace"));
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_log_level() {
        let temp_dir = TempDir::new().unwrap();
        env::set_var("ISTHMUS_LOG_LEVEL", "shout");

        let mut loader = loader_without_global(&temp_dir);
        let result = loader.load_from_directory(temp_dir.path());
        env::remove_var("ISTHMUS_LOG_LEVEL");

        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_env_library_path_prepended() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[ffi]
search_paths = ["/opt/project/lib"]
"#,
        );
        let joined = env::join_paths(["/env/a", "/env/b"]).unwrap();
        env::set_var("ISTHMUS_LIBRARY_PATH", &joined);

        let mut loader = loader_without_global(&temp_dir);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();
        env::remove_var("ISTHMUS_LIBRARY_PATH");

        assert_eq!(
            config.search_paths(),
            vec![
                PathBuf::from("/env/a"),
                PathBuf::from("/env/b"),
                PathBuf::from("/opt/project/lib")
            ]
        );
    }

    #[test]
    #[serial]
    fn test_load_from_specific_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config_file(
            temp_dir.path(),
            r#"
[ffi]
blocking_threads = 2
"#,
        );

        let mut loader = loader_without_global(&temp_dir);
        let config = loader.load_from_file(&config_path).unwrap();

        assert_eq!(config.blocking_threads(), Some(2));
        assert_eq!(config.project_root(), Some(temp_dir.path()));
    }
}
