//! Project Configuration (isthmus.toml)
//!
//! Handles project-level configuration stored in `isthmus.toml` at the project root.
//! Besides search paths it carries declared signature tables, one per library:
//!
//! ```toml
//! [[library]]
//! name = "sqlite"
//! path = "sqlite3"
//!
//! [library.symbols.sqlite3_libversion_number]
//! parameters = []
//! result = "i32"
//!
//! [library.symbols.sqlite3_open]
//! parameters = ["pointer", "pointer"]
//! result = "i32"
//! nonblocking = true
//! ```

use crate::{is_native_type_name, ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Project configuration from isthmus.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// FFI settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffi: Option<FfiConfig>,

    /// Declared libraries
    #[serde(default, rename = "library")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<LibraryConfig>,
}

/// FFI settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct FfiConfig {
    /// Directories searched for shared libraries (relative to the project root)
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_paths: Vec<PathBuf>,

    /// Upper bound on worker threads serving non-blocking calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_threads: Option<usize>,
}

/// One native library and its declared symbols
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Name used to look the library up from code
    pub name: String,

    /// File path, `file://` URL, or short name ("m" -> libm.so)
    pub path: String,

    /// Symbol signatures keyed by symbol name
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolConfig>,
}

/// Declared signature of one symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SymbolConfig {
    /// Parameter type names in order
    #[serde(default)]
    pub parameters: Vec<String>,

    /// Result type name
    #[serde(default = "default_result")]
    pub result: String,

    /// Dispatch on the worker pool instead of the calling thread
    #[serde(default)]
    pub nonblocking: bool,
}

fn default_result() -> String {
    "void".to_string()
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(ffi) = &self.ffi {
            if ffi.blocking_threads == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "ffi.blocking_threads".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for (index, library) in self.libraries.iter().enumerate() {
            if library.name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("library[{}].name", index),
                    reason: "name cannot be empty".to_string(),
                });
            }
            if !seen.insert(library.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("library[{}].name", index),
                    reason: format!("duplicate library '{}'", library.name),
                });
            }
            if library.path.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("library.{}.path", library.name),
                    reason: "path cannot be empty".to_string(),
                });
            }
            for (symbol, signature) in &library.symbols {
                signature.validate(&format!("library.{}.symbols.{}", library.name, symbol))?;
            }
        }

        Ok(())
    }

    /// Look up a declared library by name
    pub fn library(&self, name: &str) -> Option<&LibraryConfig> {
        self.libraries.iter().find(|l| l.name == name)
    }

    /// Configured search paths (as written)
    pub fn search_paths(&self) -> &[PathBuf] {
        self.ffi
            .as_ref()
            .map(|f| f.search_paths.as_slice())
            .unwrap_or(&[])
    }

    /// Configured worker bound for non-blocking calls
    pub fn blocking_threads(&self) -> Option<usize> {
        self.ffi.as_ref().and_then(|f| f.blocking_threads)
    }
}

impl SymbolConfig {
    fn validate(&self, field: &str) -> ConfigResult<()> {
        for (index, parameter) in self.parameters.iter().enumerate() {
            if parameter == "void" || !is_native_type_name(parameter) {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.parameters[{}]", field, index),
                    reason: format!("'{}' is not a parameter type", parameter),
                });
            }
        }
        if !is_native_type_name(&self.result) {
            return Err(ConfigError::InvalidValue {
                field: format!("{}.result", field),
                reason: format!("'{}' is not a result type", self.result),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_library_table() {
        let toml = r#"
[ffi]
search_paths = ["native/lib"]
blocking_threads = 4

[[library]]
name = "demo"
path = "./libdemo.so"

[library.symbols.add]
parameters = ["i32", "i32"]
result = "i32"

[library.symbols.fill]
parameters = ["pointer", "u64"]
nonblocking = true
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.blocking_threads(), Some(4));

        let demo = config.library("demo").unwrap();
        assert_eq!(demo.symbols.len(), 2);
        let fill = &demo.symbols["fill"];
        assert_eq!(fill.result, "void");
        assert!(fill.nonblocking);
        assert!(!demo.symbols["add"].nonblocking);
    }

    #[test]
    fn test_void_parameter_rejected() {
        let toml = r#"
[[library]]
name = "demo"
path = "demo"

[library.symbols.bad]
parameters = ["void"]
"#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "library.demo.symbols.bad.parameters[0]"
        ));
    }

    #[test]
    fn test_unknown_result_type_rejected() {
        let toml = r#"
[[library]]
name = "demo"
path = "demo"

[library.symbols.bad]
result = "i128"
"#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_library_rejected() {
        let toml = r#"
[[library]]
name = "demo"
path = "a"

[[library]]
name = "demo"
path = "b"
"#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_blocking_threads_rejected() {
        let config = ProjectConfig {
            ffi: Some(FfiConfig {
                search_paths: vec![],
                blocking_threads: Some(0),
            }),
            libraries: vec![],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_project_is_valid() {
        let config: ProjectConfig = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert!(config.search_paths().is_empty());
        assert_eq!(config.blocking_threads(), None);
    }
}
