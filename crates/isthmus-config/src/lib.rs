//! Isthmus Configuration System
//!
//! Provides configuration for the Isthmus FFI bridge:
//! - Project configuration (isthmus.toml): library search paths, the
//!   non-blocking worker pool, and declared library signature tables
//! - Global user configuration (~/.isthmus/config.toml): logging and
//!   default search paths
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.isthmus/config.toml)
//! 2. Project config (./isthmus.toml)
//! 3. Environment variables (ISTHMUS_*)
//!
//! # Example
//!
//! ```no_run
//! use isthmus_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! for library in config.libraries() {
//!     println!("{} -> {}", library.name, library.path);
//! }
//! ```

pub mod global;
pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Type names accepted in `[library.symbols.*]` tables
pub const NATIVE_TYPE_NAMES: &[&str] = &[
    "i8", "u8", "i16", "u16", "i32", "u32", "i64", "u64", "f32", "f64", "pointer", "void",
];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::{GlobalConfig, LoggingConfig};
pub use loader::{Config, ConfigLoader};
pub use project::{FfiConfig, LibraryConfig, ProjectConfig, SymbolConfig};

/// Check that a type name is one the bridge can marshal
pub(crate) fn is_native_type_name(name: &str) -> bool {
    NATIVE_TYPE_NAMES.contains(&name)
}
