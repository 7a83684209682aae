//! Tracing setup for embedders
//!
//! The bridge emits `tracing` events (`debug` per load and call, `trace` per
//! memory read, `warn` when a handle is dropped open). Nothing is printed
//! until the embedder installs a subscriber, either its own or the one built
//! by [`init_logging`].

use isthmus_config::Config;
use std::env;
use std::fmt;
use tracing_subscriber::EnvFilter;

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.to_ascii_lowercase().as_str() {
            "compact" | "text" | "plain" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    pub format: LogFormat,
    pub level: LogLevel,
}

impl LogOptions {
    pub const DEFAULT: Self = Self {
        format: LogFormat::Compact,
        level: LogLevel::Warn,
    };

    /// Defaults overridden by `ISTHMUS_LOG_FORMAT` / `ISTHMUS_LOG_LEVEL`
    #[must_use]
    pub fn from_env() -> Self {
        let format = env::var("ISTHMUS_LOG_FORMAT").ok();
        let level = env::var("ISTHMUS_LOG_LEVEL").ok();
        Self::DEFAULT.with_specs(format.as_deref(), level.as_deref())
    }

    /// Options from loaded configuration (which already carries env overrides)
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::DEFAULT.with_specs(config.log_format(), config.log_level())
    }

    /// Apply textual overrides; unparseable ones are ignored
    #[must_use]
    pub fn with_specs(mut self, format: Option<&str>, level: Option<&str>) -> Self {
        if let Some(format) = format.and_then(LogFormat::parse) {
            self.format = format;
        }
        if let Some(level) = level.and_then(LogLevel::parse) {
            self.level = level;
        }
        self
    }
}

impl Default for LogOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Install a global stderr subscriber
///
/// `RUST_LOG` takes precedence over `options.level` when set. Only the first
/// call in a process has any effect; returns whether this call installed it.
pub fn init_logging(options: &LogOptions) -> bool {
    use std::sync::OnceLock;
    use tracing_subscriber::fmt;

    static INITIALISED: OnceLock<bool> = OnceLock::new();

    let mut installed_now = false;
    INITIALISED.get_or_init(|| {
        let directives = env::var(EnvFilter::DEFAULT_ENV).ok();
        let builder = fmt::fmt()
            .with_env_filter(build_filter(directives.as_deref(), options.level))
            .with_writer(std::io::stderr)
            .with_target(true);

        let installed = match options.format {
            LogFormat::Json => {
                tracing::subscriber::set_global_default(builder.json().finish()).is_ok()
            }
            LogFormat::Compact => {
                tracing::subscriber::set_global_default(builder.compact().finish()).is_ok()
            }
        };
        installed_now = installed;
        installed
    });
    installed_now
}

/// `directives` (a `RUST_LOG` value) when they parse, otherwise `level`
fn build_filter(directives: Option<&str>, level: LogLevel) -> EnvFilter {
    directives
        .filter(|spec| !spec.trim().is_empty())
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new(level.to_string()))
}
