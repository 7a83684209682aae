//! Global subscriber installation
//!
//! Lives in its own test binary: the subscriber is process-wide and this file
//! sets `RUST_LOG` before installing it.

use isthmus_ffi::{init_logging, LogOptions};
use tracing::level_filters::LevelFilter;
use tracing::Level;

#[test]
fn rust_log_takes_precedence_over_configured_level() {
    std::env::set_var("RUST_LOG", "trace");
    assert_eq!(LogOptions::DEFAULT.level.to_string(), "warn");

    assert!(init_logging(&LogOptions::DEFAULT));
    assert_eq!(LevelFilter::current(), LevelFilter::TRACE);
    assert!(tracing::enabled!(Level::TRACE));
    assert!(!init_logging(&LogOptions::DEFAULT));
}
