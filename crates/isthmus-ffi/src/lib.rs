//! Isthmus - a native call bridge for double-precision script hosts
//!
//! This library lets a host whose only numeric type is `f64` load shared
//! libraries, call their symbols, and read raw memory without losing 64-bit
//! precision:
//! - `ffi`: pointers, memory views, symbol bindings, library handles
//! - `value`: the script-side value model
//! - `logging`: tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use isthmus_ffi::ffi::{DylibHost, LibraryHandle, NativeType, SignatureTable, SymbolSignature};
//! use isthmus_ffi::Value;
//! use std::sync::Arc;
//!
//! let mut symbols = SignatureTable::new();
//! symbols.insert("abs".into(), SymbolSignature::new(vec![NativeType::I32], NativeType::I32));
//!
//! let libc = LibraryHandle::load(Arc::new(DylibHost::new()), "libc.so.6", symbols)?;
//! assert_eq!(libc.call("abs", &[Value::Number(-3.0)])?, Value::Number(3.0));
//! libc.close()?;
//! # Ok::<(), isthmus_ffi::ffi::FfiError>(())
//! ```

/// Isthmus version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod async_runtime;
pub mod ffi;
pub mod logging;
pub mod value;

pub use ffi::{
    CallOutcome, FfiError, FfiResult, LibraryHandle, MemoryView, NativeBuffer, NativeHost,
    OpaquePointer, SymbolBinding,
};
pub use logging::{init_logging, LogFormat, LogLevel, LogOptions};
pub use value::Value;
