//! Error taxonomy for the native boundary
//!
//! - [`RangeError`]: a 64-bit split was requested outside its range
//! - [`ClassificationError`]: an argument does not fit its declared kind
//! - [`BoundaryError`]: the native host itself failed
//!
//! The per-operation enums ([`LoadError`], [`CallError`], [`ReadError`]) wrap
//! these so `?` composes. Nothing here is retried.

use crate::ffi::host::ResourceId;
use std::fmt;
use thiserror::Error;

/// Which 64-bit range an encode was checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WideRange {
    /// `[0, 2^64)`
    Unsigned,
    /// `[-2^63, 2^63)`
    Signed,
}

impl fmt::Display for WideRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WideRange::Unsigned => f.write_str("[0, 2^64)"),
            WideRange::Signed => f.write_str("[-2^63, 2^63)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value {value} is outside the 64-bit range {range}")]
pub struct RangeError {
    pub value: i128,
    pub range: WideRange,
}

/// An argument whose shape does not match its declared parameter kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("argument {index} of '{symbol}': expected {expected}, got {got}")]
pub struct ClassificationError {
    pub symbol: String,
    pub index: usize,
    pub expected: &'static str,
    pub got: &'static str,
}

/// Failures reported by the native host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    #[error("failed to load library '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("symbol '{symbol}' not found in library '{library}'")]
    SymbolNotFound { library: String, symbol: String },

    #[error("no open library with resource id {0}")]
    UnknownResource(ResourceId),

    #[error("read from null address")]
    NullAddress,

    #[error("native host returned {got} where {expected} was expected")]
    UnexpectedResult { expected: String, got: String },

    #[error("native call to '{symbol}' failed: {reason}")]
    CallFailed { symbol: String, reason: String },

    #[error("worker runtime unavailable: {0}")]
    Runtime(String),

    #[error("unsupported by native host: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    #[error("invalid signature for '{symbol}': {reason}")]
    InvalidSignature { symbol: String, reason: String },

    #[error("invalid signature table: {0}")]
    InvalidTable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("'{symbol}' expects {expected} arguments, got {got}")]
    Arity {
        symbol: String,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    #[error("'{symbol}' called after library '{library}' was closed")]
    LibraryClosed { library: String, symbol: String },

    #[error("no symbol named '{0}'")]
    UnknownSymbol(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),
}

/// Crate-level error for callers that mix operations
#[derive(Debug, Error)]
pub enum FfiError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    #[error("library '{0}' is already closed")]
    AlreadyClosed(String),

    #[error("library '{0}' is not declared in the configuration")]
    UndeclaredLibrary(String),

    #[error(transparent)]
    Config(#[from] isthmus_config::ConfigError),
}

pub type FfiResult<T> = Result<T, FfiError>;
