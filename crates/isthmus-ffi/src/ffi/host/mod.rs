//! The native host boundary
//!
//! Everything that actually touches native code (opening a module, resolving
//! symbols, executing a call, reading raw memory) happens behind
//! [`NativeHost`]. The binding layer only builds requests and interprets
//! results. [`DylibHost`] is the in-process implementation.

pub mod dylib;

pub use dylib::DylibHost;

use crate::ffi::buffer::NativeBuffer;
use crate::ffi::error::BoundaryError;
use crate::ffi::types::{NativeType, SignatureTable, WireValue};
use crate::ffi::wide::WirePair;
use futures_util::future::BoxFuture;
use std::fmt;

/// Identifier of one loaded native module, issued by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rid:{}", self.0)
    }
}

/// `{path, symbolSignatures}`
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub path: String,
    pub symbols: SignatureTable,
}

/// One marshaled parameter slot
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// Plain number for a non-pointer slot, passed through unchanged
    Number(f64),
    /// Wide integer for a non-pointer slot, passed through unchanged
    BigInt(i128),
    /// Index into [`CallRequest::buffers`]
    Buffer(usize),
    /// Address of an existing pointer
    Pointer(WirePair),
    Null,
}

/// `{resourceId, symbolName, parameters, buffers}`
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub resource: ResourceId,
    pub symbol: String,
    pub parameters: Vec<Parameter>,
    /// Buffers shared with native code for the duration of the call
    pub buffers: Vec<NativeBuffer>,
}

/// Result of a non-blocking call, resolved once the native call returns
pub type PendingCall = BoxFuture<'static, Result<WireValue, BoundaryError>>;

/// Primitive operations the bridge delegates to
///
/// Implementations report their own failures as [`BoundaryError`]; the bridge
/// propagates them verbatim and never retries.
pub trait NativeHost: Send + Sync {
    /// Open a module and resolve every declared symbol
    fn load(&self, request: &LoadRequest) -> Result<ResourceId, BoundaryError>;

    /// Execute a call on the calling thread
    fn call(&self, request: CallRequest) -> Result<WireValue, BoundaryError>;

    /// Start a call without blocking; the returned future resolves to its result
    fn call_nonblocking(&self, request: CallRequest) -> PendingCall;

    /// Address of a buffer's backing storage
    fn address_of(&self, buffer: &NativeBuffer) -> WirePair;

    /// Read one fixed-width value; 64-bit kinds and pointers come back as wire pairs
    fn read_scalar(&self, kind: NativeType, address: WirePair)
        -> Result<WireValue, BoundaryError>;

    /// Bytes from `address` up to, not including, the first zero byte
    fn read_cstring(&self, address: WirePair) -> Result<Vec<u8>, BoundaryError>;

    /// Copy `destination.len()` bytes starting at `address` into `destination`
    fn copy_into(&self, address: WirePair, destination: &NativeBuffer)
        -> Result<(), BoundaryError>;

    /// Release a module opened by [`NativeHost::load`]
    fn release(&self, resource: ResourceId) -> Result<(), BoundaryError>;
}
