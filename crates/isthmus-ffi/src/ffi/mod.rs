//! Native boundary
//!
//! Lets script-level code load shared libraries, call their symbols, and read
//! raw process memory, while the script side only has double-precision
//! numbers:
//! - 64-bit integers and addresses cross the boundary as `(high, low)` wire pairs
//! - typed buffers are shared with native code by reference, never copied
//! - addresses are opaque [`OpaquePointer`] handles read through a [`MemoryView`]
//!
//! # Safety
//!
//! Declared signatures are trusted. A wrong signature, or a read through a
//! dangling pointer, is undefined behavior in the native code; this layer
//! cannot detect it. All `unsafe` is confined to [`host::dylib`].

pub mod buffer;
pub mod caller;
pub mod error;
pub mod host;
pub mod loader;
pub mod marshal;
pub mod pointer;
pub mod resolver;
pub mod types;
pub mod view;
pub mod wide;

pub use buffer::NativeBuffer;
pub use caller::{CallOutcome, PendingValue, SymbolBinding};
pub use error::{
    BoundaryError, CallError, ClassificationError, FfiError, FfiResult, LoadError, RangeError,
    ReadError, WideRange,
};
pub use host::{
    CallRequest, DylibHost, LoadRequest, NativeHost, Parameter, PendingCall, ResourceId,
};
pub use loader::LibraryHandle;
pub use marshal::MarshalContext;
pub use pointer::OpaquePointer;
pub use resolver::LibraryResolver;
pub use types::{NativeType, SignatureTable, SymbolSignature, WireValue};
pub use view::MemoryView;
pub use wide::{decode_signed, decode_unsigned, encode_signed, encode_unsigned, WirePair};
