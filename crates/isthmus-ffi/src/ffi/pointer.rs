//! Opaque pointers
//!
//! An [`OpaquePointer`] is an address and nothing more: it owns no memory and
//! keeps nothing alive. Reading through it requires a
//! [`MemoryView`](crate::ffi::view::MemoryView).

use crate::ffi::buffer::NativeBuffer;
use crate::ffi::error::RangeError;
use crate::ffi::host::NativeHost;
use crate::ffi::wide::{decode_unsigned, encode_unsigned, WirePair};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct OpaquePointer {
    address: u64,
}

impl OpaquePointer {
    pub const fn null() -> Self {
        Self { address: 0 }
    }

    pub const fn new(address: u64) -> Self {
        Self { address }
    }

    /// Address of a buffer's storage
    ///
    /// Valid only while `buffer` (or a clone of it) is alive.
    pub fn from_buffer(host: &dyn NativeHost, buffer: &NativeBuffer) -> Self {
        Self::from_wire(host.address_of(buffer))
    }

    pub fn from_wire(pair: WirePair) -> Self {
        Self {
            address: pair.to_u64(),
        }
    }

    pub fn to_wire(self) -> WirePair {
        WirePair::from_u64(self.address)
    }

    pub const fn address_value(self) -> u64 {
        self.address
    }

    pub const fn is_null(self) -> bool {
        self.address == 0
    }

    /// `address + offset`, computed wide and checked against `[0, 2^64)`
    pub fn offset(self, offset: i64) -> Result<OpaquePointer, RangeError> {
        let target = i128::from(self.address) + i128::from(offset);
        let pair = encode_unsigned(target)?;
        debug_assert_eq!(decode_unsigned(pair), target);
        Ok(Self::from_wire(pair))
    }
}

impl From<OpaquePointer> for u64 {
    fn from(pointer: OpaquePointer) -> Self {
        pointer.address
    }
}

impl fmt::Display for OpaquePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.address)
    }
}
