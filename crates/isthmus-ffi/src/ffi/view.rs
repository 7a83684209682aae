//! Typed reads through an opaque pointer
//!
//! A [`MemoryView`] does no validation of its own. Each accessor computes the
//! effective address wide, encodes it, and issues exactly one request to the
//! host; whatever the host reports comes back verbatim.

use crate::ffi::buffer::NativeBuffer;
use crate::ffi::error::{BoundaryError, ReadError};
use crate::ffi::host::NativeHost;
use crate::ffi::pointer::OpaquePointer;
use crate::ffi::types::{NativeType, WireValue};
use crate::ffi::wide::{decode_signed, decode_unsigned, encode_unsigned, WirePair};
use tracing::trace;

/// Typed accessor bound to one address
///
/// ```
/// # use isthmus_ffi::ffi::{MemoryView, OpaquePointer, DylibHost, NativeBuffer};
/// let host = DylibHost::new();
/// let buffer = NativeBuffer::from(vec![72, 105, 0]);
/// let view = MemoryView::new(&host, OpaquePointer::from_buffer(&host, &buffer));
/// assert_eq!(view.read_cstring(0).unwrap(), b"Hi".to_vec());
/// ```
#[derive(Clone, Copy)]
pub struct MemoryView<'h> {
    host: &'h dyn NativeHost,
    pointer: OpaquePointer,
}

impl<'h> MemoryView<'h> {
    pub fn new(host: &'h dyn NativeHost, pointer: OpaquePointer) -> Self {
        Self { host, pointer }
    }

    pub fn pointer(&self) -> OpaquePointer {
        self.pointer
    }

    /// `pointer + offset` as a wire pair
    fn address(&self, offset: i64) -> Result<WirePair, ReadError> {
        let target = i128::from(self.pointer.address_value()) + i128::from(offset);
        Ok(encode_unsigned(target)?)
    }

    fn read_wire(&self, kind: NativeType, offset: i64) -> Result<WireValue, ReadError> {
        let address = self.address(offset)?;
        trace!(%address, kind = kind.display_name(), "memory read");
        Ok(self.host.read_scalar(kind, address)?)
    }

    fn read_integer<T: TryFrom<i64>>(&self, kind: NativeType, offset: i64) -> Result<T, ReadError> {
        match self.read_wire(kind, offset)? {
            WireValue::Integer(n) => T::try_from(n).map_err(|_| {
                unexpected(kind, format!("out-of-range integer {}", n)).into()
            }),
            other => Err(unexpected(kind, other.kind_name().to_string()).into()),
        }
    }

    fn read_wide(&self, kind: NativeType, offset: i64) -> Result<WirePair, ReadError> {
        match self.read_wire(kind, offset)? {
            WireValue::Wide(pair) => Ok(pair),
            other => Err(unexpected(kind, other.kind_name().to_string()).into()),
        }
    }

    fn read_float(&self, kind: NativeType, offset: i64) -> Result<f64, ReadError> {
        match self.read_wire(kind, offset)? {
            WireValue::Float(n) => Ok(n),
            other => Err(unexpected(kind, other.kind_name().to_string()).into()),
        }
    }

    pub fn read_u8(&self, offset: i64) -> Result<u8, ReadError> {
        self.read_integer(NativeType::U8, offset)
    }

    pub fn read_i8(&self, offset: i64) -> Result<i8, ReadError> {
        self.read_integer(NativeType::I8, offset)
    }

    pub fn read_u16(&self, offset: i64) -> Result<u16, ReadError> {
        self.read_integer(NativeType::U16, offset)
    }

    pub fn read_i16(&self, offset: i64) -> Result<i16, ReadError> {
        self.read_integer(NativeType::I16, offset)
    }

    pub fn read_u32(&self, offset: i64) -> Result<u32, ReadError> {
        self.read_integer(NativeType::U32, offset)
    }

    pub fn read_i32(&self, offset: i64) -> Result<i32, ReadError> {
        self.read_integer(NativeType::I32, offset)
    }

    /// Unsigned 64-bit read, decoded without loss
    pub fn read_u64(&self, offset: i64) -> Result<i128, ReadError> {
        self.read_wide(NativeType::U64, offset).map(decode_unsigned)
    }

    /// Signed 64-bit read, decoded without loss
    pub fn read_i64(&self, offset: i64) -> Result<i128, ReadError> {
        self.read_wide(NativeType::I64, offset).map(decode_signed)
    }

    pub fn read_f32(&self, offset: i64) -> Result<f32, ReadError> {
        self.read_float(NativeType::F32, offset).map(|n| n as f32)
    }

    pub fn read_f64(&self, offset: i64) -> Result<f64, ReadError> {
        self.read_float(NativeType::F64, offset)
    }

    /// Pointer stored at `offset`
    pub fn read_pointer(&self, offset: i64) -> Result<OpaquePointer, ReadError> {
        self.read_wide(NativeType::Pointer, offset)
            .map(OpaquePointer::from_wire)
    }

    /// Bytes up to, not including, the first zero byte
    ///
    /// The scan is unbounded; the memory must hold a terminated string.
    pub fn read_cstring(&self, offset: i64) -> Result<Vec<u8>, ReadError> {
        let address = self.address(offset)?;
        trace!(%address, "cstring read");
        Ok(self.host.read_cstring(address)?)
    }

    /// Copy `byte_length` bytes into a fresh buffer
    pub fn read_buffer(&self, byte_length: usize, offset: i64) -> Result<NativeBuffer, ReadError> {
        let buffer = NativeBuffer::new(byte_length);
        self.copy_into(&buffer, offset)?;
        Ok(buffer)
    }

    /// Fill `destination` from `pointer + offset`; its length sets the copy length
    pub fn copy_into(&self, destination: &NativeBuffer, offset: i64) -> Result<(), ReadError> {
        let address = self.address(offset)?;
        trace!(%address, len = destination.len(), "bulk copy");
        Ok(self.host.copy_into(address, destination)?)
    }
}

impl std::fmt::Debug for MemoryView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryView")
            .field("pointer", &self.pointer)
            .finish_non_exhaustive()
    }
}

fn unexpected(kind: NativeType, got: String) -> BoundaryError {
    BoundaryError::UnexpectedResult {
        expected: kind.display_name().to_string(),
        got,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::error::RangeError;
    use crate::ffi::host::{CallRequest, LoadRequest, PendingCall, ResourceId};
    use std::sync::Mutex;

    /// Answers every read with a fixed value and records the address
    struct FixedHost {
        answer: WireValue,
        addresses: Mutex<Vec<WirePair>>,
    }

    impl FixedHost {
        fn new(answer: WireValue) -> Self {
            Self {
                answer,
                addresses: Mutex::new(Vec::new()),
            }
        }
    }

    impl NativeHost for FixedHost {
        fn load(&self, _: &LoadRequest) -> Result<ResourceId, BoundaryError> {
            Err(BoundaryError::Unsupported("load".into()))
        }
        fn call(&self, _: CallRequest) -> Result<WireValue, BoundaryError> {
            Err(BoundaryError::Unsupported("call".into()))
        }
        fn call_nonblocking(&self, _: CallRequest) -> PendingCall {
            Box::pin(async { Err::<WireValue, _>(BoundaryError::Unsupported("call".into())) })
        }
        fn address_of(&self, _: &NativeBuffer) -> WirePair {
            WirePair::new(0, 0)
        }
        fn read_scalar(&self, _: NativeType, address: WirePair) -> Result<WireValue, BoundaryError> {
            self.addresses.lock().unwrap().push(address);
            Ok(self.answer)
        }
        fn read_cstring(&self, _: WirePair) -> Result<Vec<u8>, BoundaryError> {
            Err(BoundaryError::NullAddress)
        }
        fn copy_into(&self, _: WirePair, _: &NativeBuffer) -> Result<(), BoundaryError> {
            Ok(())
        }
        fn release(&self, _: ResourceId) -> Result<(), BoundaryError> {
            Ok(())
        }
    }

    #[test]
    fn test_offset_crosses_32_bit_boundary() {
        let host = FixedHost::new(WireValue::Integer(7));
        let view = MemoryView::new(&host, OpaquePointer::new(u32::MAX as u64));
        assert_eq!(view.read_u8(2).unwrap(), 7);
        assert_eq!(host.addresses.lock().unwrap()[0], WirePair::new(1, 1));
    }

    #[test]
    fn test_negative_offset_below_zero_is_range_error() {
        let host = FixedHost::new(WireValue::Integer(0));
        let view = MemoryView::new(&host, OpaquePointer::new(4));
        assert!(matches!(view.read_i32(-8), Err(ReadError::Range(RangeError { .. }))));
        assert!(host.addresses.lock().unwrap().is_empty());
    }

    #[test]
    fn test_wrong_shape_is_unexpected_result() {
        let host = FixedHost::new(WireValue::Float(1.5));
        let view = MemoryView::new(&host, OpaquePointer::new(0x1000));
        assert!(matches!(
            view.read_u32(0),
            Err(ReadError::Boundary(BoundaryError::UnexpectedResult { .. }))
        ));
        assert_eq!(view.read_f32(0).unwrap(), 1.5);
    }

    #[test]
    fn test_integer_outside_width_is_unexpected_result() {
        let host = FixedHost::new(WireValue::Integer(300));
        let view = MemoryView::new(&host, OpaquePointer::new(0x1000));
        assert!(view.read_u8(0).is_err());
        assert_eq!(view.read_u16(0).unwrap(), 300);
    }

    #[test]
    fn test_wide_reads_decode_both_ways() {
        let host = FixedHost::new(WireValue::Wide(WirePair::new(0xFFFF_FFFF, 0xFFFF_FFFE)));
        let view = MemoryView::new(&host, OpaquePointer::new(0x1000));
        assert_eq!(view.read_u64(0).unwrap(), (1i128 << 64) - 2);
        assert_eq!(view.read_i64(0).unwrap(), -2);
        assert_eq!(
            view.read_pointer(0).unwrap().address_value(),
            0xFFFF_FFFF_FFFF_FFFE
        );
    }

    #[test]
    fn test_host_failure_is_verbatim() {
        let host = FixedHost::new(WireValue::Void);
        let view = MemoryView::new(&host, OpaquePointer::new(0x1000));
        assert_eq!(
            view.read_cstring(0),
            Err(ReadError::Boundary(BoundaryError::NullAddress))
        );
    }
}
