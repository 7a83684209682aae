//! Argument and result marshaling
//!
//! - `MarshalContext::marshal()`: classify one argument against its declared kind
//! - `MarshalContext::unmarshal_result()`: turn a wire result into a script value
//!
//! Pointer slots accept three shapes. A buffer is shared by reference: it is
//! appended to the call's buffer list and the slot records its index. An
//! existing pointer travels as its wire pair. Null travels as null. Numeric
//! slots get a shape check only; range is the caller's contract.

use crate::ffi::buffer::NativeBuffer;
use crate::ffi::error::{BoundaryError, ClassificationError};
use crate::ffi::host::Parameter;
use crate::ffi::pointer::OpaquePointer;
use crate::ffi::types::{NativeType, WireValue};
use crate::ffi::wide::{decode_signed, decode_unsigned};
use crate::value::Value;

/// Per-call marshaling state
///
/// Collects the buffers that will be shared with native code.
///
/// ```
/// # use isthmus_ffi::ffi::marshal::MarshalContext;
/// # use isthmus_ffi::ffi::{NativeBuffer, NativeType, Parameter};
/// # use isthmus_ffi::Value;
/// let mut ctx = MarshalContext::new("fill");
/// let slot = ctx
///     .marshal(0, &Value::Buffer(NativeBuffer::new(8)), NativeType::Pointer)
///     .unwrap();
/// assert_eq!(slot, Parameter::Buffer(0));
/// assert_eq!(ctx.into_buffers().len(), 1);
/// ```
#[derive(Debug)]
pub struct MarshalContext<'a> {
    symbol: &'a str,
    buffers: Vec<NativeBuffer>,
}

impl<'a> MarshalContext<'a> {
    pub fn new(symbol: &'a str) -> Self {
        Self {
            symbol,
            buffers: Vec::new(),
        }
    }

    /// Classify argument `index` against its declared kind
    pub fn marshal(
        &mut self,
        index: usize,
        value: &Value,
        kind: NativeType,
    ) -> Result<Parameter, ClassificationError> {
        match (kind, value) {
            (NativeType::Pointer, Value::Buffer(buffer)) => {
                self.buffers.push(buffer.clone());
                Ok(Parameter::Buffer(self.buffers.len() - 1))
            }
            (NativeType::Pointer, Value::Pointer(pointer)) => Ok(Parameter::Pointer(pointer.to_wire())),
            (NativeType::Pointer, Value::Null) => Ok(Parameter::Null),
            (NativeType::Pointer, other) => Err(self.mismatch(index, "buffer, pointer or null", other)),

            (_, Value::Number(n)) => Ok(Parameter::Number(*n)),
            (_, Value::BigInt(n)) => Ok(Parameter::BigInt(*n)),
            (kind, other) => Err(self.mismatch(index, kind.display_name(), other)),
        }
    }

    /// Buffers collected so far, in slot-index order
    pub fn into_buffers(self) -> Vec<NativeBuffer> {
        self.buffers
    }

    fn mismatch(&self, index: usize, expected: &'static str, got: &Value) -> ClassificationError {
        ClassificationError {
            symbol: self.symbol.to_string(),
            index,
            expected,
            got: got.type_name(),
        }
    }
}

/// Convert a native result according to its declared kind
///
/// 64-bit integers are decoded without loss into `BigInt`; a pointer result
/// becomes a fresh opaque pointer. A result whose shape does not fit the
/// declared kind is reported as a boundary failure.
pub fn unmarshal_result(wire: WireValue, kind: NativeType) -> Result<Value, BoundaryError> {
    let value = match (kind, wire) {
        (NativeType::Void, WireValue::Void) => Value::Null,
        (NativeType::Pointer, WireValue::Wide(pair)) => {
            Value::Pointer(OpaquePointer::from_wire(pair))
        }
        (NativeType::U64, WireValue::Wide(pair)) => Value::BigInt(decode_unsigned(pair)),
        (NativeType::I64, WireValue::Wide(pair)) => Value::BigInt(decode_signed(pair)),
        (NativeType::F32 | NativeType::F64, WireValue::Float(n)) => Value::Number(n),
        (
            NativeType::I8
            | NativeType::U8
            | NativeType::I16
            | NativeType::U16
            | NativeType::I32
            | NativeType::U32,
            WireValue::Integer(n),
        ) => Value::Number(n as f64),
        (kind, wire) => {
            return Err(BoundaryError::UnexpectedResult {
                expected: kind.display_name().to_string(),
                got: wire.kind_name().to_string(),
            })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::wide::WirePair;
    use rstest::rstest;

    #[test]
    fn test_buffers_get_sequential_indices() {
        let mut ctx = MarshalContext::new("copy");
        let a = NativeBuffer::new(4);
        let b = NativeBuffer::new(4);
        assert_eq!(
            ctx.marshal(0, &Value::Buffer(a.clone()), NativeType::Pointer),
            Ok(Parameter::Buffer(0))
        );
        assert_eq!(
            ctx.marshal(1, &Value::Null, NativeType::Pointer),
            Ok(Parameter::Null)
        );
        assert_eq!(
            ctx.marshal(2, &Value::Buffer(b.clone()), NativeType::Pointer),
            Ok(Parameter::Buffer(1))
        );
        let buffers = ctx.into_buffers();
        assert!(buffers[0].same_storage(&a));
        assert!(buffers[1].same_storage(&b));
    }

    #[test]
    fn test_pointer_argument_travels_as_wire_pair() {
        let mut ctx = MarshalContext::new("free");
        let pointer = OpaquePointer::new(0x1_0000_0010);
        assert_eq!(
            ctx.marshal(0, &Value::Pointer(pointer), NativeType::Pointer),
            Ok(Parameter::Pointer(WirePair::new(1, 0x10)))
        );
        assert!(ctx.into_buffers().is_empty());
    }

    #[rstest]
    #[case(Value::Number(1.0))]
    #[case(Value::BigInt(1))]
    fn test_number_in_pointer_slot_rejected(#[case] value: Value) {
        let mut ctx = MarshalContext::new("free");
        let err = ctx.marshal(3, &value, NativeType::Pointer).unwrap_err();
        assert_eq!(err.index, 3);
        assert_eq!(err.symbol, "free");
        assert_eq!(err.got, value.type_name());
    }

    #[rstest]
    #[case(Value::Null)]
    #[case(Value::Pointer(OpaquePointer::new(8)))]
    #[case(Value::Buffer(NativeBuffer::new(1)))]
    fn test_non_number_in_numeric_slot_rejected(#[case] value: Value) {
        let mut ctx = MarshalContext::new("abs");
        let err = ctx.marshal(0, &value, NativeType::I32).unwrap_err();
        assert_eq!(err.expected, "i32");
    }

    #[test]
    fn test_numeric_slots_are_not_range_checked() {
        let mut ctx = MarshalContext::new("abs");
        assert_eq!(
            ctx.marshal(0, &Value::Number(1e12), NativeType::U8),
            Ok(Parameter::Number(1e12))
        );
        assert_eq!(
            ctx.marshal(0, &Value::BigInt(-1), NativeType::U64),
            Ok(Parameter::BigInt(-1))
        );
    }

    #[rstest]
    #[case(NativeType::Void, WireValue::Void, Value::Null)]
    #[case(NativeType::I32, WireValue::Integer(-7), Value::Number(-7.0))]
    #[case(NativeType::F64, WireValue::Float(2.5), Value::Number(2.5))]
    #[case(
        NativeType::U64,
        WireValue::Wide(WirePair::new(0xFFFF_FFFF, 0xFFFF_FFFF)),
        Value::BigInt(u64::MAX as i128)
    )]
    #[case(
        NativeType::I64,
        WireValue::Wide(WirePair::new(0xFFFF_FFFF, 0xFFFF_FFFF)),
        Value::BigInt(-1)
    )]
    #[case(
        NativeType::Pointer,
        WireValue::Wide(WirePair::new(0, 0x40)),
        Value::Pointer(OpaquePointer::new(0x40))
    )]
    fn test_unmarshal_result(#[case] kind: NativeType, #[case] wire: WireValue, #[case] expected: Value) {
        assert_eq!(unmarshal_result(wire, kind), Ok(expected));
    }

    #[test]
    fn test_unmarshal_shape_mismatch() {
        assert!(matches!(
            unmarshal_result(WireValue::Integer(1), NativeType::Pointer),
            Err(BoundaryError::UnexpectedResult { .. })
        ));
        assert!(matches!(
            unmarshal_result(WireValue::Float(1.0), NativeType::Void),
            Err(BoundaryError::UnexpectedResult { .. })
        ));
    }
}
