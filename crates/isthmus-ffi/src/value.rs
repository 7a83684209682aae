//! Script-side values crossing the native boundary
//!
//! The script environment only has double-precision numbers, so 64-bit
//! integers travel as `BigInt` and addresses as opaque `Pointer` handles.

use crate::ffi::buffer::NativeBuffer;
use crate::ffi::pointer::OpaquePointer;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    /// Arbitrary-precision integer (64-bit results and arguments)
    BigInt(i128),
    /// Typed buffer, shared with native code by reference
    Buffer(NativeBuffer),
    Pointer(OpaquePointer),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::Buffer(_) => "buffer",
            Value::Pointer(_) => "pointer",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<i128> {
        match self {
            Value::BigInt(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&NativeBuffer> {
        match self {
            Value::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<OpaquePointer> {
        match self {
            Value::Pointer(pointer) => Some(*pointer),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Value::BigInt(n)
    }
}

impl From<NativeBuffer> for Value {
    fn from(buffer: NativeBuffer) -> Self {
        Value::Buffer(buffer)
    }
}

impl From<OpaquePointer> for Value {
    fn from(pointer: OpaquePointer) -> Self {
        Value::Pointer(pointer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::BigInt(n) => write!(f, "{}n", n),
            Value::Buffer(buffer) => write!(f, "<buffer len={}>", buffer.len()),
            Value::Pointer(pointer) => write!(f, "<pointer {}>", pointer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::BigInt(1 << 40).to_string(), "1099511627776n");
        assert_eq!(Value::from(OpaquePointer::new(16)).to_string(), "<pointer 0x10>");
        assert_eq!(Value::from(NativeBuffer::new(3)).to_string(), "<buffer len=3>");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(2).as_number(), Some(2.0));
        assert_eq!(Value::from(-5i128).as_bigint(), Some(-5));
        assert!(Value::Null.as_pointer().is_none());
        assert_eq!(Value::Null.type_name(), "null");
    }
}
