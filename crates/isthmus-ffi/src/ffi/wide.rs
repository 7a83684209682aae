//! 64-bit values on a 32-bit wire
//!
//! The script side holds numbers as `f64`, which is exact only up to 2^53.
//! Every 64-bit pointer or integer therefore crosses the boundary as a
//! [`WirePair`] of two `u32` halves and is reassembled in `i128`, which holds
//! both the unsigned and the signed 64-bit range without loss.

use crate::ffi::error::{RangeError, WideRange};
use serde::{Deserialize, Serialize};
use std::fmt;

const LOW_MASK: i128 = 0xFFFF_FFFF;
const TWO_POW_63: i128 = 1 << 63;
const TWO_POW_64: i128 = 1 << 64;

/// A 64-bit value split into `(high, low)` halves
///
/// `value = (high << 32) | low` under the unsigned interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WirePair {
    pub high: u32,
    pub low: u32,
}

impl WirePair {
    pub const fn new(high: u32, low: u32) -> Self {
        Self { high, low }
    }

    /// Split a native-width value; cannot fail
    pub const fn from_u64(value: u64) -> Self {
        Self {
            high: (value >> 32) as u32,
            low: value as u32,
        }
    }

    /// Join the halves back into a native-width value
    pub const fn to_u64(self) -> u64 {
        ((self.high as u64) << 32) | self.low as u64
    }
}

impl From<u64> for WirePair {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<WirePair> for u64 {
    fn from(pair: WirePair) -> Self {
        pair.to_u64()
    }
}

impl fmt::Display for WirePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x}]", self.high, self.low)
    }
}

/// Encode a value in `[0, 2^64)` as a wire pair
///
/// # Examples
///
/// ```
/// # use isthmus_ffi::ffi::wide::{encode_unsigned, WirePair};
/// assert_eq!(encode_unsigned(0x1_0000_0001).unwrap(), WirePair::new(1, 1));
/// assert!(encode_unsigned(-1).is_err());
/// ```
pub fn encode_unsigned(value: i128) -> Result<WirePair, RangeError> {
    if !(0..TWO_POW_64).contains(&value) {
        return Err(RangeError {
            value,
            range: WideRange::Unsigned,
        });
    }
    Ok(WirePair {
        high: (value >> 32) as u32,
        low: (value & LOW_MASK) as u32,
    })
}

/// Encode a value in `[-2^63, 2^63)` as the wire pair of its two's complement
pub fn encode_signed(value: i128) -> Result<WirePair, RangeError> {
    if !(-TWO_POW_63..TWO_POW_63).contains(&value) {
        return Err(RangeError {
            value,
            range: WideRange::Signed,
        });
    }
    let unsigned = if value < 0 { value + TWO_POW_64 } else { value };
    encode_unsigned(unsigned)
}

/// `(high << 32) | low`
pub fn decode_unsigned(pair: WirePair) -> i128 {
    (i128::from(pair.high) << 32) | i128::from(pair.low)
}

/// Unsigned decode, then reinterpret bit 63 as the sign
pub fn decode_signed(pair: WirePair) -> i128 {
    let value = decode_unsigned(pair);
    if value >= TWO_POW_63 {
        value - TWO_POW_64
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_splits_halves() {
        assert_eq!(encode_unsigned(0x1_0000_0001), Ok(WirePair::new(1, 1)));
        assert_eq!(encode_unsigned(0), Ok(WirePair::new(0, 0)));
        assert_eq!(
            encode_unsigned(u64::MAX as i128),
            Ok(WirePair::new(u32::MAX, u32::MAX))
        );
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert!(encode_unsigned(-1).is_err());
        assert!(encode_unsigned(TWO_POW_64).is_err());
        assert!(encode_signed(TWO_POW_63).is_err());
        assert!(encode_signed(-TWO_POW_63 - 1).is_err());
    }

    #[test]
    fn test_decode_signed_negative() {
        assert_eq!(decode_signed(WirePair::new(u32::MAX, u32::MAX)), -1);
        assert_eq!(decode_signed(WirePair::new(0x8000_0000, 0)), -TWO_POW_63);
        assert_eq!(decode_signed(WirePair::new(0x7FFF_FFFF, u32::MAX)), TWO_POW_63 - 1);
    }

    #[test]
    fn test_values_above_f64_precision_survive() {
        let value = (1i128 << 53) + 1;
        let pair = encode_unsigned(value).unwrap();
        assert_eq!(decode_unsigned(pair), value);
        assert_ne!((value as f64) as i128, value);
    }

    #[test]
    fn test_native_width_conversions_agree_with_codec() {
        let value = 0xDEAD_BEEF_0000_0042u64;
        let pair = WirePair::from(value);
        assert_eq!(Ok(pair), encode_unsigned(value as i128));
        assert_eq!(u64::from(pair), value);
    }

    proptest! {
        #[test]
        fn prop_unsigned_round_trip(value in any::<u64>()) {
            let value = value as i128;
            prop_assert_eq!(decode_unsigned(encode_unsigned(value).unwrap()), value);
        }

        #[test]
        fn prop_signed_round_trip(value in any::<i64>()) {
            let value = value as i128;
            prop_assert_eq!(decode_signed(encode_signed(value).unwrap()), value);
        }

        #[test]
        fn prop_pair_round_trip(high in any::<u32>(), low in any::<u32>()) {
            let pair = WirePair::new(high, low);
            prop_assert_eq!(encode_unsigned(decode_unsigned(pair)), Ok(pair));
        }
    }
}
