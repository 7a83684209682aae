//! FFI type system - declared native kinds and wire values
//!
//! Defines:
//! - `NativeType`: the kind of one parameter or result slot
//! - `SymbolSignature`: parameter kinds, result kind, dispatch mode
//! - `WireValue`: what the native host hands back across the boundary
//!
//! Type mapping on the script side:
//! - i8..i32 / u8..u32 / f32 / f64 → `Value::Number`
//! - i64 / u64 → `Value::BigInt` (split into a wire pair in transit)
//! - pointer → `Value::Pointer`, `Value::Buffer`, or `Value::Null`
//! - void → `Value::Null` (result only)

use crate::ffi::error::LoadError;
use crate::ffi::wide::WirePair;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of one parameter or result slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Pointer,
    /// Result only
    Void,
}

impl NativeType {
    /// Every kind, in the order of `isthmus_config::NATIVE_TYPE_NAMES`
    pub const ALL: [NativeType; 12] = [
        NativeType::I8,
        NativeType::U8,
        NativeType::I16,
        NativeType::U16,
        NativeType::I32,
        NativeType::U32,
        NativeType::I64,
        NativeType::U64,
        NativeType::F32,
        NativeType::F64,
        NativeType::Pointer,
        NativeType::Void,
    ];

    /// Parse a lowercase type name as written in signature tables
    ///
    /// # Examples
    ///
    /// ```
    /// # use isthmus_ffi::ffi::NativeType;
    /// assert_eq!(NativeType::parse("u64"), Some(NativeType::U64));
    /// assert_eq!(NativeType::parse("usize"), None);
    /// ```
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.display_name() == name)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            NativeType::I8 => "i8",
            NativeType::U8 => "u8",
            NativeType::I16 => "i16",
            NativeType::U16 => "u16",
            NativeType::I32 => "i32",
            NativeType::U32 => "u32",
            NativeType::I64 => "i64",
            NativeType::U64 => "u64",
            NativeType::F32 => "f32",
            NativeType::F64 => "f64",
            NativeType::Pointer => "pointer",
            NativeType::Void => "void",
        }
    }

    /// Size in bytes of the native representation
    pub fn size(&self) -> usize {
        match self {
            NativeType::I8 | NativeType::U8 => 1,
            NativeType::I16 | NativeType::U16 => 2,
            NativeType::I32 | NativeType::U32 | NativeType::F32 => 4,
            NativeType::I64 | NativeType::U64 | NativeType::F64 | NativeType::Pointer => 8,
            NativeType::Void => 0,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, NativeType::Pointer)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, NativeType::F32 | NativeType::F64)
    }

    /// Travels as a wire pair rather than a plain number
    pub fn is_wide(&self) -> bool {
        matches!(self, NativeType::I64 | NativeType::U64 | NativeType::Pointer)
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Declared signature of one native entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SymbolSignature {
    #[serde(default)]
    pub parameters: Vec<NativeType>,
    #[serde(default = "void_result")]
    pub result: NativeType,
    /// Dispatch on the worker pool and return a pending result
    #[serde(default)]
    pub nonblocking: bool,
}

fn void_result() -> NativeType {
    NativeType::Void
}

impl SymbolSignature {
    pub fn new(parameters: Vec<NativeType>, result: NativeType) -> Self {
        Self {
            parameters,
            result,
            nonblocking: false,
        }
    }

    /// Same signature, dispatched without blocking the caller
    pub fn nonblocking(mut self) -> Self {
        self.nonblocking = true;
        self
    }

    /// Reject `void` parameters
    pub fn validate(&self, symbol: &str) -> Result<(), LoadError> {
        if let Some(index) = self
            .parameters
            .iter()
            .position(|t| matches!(t, NativeType::Void))
        {
            return Err(LoadError::InvalidSignature {
                symbol: symbol.to_string(),
                reason: format!("parameter {} is declared void", index),
            });
        }
        Ok(())
    }

    /// Dispatch key such as `(i32,pointer)->u64`
    pub fn signature_key(&self) -> String {
        let params: Vec<&str> = self.parameters.iter().map(|t| t.display_name()).collect();
        format!("({})->{}", params.join(","), self.result)
    }
}

impl fmt::Display for SymbolSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature_key())?;
        if self.nonblocking {
            f.write_str(" nonblocking")?;
        }
        Ok(())
    }
}

/// Symbol name → signature, in a stable order
pub type SignatureTable = BTreeMap<String, SymbolSignature>;

/// Parse a JSON signature table
///
/// ```
/// # use isthmus_ffi::ffi::types::{parse_signature_table, NativeType};
/// let table = parse_signature_table(r#"{
///     "strlen": { "parameters": ["pointer"], "result": "u64" }
/// }"#).unwrap();
/// assert_eq!(table["strlen"].result, NativeType::U64);
/// ```
pub fn parse_signature_table(json: &str) -> Result<SignatureTable, LoadError> {
    let table: SignatureTable =
        serde_json::from_str(json).map_err(|e| LoadError::InvalidTable(e.to_string()))?;
    for (symbol, signature) in &table {
        signature.validate(symbol)?;
    }
    Ok(table)
}

/// Build a signature table from configuration entries
pub fn signatures_from_config(
    library: &isthmus_config::LibraryConfig,
) -> Result<SignatureTable, LoadError> {
    let parse = |symbol: &str, name: &str| {
        NativeType::parse(name).ok_or_else(|| LoadError::InvalidSignature {
            symbol: symbol.to_string(),
            reason: format!("unknown type '{}'", name),
        })
    };

    let mut table = SignatureTable::new();
    for (symbol, entry) in &library.symbols {
        let parameters = entry
            .parameters
            .iter()
            .map(|name| parse(symbol, name))
            .collect::<Result<Vec<_>, _>>()?;
        let signature = SymbolSignature {
            parameters,
            result: parse(symbol, &entry.result)?,
            nonblocking: entry.nonblocking,
        };
        signature.validate(symbol)?;
        table.insert(symbol.clone(), signature);
    }
    Ok(table)
}

/// A value handed back by the native host
///
/// Integers up to 32 bits and floats arrive directly; 64-bit integers and
/// pointers arrive as wire pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireValue {
    Void,
    Integer(i64),
    Float(f64),
    Wide(WirePair),
}

impl WireValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            WireValue::Void => "void",
            WireValue::Integer(_) => "integer",
            WireValue::Float(_) => "float",
            WireValue::Wide(_) => "wire pair",
        }
    }
}
