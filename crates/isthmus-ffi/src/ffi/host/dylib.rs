//! In-process native host
//!
//! Opens shared libraries with `libloading`, calls symbols through the
//! `libffi` middle layer, and reads raw process memory directly. Non-blocking
//! calls run on the shared worker runtime's blocking pool.

use crate::async_runtime::{self, DEFAULT_BLOCKING_THREADS};
use crate::ffi::buffer::NativeBuffer;
use crate::ffi::error::BoundaryError;
use crate::ffi::host::{CallRequest, LoadRequest, NativeHost, Parameter, PendingCall, ResourceId};
use crate::ffi::types::{NativeType, SymbolSignature, WireValue};
use crate::ffi::wide::WirePair;
use isthmus_config::Config;
use libffi::middle::{Arg, Cif, CodePtr, Type};
use libloading::Library;
use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

struct ResolvedSymbol {
    address: usize,
    signature: SymbolSignature,
}

struct LoadedModule {
    path: String,
    library: Arc<Library>,
    symbols: HashMap<String, ResolvedSymbol>,
}

/// [`NativeHost`] backed by the current process
pub struct DylibHost {
    modules: Mutex<HashMap<ResourceId, LoadedModule>>,
    next_id: AtomicU32,
}

impl DylibHost {
    pub fn new() -> Self {
        Self {
            modules: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Host whose worker pool is sized from `blocking_threads`
    pub fn from_config(config: &Config) -> Result<Self, BoundaryError> {
        async_runtime::init_runtime(config.blocking_threads().unwrap_or(DEFAULT_BLOCKING_THREADS))?;
        Ok(Self::new())
    }

    /// Number of modules currently open
    pub fn loaded_count(&self) -> usize {
        self.modules().len()
    }

    fn modules(&self) -> MutexGuard<'_, HashMap<ResourceId, LoadedModule>> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up everything a call needs, so it can run without the module table
    fn prepare(&self, request: CallRequest) -> Result<PreparedCall, BoundaryError> {
        let modules = self.modules();
        let module = modules
            .get(&request.resource)
            .ok_or(BoundaryError::UnknownResource(request.resource))?;
        let symbol = module
            .symbols
            .get(&request.symbol)
            .ok_or_else(|| BoundaryError::SymbolNotFound {
                library: module.path.clone(),
                symbol: request.symbol.clone(),
            })?;

        Ok(PreparedCall {
            address: symbol.address,
            signature: symbol.signature.clone(),
            _library: Arc::clone(&module.library),
            symbol: request.symbol,
            parameters: request.parameters,
            buffers: request.buffers,
        })
    }
}

impl Default for DylibHost {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeHost for DylibHost {
    fn load(&self, request: &LoadRequest) -> Result<ResourceId, BoundaryError> {
        let library = unsafe { Library::new(&request.path) }.map_err(|e| BoundaryError::LoadFailed {
            path: request.path.clone(),
            reason: e.to_string(),
        })?;

        let mut symbols = HashMap::with_capacity(request.symbols.len());
        for (name, signature) in &request.symbols {
            let not_found = || BoundaryError::SymbolNotFound {
                library: request.path.clone(),
                symbol: name.clone(),
            };
            let address = unsafe { library.get::<*const c_void>(name.as_bytes()) }
                .map(|symbol| *symbol as usize)
                .map_err(|_| not_found())?;
            if address == 0 {
                return Err(not_found());
            }
            symbols.insert(
                name.clone(),
                ResolvedSymbol {
                    address,
                    signature: signature.clone(),
                },
            );
        }

        let resource = ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(path = %request.path, %resource, "dlopen");
        self.modules().insert(
            resource,
            LoadedModule {
                path: request.path.clone(),
                library: Arc::new(library),
                symbols,
            },
        );
        Ok(resource)
    }

    fn call(&self, request: CallRequest) -> Result<WireValue, BoundaryError> {
        self.prepare(request)?.execute()
    }

    fn call_nonblocking(&self, request: CallRequest) -> PendingCall {
        let prepared = match self.prepare(request) {
            Ok(prepared) => prepared,
            Err(err) => return Box::pin(async move { Err::<WireValue, _>(err) }),
        };
        let runtime = match async_runtime::runtime() {
            Ok(runtime) => runtime,
            Err(err) => return Box::pin(async move { Err::<WireValue, _>(err) }),
        };

        let symbol = prepared.symbol.clone();
        let handle = runtime.spawn_blocking(move || prepared.execute());
        Box::pin(async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => Err(BoundaryError::CallFailed {
                    symbol,
                    reason: err.to_string(),
                }),
            }
        })
    }

    fn address_of(&self, buffer: &NativeBuffer) -> WirePair {
        WirePair::from_u64(buffer.base_address() as u64)
    }

    fn read_scalar(&self, kind: NativeType, address: WirePair) -> Result<WireValue, BoundaryError> {
        let ptr = raw_address(address)? as *const u8;
        // SAFETY: the caller vouches that `address` points at readable memory
        // holding a value of `kind`; alignment is not assumed.
        let value = unsafe {
            match kind {
                NativeType::I8 => WireValue::Integer(i64::from(ptr.cast::<i8>().read_unaligned())),
                NativeType::U8 => WireValue::Integer(i64::from(ptr.read_unaligned())),
                NativeType::I16 => WireValue::Integer(i64::from(ptr.cast::<i16>().read_unaligned())),
                NativeType::U16 => WireValue::Integer(i64::from(ptr.cast::<u16>().read_unaligned())),
                NativeType::I32 => WireValue::Integer(i64::from(ptr.cast::<i32>().read_unaligned())),
                NativeType::U32 => WireValue::Integer(i64::from(ptr.cast::<u32>().read_unaligned())),
                NativeType::I64 => {
                    WireValue::Wide(WirePair::from_u64(ptr.cast::<i64>().read_unaligned() as u64))
                }
                NativeType::U64 => WireValue::Wide(WirePair::from_u64(ptr.cast::<u64>().read_unaligned())),
                NativeType::F32 => WireValue::Float(f64::from(ptr.cast::<f32>().read_unaligned())),
                NativeType::F64 => WireValue::Float(ptr.cast::<f64>().read_unaligned()),
                NativeType::Pointer => {
                    WireValue::Wide(WirePair::from_u64(ptr.cast::<usize>().read_unaligned() as u64))
                }
                NativeType::Void => {
                    return Err(BoundaryError::Unsupported("read of void".to_string()));
                }
            }
        };
        Ok(value)
    }

    fn read_cstring(&self, address: WirePair) -> Result<Vec<u8>, BoundaryError> {
        let ptr = raw_address(address)? as *const c_char;
        // SAFETY: the caller vouches for a zero-terminated string at `address`.
        Ok(unsafe { CStr::from_ptr(ptr) }.to_bytes().to_vec())
    }

    fn copy_into(&self, address: WirePair, destination: &NativeBuffer) -> Result<(), BoundaryError> {
        let source = raw_address(address)? as *const u8;
        // SAFETY: the caller vouches that `destination.len()` bytes are readable
        // at `address`. The ranges may overlap, e.g. a view copying onto its own
        // buffer, so this is a memmove.
        unsafe {
            std::ptr::copy(source, destination.as_mut_ptr(), destination.len());
        }
        Ok(())
    }

    fn release(&self, resource: ResourceId) -> Result<(), BoundaryError> {
        let module = self
            .modules()
            .remove(&resource)
            .ok_or(BoundaryError::UnknownResource(resource))?;
        debug!(path = %module.path, %resource, "dlclose");
        Ok(())
    }
}

/// Non-null address as a native pointer-width integer
fn raw_address(address: WirePair) -> Result<usize, BoundaryError> {
    let address = address.to_u64();
    if address == 0 {
        return Err(BoundaryError::NullAddress);
    }
    usize::try_from(address)
        .map_err(|_| BoundaryError::Unsupported(format!("address {:#x} exceeds pointer width", address)))
}

/// A call with everything resolved, ready to run on any thread
///
/// Holds the library open and the argument buffers alive until it finishes.
struct PreparedCall {
    address: usize,
    signature: SymbolSignature,
    _library: Arc<Library>,
    symbol: String,
    parameters: Vec<Parameter>,
    buffers: Vec<NativeBuffer>,
}

/// One libffi argument, owned for the duration of the call
enum ArgSlot {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Pointer(usize),
}

impl PreparedCall {
    fn execute(self) -> Result<WireValue, BoundaryError> {
        if self.parameters.len() != self.signature.parameters.len() {
            return Err(self.failed(format!(
                "{} parameters for signature {}",
                self.parameters.len(),
                self.signature
            )));
        }

        let slots = self
            .parameters
            .iter()
            .zip(self.signature.parameters.iter())
            .enumerate()
            .map(|(index, (parameter, kind))| self.slot(index, parameter, *kind))
            .collect::<Result<Vec<_>, _>>()?;

        let args: Vec<Arg> = slots
            .iter()
            .map(|slot| match slot {
                ArgSlot::I8(v) => Arg::new(v),
                ArgSlot::U8(v) => Arg::new(v),
                ArgSlot::I16(v) => Arg::new(v),
                ArgSlot::U16(v) => Arg::new(v),
                ArgSlot::I32(v) => Arg::new(v),
                ArgSlot::U32(v) => Arg::new(v),
                ArgSlot::I64(v) => Arg::new(v),
                ArgSlot::U64(v) => Arg::new(v),
                ArgSlot::F32(v) => Arg::new(v),
                ArgSlot::F64(v) => Arg::new(v),
                ArgSlot::Pointer(v) => Arg::new(v),
            })
            .collect();

        let cif = Cif::new(
            self.signature.parameters.iter().map(|kind| ffi_type(*kind)),
            ffi_type(self.signature.result),
        );
        let code = CodePtr(self.address as *mut c_void);

        // SAFETY: the declared signature is trusted to match the symbol, and
        // every buffer it may touch is kept alive by `self.buffers` until we
        // return. Concurrent access to those bytes is the caller's contract.
        let result = unsafe {
            match self.signature.result {
                NativeType::Void => {
                    cif.call::<()>(code, &args);
                    WireValue::Void
                }
                NativeType::I8 => WireValue::Integer(i64::from(cif.call::<i8>(code, &args))),
                NativeType::U8 => WireValue::Integer(i64::from(cif.call::<u8>(code, &args))),
                NativeType::I16 => WireValue::Integer(i64::from(cif.call::<i16>(code, &args))),
                NativeType::U16 => WireValue::Integer(i64::from(cif.call::<u16>(code, &args))),
                NativeType::I32 => WireValue::Integer(i64::from(cif.call::<i32>(code, &args))),
                NativeType::U32 => WireValue::Integer(i64::from(cif.call::<u32>(code, &args))),
                NativeType::I64 => {
                    WireValue::Wide(WirePair::from_u64(cif.call::<i64>(code, &args) as u64))
                }
                NativeType::U64 => WireValue::Wide(WirePair::from_u64(cif.call::<u64>(code, &args))),
                NativeType::F32 => WireValue::Float(f64::from(cif.call::<f32>(code, &args))),
                NativeType::F64 => WireValue::Float(cif.call::<f64>(code, &args)),
                NativeType::Pointer => {
                    WireValue::Wide(WirePair::from_u64(cif.call::<usize>(code, &args) as u64))
                }
            }
        };
        Ok(result)
    }

    /// Native form of one parameter
    ///
    /// Numbers are converted with Rust's `as` semantics; range is the caller's contract.
    fn slot(&self, index: usize, parameter: &Parameter, kind: NativeType) -> Result<ArgSlot, BoundaryError> {
        let slot = match (kind, parameter) {
            (NativeType::Pointer, Parameter::Buffer(i)) => {
                let buffer = self
                    .buffers
                    .get(*i)
                    .ok_or_else(|| self.failed(format!("argument {} names missing buffer {}", index, i)))?;
                ArgSlot::Pointer(buffer.base_address())
            }
            (NativeType::Pointer, Parameter::Pointer(pair)) => ArgSlot::Pointer(pair.to_u64() as usize),
            (NativeType::Pointer, Parameter::Null) => ArgSlot::Pointer(0),

            (kind, Parameter::Number(n)) if !kind.is_pointer() => number_slot(kind, *n),
            (kind, Parameter::BigInt(n)) if !kind.is_pointer() => integer_slot(kind, *n),

            (kind, parameter) => {
                return Err(self.failed(format!(
                    "argument {} cannot pass {:?} as {}",
                    index, parameter, kind
                )))
            }
        };
        Ok(slot)
    }

    fn failed(&self, reason: String) -> BoundaryError {
        BoundaryError::CallFailed {
            symbol: self.symbol.clone(),
            reason,
        }
    }
}

fn number_slot(kind: NativeType, n: f64) -> ArgSlot {
    match kind {
        NativeType::I8 => ArgSlot::I8(n as i8),
        NativeType::U8 => ArgSlot::U8(n as u8),
        NativeType::I16 => ArgSlot::I16(n as i16),
        NativeType::U16 => ArgSlot::U16(n as u16),
        NativeType::I32 => ArgSlot::I32(n as i32),
        NativeType::U32 => ArgSlot::U32(n as u32),
        NativeType::I64 => ArgSlot::I64(n as i64),
        NativeType::U64 => ArgSlot::U64(n as u64),
        NativeType::F32 => ArgSlot::F32(n as f32),
        NativeType::F64 => ArgSlot::F64(n),
        NativeType::Pointer | NativeType::Void => ArgSlot::Pointer(n as usize),
    }
}

fn integer_slot(kind: NativeType, n: i128) -> ArgSlot {
    match kind {
        NativeType::I8 => ArgSlot::I8(n as i8),
        NativeType::U8 => ArgSlot::U8(n as u8),
        NativeType::I16 => ArgSlot::I16(n as i16),
        NativeType::U16 => ArgSlot::U16(n as u16),
        NativeType::I32 => ArgSlot::I32(n as i32),
        NativeType::U32 => ArgSlot::U32(n as u32),
        NativeType::I64 => ArgSlot::I64(n as i64),
        NativeType::U64 => ArgSlot::U64(n as u64),
        NativeType::F32 => ArgSlot::F32(n as f32),
        NativeType::F64 => ArgSlot::F64(n as f64),
        NativeType::Pointer | NativeType::Void => ArgSlot::Pointer(n as usize),
    }
}

fn ffi_type(kind: NativeType) -> Type {
    match kind {
        NativeType::I8 => Type::i8(),
        NativeType::U8 => Type::u8(),
        NativeType::I16 => Type::i16(),
        NativeType::U16 => Type::u16(),
        NativeType::I32 => Type::i32(),
        NativeType::U32 => Type::u32(),
        NativeType::I64 => Type::i64(),
        NativeType::U64 => Type::u64(),
        NativeType::F32 => Type::f32(),
        NativeType::F64 => Type::f64(),
        NativeType::Pointer => Type::pointer(),
        NativeType::Void => Type::void(),
    }
}
