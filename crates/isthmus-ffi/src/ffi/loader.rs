//! Loaded libraries
//!
//! A [`LibraryHandle`] owns one module opened by the native host, plus a
//! name-keyed registry of [`SymbolBinding`]s built from the declared signature
//! table. The handle and its bindings share one open/closed state: once the
//! handle is closed every binding fails with `LibraryClosed` before reaching
//! the host.

use crate::ffi::caller::{CallOutcome, SymbolBinding};
use crate::ffi::error::{CallError, FfiError, FfiResult, LoadError};
use crate::ffi::host::{LoadRequest, NativeHost, ResourceId};
use crate::ffi::resolver::LibraryResolver;
use crate::ffi::types::{signatures_from_config, SignatureTable};
use crate::value::Value;
use isthmus_config::Config;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// State shared between a handle and its bindings
pub(crate) struct ModuleState {
    pub(crate) resource: ResourceId,
    pub(crate) path: String,
    pub(crate) host: Arc<dyn NativeHost>,
    closed: AtomicBool,
}

impl ModuleState {
    pub(crate) fn ensure_open(&self, symbol: &str) -> Result<(), CallError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CallError::LibraryClosed {
                library: self.path.clone(),
                symbol: symbol.to_string(),
            });
        }
        Ok(())
    }

    /// Flip to closed; true if this call did the flip
    fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

/// One loaded native library
///
/// # Safety
///
/// Loading runs the library's initialization code in this process, and calls
/// trust the declared signatures. Only load libraries you trust, with
/// signatures that match their exports.
pub struct LibraryHandle {
    module: Arc<ModuleState>,
    symbols: HashMap<String, SymbolBinding>,
}

impl LibraryHandle {
    /// Issue one load request and bind every declared symbol
    pub fn load(
        host: Arc<dyn NativeHost>,
        path: impl Into<String>,
        signatures: SignatureTable,
    ) -> Result<Self, LoadError> {
        let path = path.into();
        for (symbol, signature) in &signatures {
            signature.validate(symbol)?;
        }

        let request = LoadRequest {
            path: path.clone(),
            symbols: signatures,
        };
        let resource = host.load(&request)?;
        debug!(%path, %resource, symbols = request.symbols.len(), "library loaded");

        let module = Arc::new(ModuleState {
            resource,
            path,
            host,
            closed: AtomicBool::new(false),
        });
        let symbols = request
            .symbols
            .into_iter()
            .map(|(name, signature)| {
                let binding = SymbolBinding::new(name.clone(), signature, Arc::clone(&module));
                (name, binding)
            })
            .collect();

        Ok(Self { module, symbols })
    }

    /// Resolve `name` against search paths, then load
    pub fn open(
        host: Arc<dyn NativeHost>,
        resolver: &LibraryResolver,
        name: &str,
        signatures: SignatureTable,
    ) -> Result<Self, LoadError> {
        Self::load(host, resolver.resolve(name), signatures)
    }

    /// Load a library declared in `isthmus.toml` by its configured name
    pub fn from_config(host: Arc<dyn NativeHost>, config: &Config, name: &str) -> FfiResult<Self> {
        let library = config
            .library(name)
            .ok_or_else(|| FfiError::UndeclaredLibrary(name.to_string()))?;
        let signatures = signatures_from_config(library)?;
        let resolver = LibraryResolver::from_config(config);
        Ok(Self::open(host, &resolver, &library.path, signatures)?)
    }

    pub fn resource(&self) -> ResourceId {
        self.module.resource
    }

    /// Path as handed to the native host
    pub fn path(&self) -> &str {
        &self.module.path
    }

    pub fn is_closed(&self) -> bool {
        self.module.closed.load(Ordering::Acquire)
    }

    pub fn symbol(&self, name: &str) -> Option<&SymbolBinding> {
        self.symbols.get(name)
    }

    /// Every bound symbol, in no particular order
    pub fn symbols(&self) -> impl Iterator<Item = &SymbolBinding> {
        self.symbols.values()
    }

    /// Invoke a symbol by name without waiting on non-blocking calls
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<CallOutcome, CallError> {
        self.binding(name)?.invoke(args)
    }

    /// Invoke a symbol by name and wait for its value
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, CallError> {
        self.binding(name)?.call(args)
    }

    fn binding(&self, name: &str) -> Result<&SymbolBinding, CallError> {
        self.symbols
            .get(name)
            .ok_or_else(|| CallError::UnknownSymbol(name.to_string()))
    }

    /// Release the module
    ///
    /// Issues exactly one release request. Closing twice is an error, and
    /// calls through this handle or its bindings fail afterwards. Pending
    /// non-blocking calls keep running.
    ///
    /// The handle counts as closed even when the release fails: the error is
    /// returned and logged, and neither a later `close` nor `Drop` retries it.
    pub fn close(&self) -> Result<(), FfiError> {
        if !self.module.mark_closed() {
            return Err(FfiError::AlreadyClosed(self.module.path.clone()));
        }
        debug!(path = %self.module.path, resource = %self.module.resource, "library closed");
        if let Err(err) = self.module.host.release(self.module.resource) {
            warn!(
                path = %self.module.path,
                resource = %self.module.resource,
                error = %err,
                "release failed; module may stay loaded"
            );
            return Err(err.into());
        }
        Ok(())
    }
}

impl Drop for LibraryHandle {
    fn drop(&mut self) {
        if self.module.mark_closed() {
            warn!(
                path = %self.module.path,
                resource = %self.module.resource,
                "library handle dropped without close; releasing"
            );
            if let Err(err) = self.module.host.release(self.module.resource) {
                warn!(error = %err, "release on drop failed");
            }
        }
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.symbols.keys().collect();
        names.sort();
        f.debug_struct("LibraryHandle")
            .field("path", &self.module.path)
            .field("resource", &self.module.resource)
            .field("closed", &self.is_closed())
            .field("symbols", &names)
            .finish()
    }
}
