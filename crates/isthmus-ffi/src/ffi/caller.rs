//! Per-symbol callables
//!
//! A [`SymbolBinding`] is built once per declared symbol when a library is
//! loaded. Each invocation checks arity, classifies every argument against
//! the declared parameter kinds, and then issues exactly one call request to
//! the native host. Nothing reaches the host if classification fails.

use crate::async_runtime;
use crate::ffi::error::CallError;
use crate::ffi::host::{CallRequest, Parameter};
use crate::ffi::loader::ModuleState;
use crate::ffi::marshal::{unmarshal_result, MarshalContext};
use crate::ffi::types::SymbolSignature;
use crate::value::Value;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;

/// Callable bound to one native entry point
#[derive(Clone)]
pub struct SymbolBinding {
    name: String,
    signature: SymbolSignature,
    module: Arc<ModuleState>,
}

impl SymbolBinding {
    pub(crate) fn new(name: String, signature: SymbolSignature, module: Arc<ModuleState>) -> Self {
        Self {
            name,
            signature,
            module,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &SymbolSignature {
        &self.signature
    }

    /// Marshal `args` and dispatch according to the signature's mode
    ///
    /// Blocking symbols run on the calling thread and come back `Complete`.
    /// Non-blocking symbols come back `Pending` as soon as the call is issued.
    pub fn invoke(&self, args: &[Value]) -> Result<CallOutcome, CallError> {
        self.module.ensure_open(&self.name)?;

        if args.len() != self.signature.parameters.len() {
            return Err(CallError::Arity {
                symbol: self.name.clone(),
                expected: self.signature.parameters.len(),
                got: args.len(),
            });
        }

        let mut ctx = MarshalContext::new(&self.name);
        let parameters: Vec<Parameter> = args
            .iter()
            .zip(self.signature.parameters.iter())
            .enumerate()
            .map(|(index, (arg, kind))| ctx.marshal(index, arg, *kind))
            .collect::<Result<Vec<_>, _>>()?;

        let request = CallRequest {
            resource: self.module.resource,
            symbol: self.name.clone(),
            parameters,
            buffers: ctx.into_buffers(),
        };
        let result_kind = self.signature.result;

        debug!(
            symbol = %self.name,
            signature = %self.signature_key(),
            resource = %self.module.resource,
            buffers = request.buffers.len(),
            nonblocking = self.signature.nonblocking,
            "native call"
        );

        if self.signature.nonblocking {
            let pending = self.module.host.call_nonblocking(request);
            return Ok(CallOutcome::Pending(PendingValue::new(async move {
                let wire = pending.await?;
                Ok::<_, CallError>(unmarshal_result(wire, result_kind)?)
            })));
        }

        let wire = self.module.host.call(request)?;
        Ok(CallOutcome::Complete(unmarshal_result(wire, result_kind)?))
    }

    /// Invoke and wait for the result, whatever the dispatch mode
    ///
    /// Must not be used from inside an async context; use [`call_async`] there.
    ///
    /// [`call_async`]: SymbolBinding::call_async
    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        self.invoke(args)?.wait()
    }

    /// Invoke and await the result
    pub async fn call_async(&self, args: &[Value]) -> Result<Value, CallError> {
        self.invoke(args)?.resolve().await
    }

    /// Dispatch key such as `(pointer,u32)->i64`
    pub fn signature_key(&self) -> String {
        self.signature.signature_key()
    }
}

impl fmt::Debug for SymbolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolBinding")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("resource", &self.module.resource)
            .finish()
    }
}

/// What an invocation produced
#[derive(Debug)]
pub enum CallOutcome {
    /// Blocking call, already finished
    Complete(Value),
    /// Non-blocking call still running on the worker pool
    Pending(PendingValue),
}

impl CallOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, CallOutcome::Pending(_))
    }

    /// Await the value
    pub async fn resolve(self) -> Result<Value, CallError> {
        match self {
            CallOutcome::Complete(value) => Ok(value),
            CallOutcome::Pending(pending) => pending.await,
        }
    }

    /// Block the current thread until the value is available
    pub fn wait(self) -> Result<Value, CallError> {
        match self {
            CallOutcome::Complete(value) => Ok(value),
            CallOutcome::Pending(pending) => async_runtime::block_on(pending)?,
        }
    }
}

/// Result of a non-blocking call
///
/// Dropping it does not cancel the native call; the call runs to completion
/// and its result is discarded.
pub struct PendingValue {
    inner: BoxFuture<'static, Result<Value, CallError>>,
}

impl PendingValue {
    fn new(future: impl Future<Output = Result<Value, CallError>> + Send + 'static) -> Self {
        Self {
            inner: future.boxed(),
        }
    }
}

impl Future for PendingValue {
    type Output = Result<Value, CallError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for PendingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingValue")
    }
}
