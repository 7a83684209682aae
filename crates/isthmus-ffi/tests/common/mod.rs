//! Shared test utilities
//!
//! `RecordingHost` is a `NativeHost` double: it records every request it
//! receives and answers from queues the test fills in up front.

#![allow(dead_code)]

use isthmus_ffi::ffi::{
    BoundaryError, CallRequest, LoadRequest, NativeBuffer, NativeHost, NativeType, Parameter,
    PendingCall, ResourceId, SignatureTable, SymbolSignature, WirePair, WireValue,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// One request seen by the host
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Load {
        path: String,
        symbols: Vec<String>,
    },
    Call {
        resource: ResourceId,
        symbol: String,
        parameters: Vec<Parameter>,
        nonblocking: bool,
    },
    ReadScalar {
        kind: NativeType,
        address: WirePair,
    },
    ReadCString {
        address: WirePair,
    },
    CopyInto {
        address: WirePair,
        len: usize,
    },
    Release(ResourceId),
}

#[derive(Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
    /// Buffer lists of every call, in call order
    buffers: Mutex<Vec<Vec<NativeBuffer>>>,
    call_results: Mutex<VecDeque<Result<WireValue, BoundaryError>>>,
    read_results: Mutex<VecDeque<Result<WireValue, BoundaryError>>>,
    /// Bytes served by `read_cstring` and `copy_into`
    memory: Mutex<Vec<u8>>,
    address: Mutex<Option<WirePair>>,
    release_failure: Mutex<Option<BoundaryError>>,
    next_id: AtomicU32,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the result of the next call
    pub fn push_call_result(&self, result: Result<WireValue, BoundaryError>) {
        self.call_results.lock().unwrap().push_back(result);
    }

    /// Queue the result of the next scalar read
    pub fn push_read_result(&self, result: Result<WireValue, BoundaryError>) {
        self.read_results.lock().unwrap().push_back(result);
    }

    pub fn set_memory(&self, bytes: &[u8]) {
        *self.memory.lock().unwrap() = bytes.to_vec();
    }

    /// Address reported by `address_of`
    pub fn set_address(&self, address: u64) {
        *self.address.lock().unwrap() = Some(WirePair::from_u64(address));
    }

    /// Make the next release fail with `error`
    pub fn fail_next_release(&self, error: BoundaryError) {
        *self.release_failure.lock().unwrap() = Some(error);
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn call_buffers(&self) -> Vec<Vec<NativeBuffer>> {
        self.buffers.lock().unwrap().clone()
    }

    pub fn release_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, HostEvent::Release(_)))
            .count()
    }

    pub fn call_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, HostEvent::Call { .. }))
            .count()
    }

    fn record(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn record_call(&self, request: CallRequest, nonblocking: bool) -> Result<WireValue, BoundaryError> {
        self.buffers.lock().unwrap().push(request.buffers);
        self.record(HostEvent::Call {
            resource: request.resource,
            symbol: request.symbol,
            parameters: request.parameters,
            nonblocking,
        });
        self.call_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(WireValue::Void))
    }
}

impl NativeHost for RecordingHost {
    fn load(&self, request: &LoadRequest) -> Result<ResourceId, BoundaryError> {
        self.record(HostEvent::Load {
            path: request.path.clone(),
            symbols: request.symbols.keys().cloned().collect(),
        });
        Ok(ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1))
    }

    fn call(&self, request: CallRequest) -> Result<WireValue, BoundaryError> {
        self.record_call(request, false)
    }

    fn call_nonblocking(&self, request: CallRequest) -> PendingCall {
        let result = self.record_call(request, true);
        Box::pin(async move {
            tokio::task::yield_now().await;
            result
        })
    }

    fn address_of(&self, _buffer: &NativeBuffer) -> WirePair {
        self.address
            .lock()
            .unwrap()
            .unwrap_or_else(|| WirePair::from_u64(0x1000))
    }

    fn read_scalar(&self, kind: NativeType, address: WirePair) -> Result<WireValue, BoundaryError> {
        self.record(HostEvent::ReadScalar { kind, address });
        self.read_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(WireValue::Integer(0)))
    }

    fn read_cstring(&self, address: WirePair) -> Result<Vec<u8>, BoundaryError> {
        self.record(HostEvent::ReadCString { address });
        let memory = self.memory.lock().unwrap();
        Ok(memory.iter().take_while(|&&b| b != 0).copied().collect())
    }

    fn copy_into(&self, address: WirePair, destination: &NativeBuffer) -> Result<(), BoundaryError> {
        self.record(HostEvent::CopyInto {
            address,
            len: destination.len(),
        });
        let memory = self.memory.lock().unwrap();
        if memory.len() < destination.len() {
            return Err(BoundaryError::CallFailed {
                symbol: "copy_into".to_string(),
                reason: "truncated copy".to_string(),
            });
        }
        destination.write(0, &memory[..destination.len()]);
        Ok(())
    }

    fn release(&self, resource: ResourceId) -> Result<(), BoundaryError> {
        self.record(HostEvent::Release(resource));
        match self.release_failure.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Signature table from `(name, parameters, result)` triples
pub fn table(entries: &[(&str, &[NativeType], NativeType)]) -> SignatureTable {
    entries
        .iter()
        .map(|(name, parameters, result)| {
            (
                name.to_string(),
                SymbolSignature::new(parameters.to_vec(), *result),
            )
        })
        .collect()
}
