//! Byte buffers shared with native code
//!
//! A [`NativeBuffer`] is the typed buffer of the script side: fixed length,
//! cheap to clone, and passed to native calls by reference. Its storage is
//! allocated once and never grows, so an address taken from it stays valid
//! for as long as any clone is alive.
//!
//! No lock guards the bytes. Native code may read and write them while a
//! call is outstanding, and host-side accessors go through per-byte atomics,
//! so the script side never waits on a running call. Whether concurrent
//! native writes make sense is the caller's contract.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct NativeBuffer {
    storage: Arc<[AtomicU8]>,
    len: usize,
}

impl NativeBuffer {
    /// Zero-filled buffer of `len` bytes
    pub fn new(len: usize) -> Self {
        Self::from_vec(vec![0; len])
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let storage: Arc<[AtomicU8]> = bytes.into_iter().map(AtomicU8::new).collect();
        Self {
            len: storage.len(),
            storage,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Snapshot of the current contents
    pub fn to_vec(&self) -> Vec<u8> {
        self.storage
            .iter()
            .map(|byte| byte.load(Ordering::Acquire))
            .collect()
    }

    /// Overwrite bytes starting at `offset`; returns false if they do not fit
    pub fn write(&self, offset: usize, bytes: &[u8]) -> bool {
        match offset.checked_add(bytes.len()) {
            Some(end) if end <= self.len => {
                for (cell, byte) in self.storage[offset..end].iter().zip(bytes) {
                    cell.store(*byte, Ordering::Release);
                }
                true
            }
            _ => false,
        }
    }

    /// Whether two handles share the same storage
    pub fn same_storage(&self, other: &NativeBuffer) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// First byte of the storage, valid while any clone is alive
    ///
    /// `AtomicU8` has the layout of `u8`, and writes through this pointer
    /// land in interior-mutable cells.
    pub(crate) fn as_mut_ptr(&self) -> *mut u8 {
        self.storage.as_ptr() as *mut u8
    }

    pub(crate) fn base_address(&self) -> usize {
        self.as_mut_ptr() as usize
    }
}

impl From<Vec<u8>> for NativeBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

impl From<&[u8]> for NativeBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::from_vec(bytes.to_vec())
    }
}

/// Identity, not contents: two buffers are equal when they share storage
impl PartialEq for NativeBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.same_storage(other)
    }
}

impl fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBuffer").field("len", &self.len).finish()
    }
}
