use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::processor::ProcessorInner;

/// Opaque identity under which a processor is registered, unique for the
/// lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessorHandle(u64);

impl fmt::Display for ProcessorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Map from handles to live processors.
///
/// Result sinks handed out to handlers reference their processor only
/// through this map, so a handler thread holding an old sink can never
/// reach a processor that has already shut down.
#[derive(Default)]
pub struct ProcessorRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_handle: u64,
    entries: HashMap<ProcessorHandle, Arc<ProcessorInner>>,
}

impl ProcessorRegistry {
    /// Creates an empty registry. Processors that should not share the
    /// process-wide map (tests, mostly) are started against one of these.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by all processors not given an explicit one.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<ProcessorRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Allocates the next handle, builds the processor under it, and
    /// inserts it, all under the registry lock.
    pub(crate) fn register(
        &self,
        build: impl FnOnce(ProcessorHandle) -> Arc<ProcessorInner>,
    ) -> Arc<ProcessorInner> {
        let mut inner = self.inner.lock();
        inner.next_handle += 1;
        let handle = ProcessorHandle(inner.next_handle);
        let processor = build(handle);
        inner.entries.insert(handle, Arc::clone(&processor));
        processor
    }

    pub(crate) fn deregister(&self, handle: ProcessorHandle) {
        self.inner.lock().entries.remove(&handle);
    }

    /// Runs `action` on the processor registered under `handle`, holding
    /// the registry lock for the whole call so shutdown cannot slip in
    /// between lookup and use. Returns false for an unknown handle.
    ///
    /// `action` must be brief, must not touch the registry, and may take
    /// the processor's state lock: shutdown takes the registry lock
    /// strictly before the state lock, so the order here is consistent.
    pub(crate) fn with_processor(
        &self,
        handle: ProcessorHandle,
        action: impl FnOnce(&ProcessorInner),
    ) -> bool {
        let inner = self.inner.lock();
        match inner.entries.get(&handle) {
            Some(processor) => {
                action(processor);
                true
            }
            None => false,
        }
    }
}
