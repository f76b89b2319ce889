use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use lumivox_core::{DialogRequestId, Directive, MessageId};

use crate::error::{IngestError, IngestOutcome};
use crate::registry::{ProcessorHandle, ProcessorRegistry};
use crate::router::DirectiveRouter;
use crate::sink::HandlerResultSink;

mod worker;

/// Sequences directives within a dialog and dispatches them to a router.
///
/// One background worker thread per processor drains cancellations and
/// serializes handling according to each directive's blocking policy.
/// Dropping the processor shuts it down and joins the worker.
pub struct DirectiveProcessor {
    inner: Arc<ProcessorInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DirectiveProcessor {
    /// Starts a processor registered in the process-wide registry.
    pub fn start(router: Arc<dyn DirectiveRouter>) -> Self {
        Self::start_with_registry(router, ProcessorRegistry::global())
    }

    /// Starts a processor registered in an explicit registry, keeping it
    /// isolated from the process-wide map.
    pub fn start_with_registry(
        router: Arc<dyn DirectiveRouter>,
        registry: Arc<ProcessorRegistry>,
    ) -> Self {
        let inner = registry.register(|handle| {
            Arc::new(ProcessorInner {
                handle,
                router,
                registry: Arc::clone(&registry),
                ingest_lock: Mutex::new(()),
                state: Mutex::new(ProcessorState::default()),
                wake_worker: Condvar::new(),
            })
        });
        let worker_inner = Arc::clone(&inner);
        let join = thread::Builder::new()
            .name("lumivox-directive-worker".to_string())
            .spawn(move || worker::processing_loop(worker_inner))
            .expect("failed to spawn directive worker");
        info!(handle = %inner.handle, "directive processor started");
        Self {
            inner,
            worker: Mutex::new(Some(join)),
        }
    }

    /// Handle under which this processor is registered.
    pub fn handle(&self) -> ProcessorHandle {
        self.inner.handle
    }

    /// Changes the active dialog. All directives still in flight for the
    /// previous dialog are canceled, in ingest order, before the new dialog
    /// begins.
    pub fn set_dialog_request_id(&self, dialog_request_id: impl Into<DialogRequestId>) {
        let dialog_request_id = dialog_request_id.into();
        let mut state = self.inner.state.lock();
        if dialog_request_id == state.dialog_request_id {
            warn!(%dialog_request_id, "dialog request id unchanged, ignoring");
            return;
        }
        info!(%dialog_request_id, "dialog request id changed");
        self.inner.queue_all_for_cancellation(&mut state);
        state.dialog_request_id = dialog_request_id;
    }

    /// Offers a directive to the router's pre-handle stage and, if a
    /// handler accepts it, queues it for dispatch.
    ///
    /// Ingest calls are serialized: at most one directive is in
    /// pre-handling at any time. The router's pre-handle runs without any
    /// internal lock held, so a dialog change arriving meanwhile can steal
    /// the directive and route it to cancellation instead.
    pub fn ingest(&self, directive: Arc<Directive>) -> Result<IngestOutcome, IngestError> {
        let inner = &self.inner;
        let _ingest = inner.ingest_lock.lock();

        {
            let mut state = inner.state.lock();
            if state.is_shutting_down {
                warn!(
                    message_id = %directive.message_id(),
                    "directive ignored, processor is shutting down",
                );
                return Err(IngestError::ShuttingDown);
            }
            if state.dialog_request_id.is_empty()
                || directive.dialog_request_id() != &state.dialog_request_id
            {
                info!(
                    message_id = %directive.message_id(),
                    directive_dialog_request_id = %directive.dialog_request_id(),
                    dialog_request_id = %state.dialog_request_id,
                    "directive dropped, dialog request id does not match",
                );
                return Ok(IngestOutcome::DroppedStale);
            }
            if state.tracks_message_id(directive.message_id()) {
                warn!(
                    message_id = %directive.message_id(),
                    "directive ignored, message id already tracked",
                );
                return Err(IngestError::DuplicateMessageId {
                    message_id: directive.message_id().clone(),
                });
            }
            state.pre_handling = Some(Arc::clone(&directive));
        }

        let sink = HandlerResultSink::new(
            Arc::clone(&inner.registry),
            inner.handle,
            directive.message_id().clone(),
        );
        let accepted = inner.router.pre_handle(Arc::clone(&directive), sink);

        {
            let mut state = inner.state.lock();
            let still_in_slot = state
                .pre_handling
                .as_ref()
                .is_some_and(|held| Arc::ptr_eq(held, &directive));
            if still_in_slot {
                state.pre_handling = None;
                if accepted {
                    state.handling_queue.push_back(Arc::clone(&directive));
                    inner.wake_worker.notify_one();
                }
            }
        }

        if accepted {
            Ok(IngestOutcome::Queued)
        } else {
            debug!(message_id = %directive.message_id(), "no handler accepted directive");
            Err(IngestError::Rejected {
                message_id: directive.message_id().clone(),
            })
        }
    }

    /// Deregisters the processor, cancels everything still in flight, and
    /// joins the worker thread. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        self.inner.registry.deregister(self.inner.handle);
        {
            let mut state = self.inner.state.lock();
            if !state.is_shutting_down {
                info!(handle = %self.inner.handle, "directive processor shutting down");
            }
            self.inner.queue_all_for_cancellation(&mut state);
            state.is_shutting_down = true;
            self.inner.wake_worker.notify_one();
        }
        if let Some(join) = self.worker.lock().take() {
            if join.join().is_err() {
                error!(handle = %self.inner.handle, "directive worker panicked");
            }
        }
    }
}

impl Drop for DirectiveProcessor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub(crate) struct ProcessorInner {
    handle: ProcessorHandle,
    router: Arc<dyn DirectiveRouter>,
    registry: Arc<ProcessorRegistry>,
    /// Serializes ingest calls; held across the router's pre-handle. Never
    /// taken by the worker or by sink callbacks.
    ingest_lock: Mutex<()>,
    state: Mutex<ProcessorState>,
    wake_worker: Condvar,
}

#[derive(Default)]
struct ProcessorState {
    /// Empty means no dialog is active and nothing is admitted.
    dialog_request_id: DialogRequestId,
    /// Directive between ingest entry and ingest return; never also in a
    /// queue.
    pre_handling: Option<Arc<Directive>>,
    handling_queue: VecDeque<Arc<Directive>>,
    canceling_queue: VecDeque<Arc<Directive>>,
    /// The head of `handling_queue` is inside a blocking handle.
    is_handling_current: bool,
    is_shutting_down: bool,
}

impl ProcessorState {
    fn tracks_message_id(&self, message_id: &MessageId) -> bool {
        self.pre_handling
            .as_ref()
            .is_some_and(|d| d.message_id() == message_id)
            || find_in_queue(&self.handling_queue, message_id).is_some()
            || find_in_queue(&self.canceling_queue, message_id).is_some()
    }
}

impl ProcessorInner {
    pub(crate) fn on_handling_completed(&self, message_id: &MessageId) {
        let mut state = self.state.lock();
        debug!(
            %message_id,
            pre_handling = state
                .pre_handling
                .as_ref()
                .map(|d| d.message_id().as_str()),
            "handling completed",
        );
        let in_slot = state
            .pre_handling
            .as_ref()
            .is_some_and(|d| d.message_id() == message_id);
        if in_slot {
            state.pre_handling = None;
        } else if !self.remove_from_handling_queue(&mut state, message_id) {
            self.remove_from_canceling_queue(&mut state, message_id);
        }
    }

    pub(crate) fn on_handling_failed(&self, message_id: &MessageId, description: &str) {
        let mut state = self.state.lock();
        warn!(%message_id, description, "handling failed");
        let in_slot = state
            .pre_handling
            .as_ref()
            .is_some_and(|d| d.message_id() == message_id);
        if in_slot {
            state.pre_handling = None;
            self.queue_all_for_cancellation(&mut state);
        } else if self.remove_from_handling_queue(&mut state, message_id) {
            self.queue_all_for_cancellation(&mut state);
        } else {
            self.remove_from_canceling_queue(&mut state, message_id);
        }
    }

    fn remove_from_handling_queue(&self, state: &mut ProcessorState, message_id: &MessageId) -> bool {
        let Some(index) = find_in_queue(&state.handling_queue, message_id) else {
            return false;
        };
        if index == 0 && state.is_handling_current {
            state.is_handling_current = false;
        }
        state.handling_queue.remove(index);
        if !state.handling_queue.is_empty() {
            self.wake_worker.notify_one();
        }
        true
    }

    fn remove_from_canceling_queue(&self, state: &mut ProcessorState, message_id: &MessageId) -> bool {
        let Some(index) = find_in_queue(&state.canceling_queue, message_id) else {
            return false;
        };
        state.canceling_queue.remove(index);
        if !state.canceling_queue.is_empty() {
            self.wake_worker.notify_one();
        }
        true
    }

    /// Clears the dialog and migrates everything tracked, slot included,
    /// onto the canceling queue in ingest order.
    fn queue_all_for_cancellation(&self, state: &mut ProcessorState) {
        state.dialog_request_id.clear();
        if let Some(directive) = state.pre_handling.take() {
            state.handling_queue.push_back(directive);
        }
        if !state.handling_queue.is_empty() {
            let drained = std::mem::take(&mut state.handling_queue);
            state.canceling_queue.extend(drained);
            self.wake_worker.notify_one();
        }
        state.is_handling_current = false;
    }
}

fn find_in_queue(queue: &VecDeque<Arc<Directive>>, message_id: &MessageId) -> Option<usize> {
    queue.iter().position(|d| d.message_id() == message_id)
}
