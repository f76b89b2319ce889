use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::MutexGuard;
use tracing::{debug, error, info, warn};

use lumivox_core::{BlockingPolicy, Directive};

use super::{ProcessorInner, ProcessorState};

/// Body of the per-processor worker thread.
///
/// Each pass drains the canceling queue, then dispatches at most one
/// directive from the handling queue. The state lock is released around
/// every router call; a pass in which neither sub-step found work while
/// shutdown is flagged ends the loop.
pub(super) fn processing_loop(inner: Arc<ProcessorInner>) {
    info!(handle = %inner.handle, "directive worker started");
    let mut state = inner.state.lock();
    loop {
        inner.wake_worker.wait_while(&mut state, |state| {
            state.canceling_queue.is_empty()
                && (state.handling_queue.is_empty() || state.is_handling_current)
                && !state.is_shutting_down
        });
        let (next, canceled) = drain_canceling_queue(&inner, state);
        let (next, handled) = dispatch_next_directive(&inner, next);
        state = next;
        if !canceled && !handled && state.is_shutting_down {
            break;
        }
    }
    drop(state);
    info!(handle = %inner.handle, "directive worker exited");
}

/// Cancels everything queued for cancellation, in ingest order. Returns
/// false if there was nothing to do. Entries appended while the router is
/// being called are picked up on the next pass.
fn drain_canceling_queue<'a>(
    inner: &'a ProcessorInner,
    mut state: MutexGuard<'a, ProcessorState>,
) -> (MutexGuard<'a, ProcessorState>, bool) {
    if state.canceling_queue.is_empty() {
        return (state, false);
    }
    let batch: VecDeque<Arc<Directive>> = std::mem::take(&mut state.canceling_queue);
    drop(state);
    for directive in batch {
        debug!(message_id = %directive.message_id(), "canceling directive");
        inner.router.cancel(directive);
    }
    (inner.state.lock(), true)
}

/// Hands the head of the handling queue to the router. Returns false if the
/// queue was empty; returns true without dispatching while a blocking
/// directive is still outstanding.
fn dispatch_next_directive<'a>(
    inner: &'a ProcessorInner,
    mut state: MutexGuard<'a, ProcessorState>,
) -> (MutexGuard<'a, ProcessorState>, bool) {
    let Some(directive) = state.handling_queue.front().map(Arc::clone) else {
        return (state, false);
    };
    if state.is_handling_current {
        return (state, true);
    }
    state.is_handling_current = true;
    drop(state);
    let policy = inner.router.handle(Arc::clone(&directive));
    let mut state = inner.state.lock();

    if policy != Some(BlockingPolicy::Blocking) {
        state.is_handling_current = false;
        let head_unchanged = state
            .handling_queue
            .front()
            .is_some_and(|head| Arc::ptr_eq(head, &directive));
        if head_unchanged {
            state.handling_queue.pop_front();
        } else if policy.is_none() {
            let front = state
                .handling_queue
                .front()
                .map(|d| d.message_id().as_str())
                .unwrap_or("(empty)")
                .to_string();
            error!(
                expected = %directive.message_id(),
                front = %front,
                "handling queue head changed while dispatch was failing",
            );
        }
    }
    if policy.is_none() {
        warn!(message_id = %directive.message_id(), "router failed to handle directive");
        inner.queue_all_for_cancellation(&mut state);
    }
    (state, true)
}
