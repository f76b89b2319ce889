use std::sync::Arc;

use lumivox_core::{BlockingPolicy, Directive};

use crate::sink::HandlerResultSink;

/// Routing layer that owns the handler table.
///
/// Implementations are called from two threads concurrently: the ingest
/// caller runs `pre_handle`, the processing worker runs `handle` and
/// `cancel`.
pub trait DirectiveRouter: Send + Sync {
    /// First stage: a handler registers interest in the directive and keeps
    /// the sink to report the outcome later. Returns false if no handler
    /// accepts the directive. May be slow, but must not call back into the
    /// processor synchronously.
    fn pre_handle(&self, directive: Arc<Directive>, sink: HandlerResultSink) -> bool;

    /// Second stage: begin executing the directive. Returns the blocking
    /// policy on success, `None` if dispatch failed. A directive handled
    /// with [`BlockingPolicy::None`] is complete once this call returns; a
    /// later sink call for it is ignored.
    fn handle(&self, directive: Arc<Directive>) -> Option<BlockingPolicy>;

    /// Aborts work previously accepted for this directive. Must be
    /// idempotent.
    fn cancel(&self, directive: Arc<Directive>);
}
