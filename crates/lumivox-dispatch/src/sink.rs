use std::sync::Arc;

use tracing::debug;

use lumivox_core::MessageId;

use crate::registry::{ProcessorHandle, ProcessorRegistry};

/// Capability a handler uses to report the outcome of one directive.
///
/// The sink does not own its processor; it carries only a registry handle
/// and the message id. A handler thread may therefore call it at any time,
/// including after the processor has shut down, and the call degrades to a
/// logged no-op.
#[derive(Clone)]
pub struct HandlerResultSink {
    registry: Arc<ProcessorRegistry>,
    handle: ProcessorHandle,
    message_id: MessageId,
}

impl HandlerResultSink {
    pub(crate) fn new(
        registry: Arc<ProcessorRegistry>,
        handle: ProcessorHandle,
        message_id: MessageId,
    ) -> Self {
        Self {
            registry,
            handle,
            message_id,
        }
    }

    /// Message id of the directive this sink reports for.
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Reports that the handler finished this directive.
    pub fn mark_completed(&self) {
        let delivered = self.registry.with_processor(self.handle, |processor| {
            processor.on_handling_completed(&self.message_id);
        });
        if !delivered {
            debug!(
                message_id = %self.message_id,
                "completion ignored, processor already shut down",
            );
        }
    }

    /// Reports that the handler gave up on this directive. The processor
    /// responds by canceling every sibling directive still in flight in
    /// the same dialog.
    pub fn mark_failed(&self, description: &str) {
        let delivered = self.registry.with_processor(self.handle, |processor| {
            processor.on_handling_failed(&self.message_id, description);
        });
        if !delivered {
            debug!(
                message_id = %self.message_id,
                description,
                "failure report ignored, processor already shut down",
            );
        }
    }
}
