//! Typed errors and outcomes for the directive ingest surface.
//!
//! Routine conditions (a directive from a stale dialog) are not errors; they
//! are reported through [`IngestOutcome`]. Hard failures that the ingest
//! caller must distinguish are covered by [`IngestError`].

use thiserror::Error;

use lumivox_core::MessageId;

/// Outcome of a successful ingest call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A handler accepted the directive; it is queued for dispatch.
    Queued,
    /// The directive belongs to a different dialog and was discarded.
    DroppedStale,
}

/// Errors produced by the directive ingest surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    /// Ingest was called after shutdown began.
    #[error("processor is shutting down")]
    ShuttingDown,
    /// No handler accepted the directive during pre-handling.
    #[error("no handler accepted directive {message_id}")]
    Rejected {
        /// Message id of the rejected directive.
        message_id: MessageId,
    },
    /// A directive with the same message id is already being processed.
    #[error("directive {message_id} is already being processed")]
    DuplicateMessageId {
        /// Message id that is already tracked.
        message_id: MessageId,
    },
}
