#![deny(clippy::wildcard_imports)]

mod error;
mod processor;
mod registry;
mod router;
mod sink;

pub use error::{IngestError, IngestOutcome};
pub use processor::DirectiveProcessor;
pub use registry::{ProcessorHandle, ProcessorRegistry};
pub use router::DirectiveRouter;
pub use sink::HandlerResultSink;

#[cfg(test)]
mod tests;
