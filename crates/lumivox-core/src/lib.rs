pub mod directive;
pub mod policy;

pub use directive::{DialogRequestId, Directive, DirectiveHeader, MessageId};
pub use policy::BlockingPolicy;
