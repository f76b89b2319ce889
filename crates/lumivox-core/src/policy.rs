use serde::{Deserialize, Serialize};

/// How a handled directive gates dispatch of its successors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingPolicy {
    /// The directive is complete as soon as the handler's dispatch returns;
    /// no completion callback is expected.
    #[default]
    None,
    /// Completion arrives asynchronously, but successors may dispatch
    /// immediately.
    NonBlocking,
    /// Successors must not dispatch until the handler reports completion.
    Blocking,
}

impl BlockingPolicy {
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Blocking)
    }
}
