use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique id of a single directive, assigned by the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag shared by all directives belonging to one request/response round.
///
/// An empty tag on a processor means no dialog is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogRequestId(String);

impl DialogRequestId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl From<String> for DialogRequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DialogRequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DialogRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Envelope fields of a directive as they arrive from the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveHeader {
    pub namespace: String,
    pub name: String,
    pub message_id: MessageId,
    /// Absent on directives that are not part of a dialog round.
    #[serde(default)]
    pub dialog_request_id: DialogRequestId,
}

/// An immutable server-issued command addressed to a handler.
///
/// The dispatch core reads only `message_id` and `dialog_request_id`;
/// everything else is interpreted by the handler the router selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    pub header: DirectiveHeader,
    #[serde(default)]
    pub payload: Value,
}

impl Directive {
    pub fn new(header: DirectiveHeader, payload: Value) -> Self {
        Self { header, payload }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.header.message_id
    }

    pub fn dialog_request_id(&self) -> &DialogRequestId {
        &self.header.dialog_request_id
    }
}
