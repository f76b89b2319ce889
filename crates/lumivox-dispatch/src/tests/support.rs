use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use lumivox_core::{BlockingPolicy, DialogRequestId, Directive, DirectiveHeader, MessageId};

use crate::router::DirectiveRouter;
use crate::sink::HandlerResultSink;

/// Gap after which a call stream is considered quiet.
pub(crate) const IDLE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RouterCall {
    PreHandle { message_id: MessageId },
    Handle { message_id: MessageId },
    Cancel { message_id: MessageId },
}

#[derive(Default)]
struct RouterConfig {
    rejected: HashSet<MessageId>,
    failing: HashSet<MessageId>,
    policies: HashMap<MessageId, BlockingPolicy>,
    pre_handle_gates: HashMap<MessageId, Receiver<()>>,
}

/// Scripted router that records every call into a channel.
///
/// Policies default to non-blocking. Sinks received at pre-handle are kept
/// so tests can drive completion and failure from "handler" threads.
pub(crate) struct FakeRouter {
    calls_tx: Sender<RouterCall>,
    calls_rx: Receiver<RouterCall>,
    config: Mutex<RouterConfig>,
    sinks: Mutex<HashMap<MessageId, HandlerResultSink>>,
}

impl FakeRouter {
    pub(crate) fn new() -> Self {
        let (calls_tx, calls_rx) = crossbeam_channel::unbounded();
        Self {
            calls_tx,
            calls_rx,
            config: Mutex::new(RouterConfig::default()),
            sinks: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn set_policy(&self, message_id: &str, policy: BlockingPolicy) {
        self.config
            .lock()
            .policies
            .insert(MessageId::from(message_id), policy);
    }

    pub(crate) fn reject_pre_handle(&self, message_id: &str) {
        self.config
            .lock()
            .rejected
            .insert(MessageId::from(message_id));
    }

    pub(crate) fn fail_handle(&self, message_id: &str) {
        self.config
            .lock()
            .failing
            .insert(MessageId::from(message_id));
    }

    /// Makes the next pre-handle for `message_id` park until the returned
    /// sender fires (or is dropped).
    pub(crate) fn hold_pre_handle(&self, message_id: &str) -> Sender<()> {
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        self.config
            .lock()
            .pre_handle_gates
            .insert(MessageId::from(message_id), release_rx);
        release_tx
    }

    /// Sink captured for `message_id` at pre-handle time.
    pub(crate) fn sink(&self, message_id: &str) -> HandlerResultSink {
        self.sinks
            .lock()
            .get(&MessageId::from(message_id))
            .cloned()
            .expect("no sink captured for message id")
    }

    /// Collects recorded calls until the stream stays quiet for `idle`.
    pub(crate) fn drain_calls(&self, idle: Duration) -> Vec<RouterCall> {
        let mut calls = Vec::new();
        while let Ok(call) = self.calls_rx.recv_timeout(idle) {
            calls.push(call);
        }
        calls
    }

    pub(crate) fn expect_idle(&self) {
        let calls = self.drain_calls(IDLE);
        assert!(calls.is_empty(), "expected no router calls, got {calls:?}");
    }
}

impl DirectiveRouter for FakeRouter {
    fn pre_handle(&self, directive: Arc<Directive>, sink: HandlerResultSink) -> bool {
        let message_id = directive.message_id().clone();
        let accepted = !self.config.lock().rejected.contains(&message_id);
        if accepted {
            self.sinks.lock().insert(message_id.clone(), sink);
        }
        self.calls_tx
            .send(RouterCall::PreHandle {
                message_id: message_id.clone(),
            })
            .expect("call channel closed");
        let gate = self.config.lock().pre_handle_gates.remove(&message_id);
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        accepted
    }

    fn handle(&self, directive: Arc<Directive>) -> Option<BlockingPolicy> {
        let message_id = directive.message_id().clone();
        let config = self.config.lock();
        let policy = if config.failing.contains(&message_id) {
            None
        } else {
            Some(
                config
                    .policies
                    .get(&message_id)
                    .copied()
                    .unwrap_or(BlockingPolicy::NonBlocking),
            )
        };
        drop(config);
        self.calls_tx
            .send(RouterCall::Handle { message_id })
            .expect("call channel closed");
        policy
    }

    fn cancel(&self, directive: Arc<Directive>) {
        self.calls_tx
            .send(RouterCall::Cancel {
                message_id: directive.message_id().clone(),
            })
            .expect("call channel closed");
    }
}

pub(crate) fn directive(message_id: &str, dialog_request_id: &str) -> Arc<Directive> {
    Arc::new(Directive::new(
        DirectiveHeader {
            namespace: "SpeechSynthesizer".to_string(),
            name: "Speak".to_string(),
            message_id: MessageId::from(message_id),
            dialog_request_id: DialogRequestId::from(dialog_request_id),
        },
        serde_json::json!({}),
    ))
}

pub(crate) fn ids(message_ids: &[&str]) -> Vec<MessageId> {
    message_ids.iter().copied().map(MessageId::from).collect()
}

pub(crate) fn pre_handles(calls: &[RouterCall]) -> Vec<MessageId> {
    calls
        .iter()
        .filter_map(|call| match call {
            RouterCall::PreHandle { message_id } => Some(message_id.clone()),
            _ => None,
        })
        .collect()
}

pub(crate) fn handles(calls: &[RouterCall]) -> Vec<MessageId> {
    calls
        .iter()
        .filter_map(|call| match call {
            RouterCall::Handle { message_id } => Some(message_id.clone()),
            _ => None,
        })
        .collect()
}

pub(crate) fn cancels(calls: &[RouterCall]) -> Vec<MessageId> {
    calls
        .iter()
        .filter_map(|call| match call {
            RouterCall::Cancel { message_id } => Some(message_id.clone()),
            _ => None,
        })
        .collect()
}
