use alloy_primitives::B256;
use safe_types::UserOperationReceipt;
use tokio::sync::mpsc;

use crate::FlowError;

/// Which operation of a nested flow was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowPhase {
    /// The authorizing account's `approveHash` operation.
    Approval,
    /// The operation that moves the asset; also used by single-account flows.
    Execution,
}

/// State transitions of an execution flow, in emission order.
#[derive(Debug, Clone)]
pub enum FlowEvent {
    Preparing,
    Signing,
    SigningComplete,
    Sent { phase: FlowPhase, user_op_hash: B256 },
    Success { receipt: Box<UserOperationReceipt> },
    Error { error: FlowError },
}

impl FlowEvent {
    /// Variant name, handy for asserting event order.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowEvent::Preparing => "preparing",
            FlowEvent::Signing => "signing",
            FlowEvent::SigningComplete => "signing_complete",
            FlowEvent::Sent { .. } => "sent",
            FlowEvent::Success { .. } => "success",
            FlowEvent::Error { .. } => "error",
        }
    }
}

/// Sending half of a flow's event stream.
///
/// Emitting never blocks and never fails the flow: a dropped receiver just
/// stops observing.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<FlowEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FlowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: FlowEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
