use serde::Serialize;
use tokio::sync::broadcast;

use super::types::LoopExit;
use crate::task::TaskStatus;

/// Progress notifications. Nobody has to listen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoopEvent {
    CycleStarted {
        cycle: u32,
        task_id: String,
    },
    TaskStateChanged {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    ToolDispatched {
        task_id: String,
        command: String,
        status: String,
    },
    CycleFinished {
        cycle: u32,
    },
    LoopExited {
        cycles: u32,
        exit: LoopExit,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<LoopEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: LoopEvent) {
        let _ = self.tx.send(event);
    }
}
