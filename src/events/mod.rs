//! Network events and the observer bus.
//!
//! Listeners run synchronously in registration order. A listener that panics is
//! logged and skipped; the remaining listeners still receive the event.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::log_error;
use crate::logging::structured::LogContext;
use crate::model::{LifecycleStatus, RegionLabel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NetworkEvent {
    #[serde(rename_all = "camelCase")]
    DeviceRegistered { device_id: String, owner: String },
    #[serde(rename_all = "camelCase")]
    TelemetryAccepted {
        device_id: String,
        reward: u64,
        region: RegionLabel,
    },
    #[serde(rename_all = "camelCase")]
    TelemetryRejected { device_id: String, reason: String },
    #[serde(rename_all = "camelCase")]
    MigrationCompleted {
        run_id: String,
        success_count: usize,
        failure_count: usize,
        deferred_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    AgreementChanged {
        agreement_id: String,
        version: u64,
        status: LifecycleStatus,
    },
    #[serde(rename_all = "camelCase")]
    ContractChanged {
        contract_id: String,
        version: u64,
        status: LifecycleStatus,
    },
}

pub trait Listener: Send + Sync {
    fn on_event(&self, event: &NetworkEvent);
}

#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn Listener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn emit(&self, event: NetworkEvent) {
        // Snapshot so a listener may subscribe others without deadlocking.
        let listeners: Vec<Arc<dyn Listener>> = self.listeners.read().clone();
        for (index, listener) in listeners.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))).is_err() {
                log_error!(LogContext::new("events"), "LISTENER_PANICKED", index = index, event = event);
            }
        }
    }
}

/// Buffers events for callers that poll.
#[derive(Debug, Default)]
pub struct QueueListener {
    queue: Mutex<VecDeque<NetworkEvent>>,
}

impl QueueListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<NetworkEvent> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Listener for QueueListener {
    fn on_event(&self, event: &NetworkEvent) {
        self.queue.lock().push_back(event.clone());
    }
}
