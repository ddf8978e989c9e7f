//! State shared by every node currently attached to the same pipeline: the
//! reentrant lock, the listener set, and the default error policy. A detached
//! node gets a fresh, private instance of this on removal.

use crate::error::{ErrorPolicy, Listener, PipelineEvent, fire_event};
use crate::lock::PipelineLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct PipelineShared {
    pub lock: PipelineLock,
    listeners: Mutex<Vec<Arc<dyn Listener>>>,
    default_error_policy: Mutex<ErrorPolicy>,
    shutdown_requested: AtomicBool,
}

impl PipelineShared {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    pub fn clear_listeners(&self) {
        self.listeners.lock().unwrap().clear();
    }

    pub fn default_error_policy(&self) -> ErrorPolicy {
        *self.default_error_policy.lock().unwrap()
    }

    pub fn set_default_error_policy(&self, policy: ErrorPolicy) {
        *self.default_error_policy.lock().unwrap() = policy;
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn fire(&self, event: PipelineEvent) {
        let listeners = self.listeners.lock().unwrap().clone();
        fire_event(&listeners, &event);
    }
}
