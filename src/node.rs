//! Node identity shared by processors, head, and tail.

use crate::error::PipelineError;
use smol_str::SmolStr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Mutex;

/// Priority sentinel placing the head before every user processor.
pub const HEAD_PRIORITY: i32 = i32::MIN;
/// Priority sentinel placing the tail after every user processor.
pub const TAIL_PRIORITY: i32 = i32::MAX;
/// Inclusive range of priorities available to user-added processors.
pub const USER_PRIORITY_RANGE: std::ops::RangeInclusive<i32> = 0..=100;

static NEXT_INSERTION_ORDER: AtomicU64 = AtomicU64::new(0);

/// Monotonically increasing counter used to break priority ties in insertion order.
pub fn next_insertion_order() -> u64 {
    NEXT_INSERTION_ORDER.fetch_add(1, Ordering::Relaxed)
}

/// Shared identity fields common to every node kind in a pipeline.
#[derive(Debug)]
pub struct NodeIdentity {
    name: SmolStr,
    id: Mutex<SmolStr>,
    priority: AtomicI32,
    insertion_order: u64,
    enabled: AtomicBool,
}

impl NodeIdentity {
    pub fn new(name: impl Into<SmolStr>, priority: i32) -> Self {
        let name = name.into();
        let id = SmolStr::new(format!("{name}:{priority}"));
        Self {
            name,
            id: Mutex::new(id),
            priority: AtomicI32::new(priority),
            insertion_order: next_insertion_order(),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn with_id(self, id: impl Into<SmolStr>) -> Self {
        *self.id.lock().unwrap() = id.into();
        self
    }

    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    pub fn id(&self) -> SmolStr {
        self.id.lock().unwrap().clone()
    }

    /// Rename this node's id, rejecting an empty one.
    pub fn set_id(&self, new: impl Into<SmolStr>) -> Result<(), PipelineError> {
        let new = new.into();
        if new.is_empty() {
            return Err(PipelineError::InvalidNullArgument("id"));
        }
        *self.id.lock().unwrap() = new;
        Ok(())
    }

    pub fn priority(&self) -> i32 {
        self.priority.load(Ordering::SeqCst)
    }

    pub fn set_priority(&self, new: i32) {
        self.priority.store(new, Ordering::SeqCst);
    }

    pub fn insertion_order(&self) -> u64 {
        self.insertion_order
    }

    /// Sort key enforcing `(priority, insertion_order)` ordering.
    pub fn sort_key(&self) -> (i32, u64) {
        (self.priority(), self.insertion_order)
    }
}
