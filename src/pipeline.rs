//! The pipeline container: ordering, relink, lifecycle, event fan-out, and the
//! attribute map.

use crate::error::{ErrorPolicy, Listener, PipelineError, PipelineEvent};
use crate::head::Head;
use crate::node::{NodeIdentity, USER_PRIORITY_RANGE};
use crate::processor::{ProcessorLogic, ProcessorNode};
use crate::shared::PipelineShared;
use crate::tail::Tail;
use litemap::LiteMap;
use smol_str::SmolStr;
use std::any::Any;
use std::sync::{Arc, Mutex};

/// A named, typed value in a pipeline's attribute map.
#[derive(Clone)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(SmolStr),
    Opaque(Arc<dyn Any + Send + Sync>),
}

/// A dynamically reconfigurable dataflow pipeline: one head, one tail, and a
/// priority-ordered chain of processors between them, all sharing one
/// reentrant-on-write lock.
pub struct Pipeline<A> {
    shared: Mutex<Arc<PipelineShared>>,
    head: Arc<Head<A>>,
    tail: Arc<Tail<A>>,
    processors: Mutex<Vec<Arc<ProcessorNode<A>>>>,
    attributes: Mutex<LiteMap<SmolStr, AttributeValue>>,
    closed: Mutex<bool>,
}

impl<A: Clone + Send + Sync + 'static> Pipeline<A> {
    pub fn new() -> Arc<Self> {
        let shared = PipelineShared::new();
        let head = Head::new();
        let tail = Tail::new();
        head.set_shared(shared.clone());
        tail.set_shared(shared.clone());
        head.set_next(Some(tail.node.clone()));
        tail.node.set_prev(Some(Arc::downgrade(&head.node)));
        head.relink();
        Arc::new(Self {
            shared: Mutex::new(shared),
            head,
            tail,
            processors: Mutex::new(Vec::new()),
            attributes: Mutex::new(LiteMap::new()),
            closed: Mutex::new(false),
        })
    }

    fn shared(&self) -> Arc<PipelineShared> {
        self.shared.lock().unwrap().clone()
    }

    pub fn head(&self) -> &Arc<Head<A>> {
        &self.head
    }

    pub fn tail(&self) -> &Arc<Tail<A>> {
        &self.tail
    }

    fn ensure_open(&self) -> Result<(), PipelineError> {
        if *self.closed.lock().unwrap() {
            Err(PipelineError::PipelineClosed)
        } else {
            Ok(())
        }
    }

    /// Build and insert a new processor at `priority`, wiring it into the chain
    /// immediately before the first existing processor (or the tail) whose
    /// `(priority, insertion_order)` sorts after it.
    pub fn add_processor(
        self: &Arc<Self>,
        name: impl Into<SmolStr>,
        priority: i32,
        logic: Arc<ProcessorLogic<A>>,
    ) -> Result<Arc<ProcessorNode<A>>, PipelineError> {
        if !USER_PRIORITY_RANGE.contains(&priority) {
            return Err(PipelineError::InvalidPriority(priority));
        }
        let shared = self.shared();
        let node = ProcessorNode::new(NodeIdentity::new(name, priority), logic);
        *node.shared.lock().unwrap() = shared.clone();
        let id = node.id();
        shared.lock.write_result(|| -> Result<(), PipelineError> {
            self.ensure_open()?;
            let mut processors = self.processors.lock().unwrap();
            if processors.iter().any(|p| p.id() == id) {
                return Err(PipelineError::AlreadyAttached(id.clone()));
            }
            let insert_at = processors
                .iter()
                .position(|p| p.identity.sort_key() > node.identity.sort_key())
                .unwrap_or(processors.len());

            let prev = if insert_at == 0 { self.head.node.clone() } else { processors[insert_at - 1].clone() };
            let next = processors.get(insert_at).cloned().unwrap_or_else(|| self.tail.node.clone());

            node.set_prev(Some(Arc::downgrade(&prev)));
            node.set_next(Some(next.clone()));
            prev.set_next(Some(node.clone()));
            next.set_prev(Some(Arc::downgrade(&node)));

            processors.insert(insert_at, node.clone());
            drop(processors);
            node.relink();
            shared.fire(PipelineEvent::ProcessorAdded { id: id.clone() });
            Ok(())
        })?;
        Ok(node)
    }

    pub fn remove_processor(self: &Arc<Self>, id: &str) -> Result<(), PipelineError> {
        let shared = self.shared();
        shared.lock.write_result(|| -> Result<(), PipelineError> {
            self.ensure_open()?;
            let mut processors = self.processors.lock().unwrap();
            let index = processors
                .iter()
                .position(|p| p.id() == id)
                .ok_or_else(|| PipelineError::OutputNotFound(SmolStr::new(id)))?;
            let node = processors.remove(index);
            let prev = if index == 0 { self.head.node.clone() } else { processors[index - 1].clone() };
            let next = processors.get(index).cloned().unwrap_or_else(|| self.tail.node.clone());
            prev.set_next(Some(next.clone()));
            next.set_prev(Some(Arc::downgrade(&prev)));
            drop(processors);
            prev.relink();
            // detach: give the removed node a fresh private pipeline state
            *node.shared.lock().unwrap() = PipelineShared::new();
            node.set_prev(None);
            node.set_next(None);
            shared.fire(PipelineEvent::ProcessorRemoved { id: SmolStr::new(id) });
            Ok(())
        })
    }

    /// Change a processor's priority and re-splice it into the chain so the
    /// `(priority, insertion_order)` ordering invariant keeps holding.
    pub fn set_processor_priority(self: &Arc<Self>, id: &str, new: i32) -> Result<(), PipelineError> {
        if !USER_PRIORITY_RANGE.contains(&new) {
            return Err(PipelineError::InvalidPriority(new));
        }
        let shared = self.shared();
        shared.lock.write_result(|| -> Result<(), PipelineError> {
            self.ensure_open()?;
            let mut processors = self.processors.lock().unwrap();
            let old_index = processors
                .iter()
                .position(|p| p.id() == id)
                .ok_or_else(|| PipelineError::OutputNotFound(SmolStr::new(id)))?;
            let node = processors.remove(old_index);
            let prev = if old_index == 0 { self.head.node.clone() } else { processors[old_index - 1].clone() };
            let next = processors.get(old_index).cloned().unwrap_or_else(|| self.tail.node.clone());
            prev.set_next(Some(next.clone()));
            next.set_prev(Some(Arc::downgrade(&prev)));

            node.set_priority_value(new);
            let insert_at = processors
                .iter()
                .position(|p| p.identity.sort_key() > node.identity.sort_key())
                .unwrap_or(processors.len());
            let new_prev = if insert_at == 0 { self.head.node.clone() } else { processors[insert_at - 1].clone() };
            let new_next = processors.get(insert_at).cloned().unwrap_or_else(|| self.tail.node.clone());
            node.set_prev(Some(Arc::downgrade(&new_prev)));
            node.set_next(Some(new_next.clone()));
            new_prev.set_next(Some(node.clone()));
            new_next.set_prev(Some(Arc::downgrade(&node)));

            processors.insert(insert_at, node.clone());
            drop(processors);
            prev.relink();
            node.relink();
            Ok(())
        })
    }

    pub fn processor(&self, id: &str) -> Option<Arc<ProcessorNode<A>>> {
        self.processors.lock().unwrap().iter().find(|p| p.id() == id).cloned()
    }

    pub fn processors(&self) -> Vec<Arc<ProcessorNode<A>>> {
        self.processors.lock().unwrap().clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.shared().add_listener(listener);
    }

    pub fn set_default_error_policy(&self, policy: ErrorPolicy) {
        self.shared().set_default_error_policy(policy);
    }

    pub fn default_error_policy(&self) -> ErrorPolicy {
        self.shared().default_error_policy()
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shared().shutdown_requested()
    }

    /// Set an attribute, firing `AttributeChanged` unconditionally — even when
    /// the new value equals the old one.
    pub fn set_attribute(&self, name: impl Into<SmolStr>, value: AttributeValue) {
        let name = name.into();
        let shared = self.shared();
        shared.lock.write_voided(|| {
            let old = self.attributes.lock().unwrap().insert(name.clone(), value.clone());
            shared.fire(PipelineEvent::AttributeChanged { name: name.clone(), old, new: Some(value.clone()) });
        });
    }

    pub fn remove_attribute(&self, name: &str) {
        let shared = self.shared();
        shared.lock.write_voided(|| {
            let old = self.attributes.lock().unwrap().remove(name);
            shared.fire(PipelineEvent::AttributeChanged { name: SmolStr::new(name), old, new: None });
        });
    }

    pub fn get_attribute(&self, name: &str) -> Option<AttributeValue> {
        self.attributes.lock().unwrap().get(name).cloned()
    }

    /// Disable every node, clear listeners, and release transformer references.
    /// A closed pipeline rejects further structural mutation.
    pub fn close(&self) {
        let shared = self.shared();
        shared.lock.write_voided(|| {
            *self.closed.lock().unwrap() = true;
            for p in self.processors.lock().unwrap().iter() {
                p.set_enabled(false);
            }
        });
        shared.clear_listeners();
    }
}
