//! The pipeline's single entry terminal: aggregates attached input transformers
//! and forwards into the processor chain.

use crate::capability::Capability;
use crate::node::{HEAD_PRIORITY, NodeIdentity};
use crate::processor::{Downstream, ProcessorNode};
use crate::shared::PipelineShared;
use smol_str::SmolStr;
use std::sync::{Arc, Mutex};

/// The head terminal. Has no predecessor; its `inline` is never called directly —
/// input transformers call its [`Head::dispatch_target`] instead, which is kept in
/// sync by the same relink machinery as a regular processor.
pub struct Head<A> {
    pub(crate) node: Arc<ProcessorNode<A>>,
    transformers: Mutex<Vec<SmolStr>>,
}

impl<A: Clone + Send + Sync + 'static> Head<A> {
    pub(crate) fn new() -> Arc<Self> {
        let node = ProcessorNode::new(
            NodeIdentity::new("head", HEAD_PRIORITY),
            Arc::new(|args: A, forward: &dyn Fn(A)| forward(args)),
        );
        Arc::new(Self { node, transformers: Mutex::new(Vec::new()) })
    }

    pub(crate) fn set_next(&self, next: Option<Arc<ProcessorNode<A>>>) {
        self.node.link.lock().unwrap().downstream = Downstream::Next(next);
    }

    pub(crate) fn set_shared(&self, shared: Arc<PipelineShared>) {
        *self.node.shared.lock().unwrap() = shared;
    }

    /// The capability an attached input transformer should push values into.
    pub fn dispatch_target(&self) -> Capability<A> {
        self.node.output()
    }

    pub(crate) fn relink(self: &Arc<Self>) {
        self.node.relink();
    }

    pub(crate) fn note_attached(&self, id: SmolStr) {
        self.transformers.lock().unwrap().push(id);
    }

    pub(crate) fn note_detached(&self, id: &SmolStr) {
        self.transformers.lock().unwrap().retain(|t| t != id);
    }

    pub fn attached_transformers(&self) -> Vec<SmolStr> {
        self.transformers.lock().unwrap().clone()
    }
}
