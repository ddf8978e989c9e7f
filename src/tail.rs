//! The pipeline's single exit terminal: fans out to registered output
//! transformers, honoring an optional switch and/or stack override.

use crate::error::PipelineError;
use crate::node::{NodeIdentity, TAIL_PRIORITY};
use crate::output::{OutputTransformer, Stack, Switch};
use crate::processor::{Downstream, ProcessorNode};
use crate::shared::PipelineShared;
use smol_str::SmolStr;
use std::sync::{Arc, Mutex};

pub struct Tail<A> {
    pub(crate) node: Arc<ProcessorNode<A>>,
    plain: Mutex<Vec<Arc<OutputTransformer<A>>>>,
    pub switch: Switch<A>,
    pub stack: Stack<A>,
}

impl<A: Clone + Send + Sync + 'static> Tail<A> {
    pub(crate) fn new() -> Arc<Self> {
        let node = ProcessorNode::new(
            NodeIdentity::new("tail", TAIL_PRIORITY),
            Arc::new(|args: A, forward: &dyn Fn(A)| forward(args)),
        );
        let tail = Arc::new(Self {
            node,
            plain: Mutex::new(Vec::new()),
            switch: Switch::new(),
            stack: Stack::new(),
        });
        tail.install_dynamic_downstream();
        let weak = Arc::downgrade(&tail);
        let hook: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            if let Some(tail) = weak.upgrade() {
                tail.node.relink();
            }
        });
        tail.switch.set_relink_hook(hook.clone());
        tail.stack.set_relink_hook(hook);
        tail
    }

    fn install_dynamic_downstream(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.node.link.lock().unwrap().downstream = Downstream::Dynamic(Box::new(move || {
            weak.upgrade().map(|tail| tail.active_targets()).unwrap_or_default()
        }));
    }

    fn active_targets(&self) -> Vec<crate::capability::Capability<A>> {
        let mut targets: Vec<_> = self.plain.lock().unwrap().iter().map(|o| o.capability()).collect();
        if let Some(t) = self.switch.active_target() {
            targets.push(t);
        }
        if let Some(t) = self.stack.active_target() {
            targets.push(t);
        }
        targets
    }

    /// The single target most representative of what the tail would currently
    /// deliver to, for diagnostics only: the stack's top takes precedence over
    /// the switch's selection, which takes precedence over plain fan-out.
    pub fn active_output(&self) -> Option<SmolStr> {
        if let Some(top) = self.stack.top_id() {
            return Some(top);
        }
        if let Some(sel) = self.switch.selected() {
            return Some(sel);
        }
        self.plain.lock().unwrap().first().map(|o| o.id().clone())
    }

    pub(crate) fn set_shared(&self, shared: Arc<PipelineShared>) {
        *self.node.shared.lock().unwrap() = shared;
    }

    pub(crate) fn relink(self: &Arc<Self>) {
        self.node.relink();
    }

    pub fn register_output(self: &Arc<Self>, output: Arc<OutputTransformer<A>>) -> Result<(), PipelineError> {
        let shared = self.node.pipeline_shared();
        shared.lock.write_result(|| {
            let mut plain = self.plain.lock().unwrap();
            if plain.iter().any(|o| o.id() == output.id()) {
                return Err(PipelineError::DuplicateOutput(output.id().clone()));
            }
            plain.push(output);
            drop(plain);
            self.relink();
            Ok(())
        })
    }

    pub fn remove_output(self: &Arc<Self>, id: &str) -> Result<(), PipelineError> {
        let shared = self.node.pipeline_shared();
        shared.lock.write_result(|| {
            let mut plain = self.plain.lock().unwrap();
            let before = plain.len();
            plain.retain(|o| o.id() != id);
            if plain.len() == before {
                return Err(PipelineError::OutputNotFound(SmolStr::new(id)));
            }
            drop(plain);
            self.relink();
            Ok(())
        })
    }

    pub fn outputs(&self) -> Vec<SmolStr> {
        self.plain.lock().unwrap().iter().map(|o| o.id().clone()).collect()
    }
}
