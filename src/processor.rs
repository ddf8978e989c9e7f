//! The doubly-linked, priority-ordered chain node. [`Head`](crate::head::Head) and
//! [`Tail`](crate::tail::Tail) are built from the same [`ProcessorNode`], with the
//! downstream slot replaced by a dynamic source instead of a single `next` pointer.

use crate::capability::{Capability, optimize_array};
use crate::error::{ErrorPolicy, PipelineError, ProcessingError, PipelineEvent, Severity};
use crate::node::NodeIdentity;
use crate::shared::PipelineShared;
use smallvec::SmallVec;
use smol_str::SmolStr;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, Weak};

/// A processor's body: given the input and a handle to forward to whatever is
/// currently downstream, do some work and call `forward` zero or more times.
pub type ProcessorLogic<A> = dyn Fn(A, &dyn Fn(A)) + Send + Sync;

/// Where a node's relinked `output` comes from, beyond its own peek list.
pub(crate) enum Downstream<A> {
    /// The next node's `inline`, or nothing if this is presently the last node.
    Next(Option<Arc<ProcessorNode<A>>>),
    /// A dynamically computed set of targets, used by the tail to fan out to
    /// its registered outputs, switch, and stack.
    Dynamic(Box<dyn Fn() -> Vec<Capability<A>> + Send + Sync>),
}

pub(crate) struct Link<A> {
    pub(crate) prev: Option<Weak<ProcessorNode<A>>>,
    pub(crate) downstream: Downstream<A>,
    pub(crate) peekers: SmallVec<[Capability<A>; 4]>,
    pub(crate) output: Capability<A>,
    pub(crate) error_policy: Option<ErrorPolicy>,
}

pub struct ProcessorNode<A> {
    pub(crate) identity: NodeIdentity,
    logic: Arc<ProcessorLogic<A>>,
    pub(crate) shared: Mutex<Arc<PipelineShared>>,
    pub(crate) link: Mutex<Link<A>>,
}

impl<A: Clone + Send + Sync + 'static> ProcessorNode<A> {
    pub(crate) fn new(identity: NodeIdentity, logic: Arc<ProcessorLogic<A>>) -> Arc<Self> {
        Arc::new(Self {
            identity,
            logic,
            shared: Mutex::new(PipelineShared::new()),
            link: Mutex::new(Link {
                prev: None,
                downstream: Downstream::Next(None),
                peekers: SmallVec::new(),
                output: crate::capability::empty(),
                error_policy: None,
            }),
        })
    }

    pub fn name(&self) -> &SmolStr {
        self.identity.name()
    }

    pub fn id(&self) -> SmolStr {
        self.identity.id()
    }

    /// Rename this node's id, rejecting an empty one.
    pub fn set_id(&self, new: impl Into<SmolStr>) -> Result<(), PipelineError> {
        self.identity.set_id(new)
    }

    pub fn priority(&self) -> i32 {
        self.identity.priority()
    }

    pub fn is_enabled(&self) -> bool {
        self.identity.is_enabled()
    }

    pub(crate) fn pipeline_shared(&self) -> Arc<PipelineShared> {
        self.shared.lock().unwrap().clone()
    }

    /// The capability the previous node (or an input transformer) calls to feed
    /// this node.
    pub fn inline(self: &Arc<Self>) -> Capability<A> {
        let weak = Arc::downgrade(self);
        Arc::new(move |args: A| {
            if let Some(node) = weak.upgrade() {
                node.dispatch(args);
            }
        })
    }

    /// The current composed forwarding target: peekers, then whatever is downstream.
    pub fn output(&self) -> Capability<A> {
        self.link.lock().unwrap().output.clone()
    }

    fn effective_policy(&self) -> ErrorPolicy {
        let link = self.link.lock().unwrap();
        link.error_policy
            .unwrap_or_else(|| self.pipeline_shared().default_error_policy())
    }

    fn dispatch(self: &Arc<Self>, args: A) {
        if !self.is_enabled() {
            return;
        }
        let output = self.output();
        let forward = move |a: A| output(a);
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| (self.logic)(args.clone(), &forward)));
        if let Err(payload) = result {
            self.handle_failure(payload, args, &forward);
        }
    }

    fn handle_failure(self: &Arc<Self>, payload: Box<dyn Any + Send>, args: A, forward: &dyn Fn(A)) {
        let shared = self.pipeline_shared();
        match self.effective_policy() {
            ErrorPolicy::Propagate => self.report(&shared, payload, args, Severity::Error),
            ErrorPolicy::Suppress => {
                let err = ProcessingError::from_panic(self.id(), Severity::Warning, payload);
                tracing::warn!(processor = %err.processor, cause = %err.cause, "suppressed processing error");
            }
            ErrorPolicy::Retry => {
                let retry = std::panic::catch_unwind(AssertUnwindSafe(|| (self.logic)(args.clone(), forward)));
                if let Err(payload2) = retry {
                    self.report(&shared, payload2, args, Severity::Error);
                }
            }
            ErrorPolicy::Terminate => {
                shared.request_shutdown();
                self.report(&shared, payload, args, Severity::Fatal);
            }
        }
    }

    fn report(&self, shared: &PipelineShared, payload: Box<dyn Any + Send>, args: A, severity: Severity) {
        let data: Arc<dyn Any + Send + Sync> = Arc::new(args);
        let mut err = ProcessingError::from_panic(self.id(), severity, payload).with_data(data);
        err.extras.push((
            SmolStr::new("payload.type"),
            SmolStr::new(disqualified::ShortName::of::<A>().to_string()),
        ));
        let err = Arc::new(err);
        tracing::error!(processor = %err.processor, cause = %err.cause, ?severity, "processing error");
        shared.fire(PipelineEvent::PipelineError { error: err, severity });
    }

    /// Register a peeker that observes every value forwarded through this node.
    pub fn peek(self: &Arc<Self>, peeker: Capability<A>) -> &Arc<Self> {
        self.shared_clone().lock.write_voided(|| {
            self.link.lock().unwrap().peekers.push(peeker);
            self.relink();
        });
        self
    }

    fn shared_clone(&self) -> Arc<PipelineShared> {
        self.pipeline_shared()
    }

    /// As [`Self::peek`], returning a guard that deregisters the peeker on drop.
    pub fn peek_with_dereg(self: &Arc<Self>, peeker: Capability<A>) -> PeekGuard<A> {
        let index = self.shared_clone().lock.write_voided(|| {
            let mut link = self.link.lock().unwrap();
            link.peekers.push(peeker);
            let idx = link.peekers.len() - 1;
            drop(link);
            self.relink();
            idx
        });
        PeekGuard { node: self.clone(), index: Some(index) }
    }

    fn unregister_peek(self: &Arc<Self>, index: usize) {
        self.shared_clone().lock.write_voided(|| {
            let mut link = self.link.lock().unwrap();
            if index < link.peekers.len() {
                link.peekers.remove(index);
            }
            drop(link);
            self.relink();
        });
    }

    pub fn set_enabled(self: &Arc<Self>, enabled: bool) -> &Arc<Self> {
        let shared = self.shared_clone();
        shared.lock.write_voided(|| {
            self.identity.set_enabled(enabled);
            self.relink_from_neighbour();
            shared.fire(PipelineEvent::ProcessorEnabled { id: self.id(), enabled });
        });
        self
    }

    /// Low-level priority update: does *not* reorder this node relative to its
    /// siblings. [`crate::pipeline::Pipeline::set_processor_priority`] is the
    /// public entry point that also re-splices the chain to keep it sorted.
    pub(crate) fn set_priority_value(&self, new: i32) {
        self.identity.set_priority(new);
    }

    /// Override this node's error policy. `None` is rejected: there is no
    /// "unset" value to assign, only [`Self::clear_error_policy`] reverts to
    /// the pipeline's default.
    pub fn set_error_policy(&self, policy: Option<ErrorPolicy>) -> Result<(), PipelineError> {
        let Some(policy) = policy else {
            return Err(PipelineError::InvalidNullArgument("error_policy"));
        };
        self.link.lock().unwrap().error_policy = Some(policy);
        Ok(())
    }

    /// Revert this node to the pipeline's default error policy.
    pub fn clear_error_policy(&self) {
        self.link.lock().unwrap().error_policy = None;
    }

    /// Recompute `output` for this node from peekers and downstream, then walk
    /// upstream recomputing every ancestor's `output` in turn. Iterative, so an
    /// arbitrarily long chain never grows the stack.
    pub(crate) fn relink(self: &Arc<Self>) {
        let mut current = self.clone();
        loop {
            current.recompute_output();
            let prev = current.link.lock().unwrap().prev.as_ref().and_then(Weak::upgrade);
            match prev {
                Some(p) => current = p,
                None => break,
            }
        }
    }

    /// Ask the previous node to relink (used after this node's own downstream
    /// composition changed, e.g. enable/disable).
    fn relink_from_neighbour(self: &Arc<Self>) {
        self.relink();
    }

    fn recompute_output(&self) {
        let mut link = self.link.lock().unwrap();
        let mut slots: Vec<Option<Capability<A>>> = link.peekers.iter().cloned().map(Some).collect();
        match &link.downstream {
            Downstream::Next(next) => {
                let mut cursor = next.clone();
                loop {
                    match cursor.take() {
                        Some(n) => {
                            if n.is_enabled() {
                                slots.push(Some(n.inline()));
                                break;
                            }
                            cursor = n.next_arc();
                        }
                        None => break,
                    }
                }
            }
            Downstream::Dynamic(f) => {
                slots.extend(f().into_iter().map(Some));
            }
        }
        link.output = optimize_array(slots);
    }

    pub(crate) fn set_next(&self, next: Option<Arc<ProcessorNode<A>>>) {
        self.link.lock().unwrap().downstream = Downstream::Next(next);
    }

    pub(crate) fn set_prev(&self, prev: Option<Weak<ProcessorNode<A>>>) {
        self.link.lock().unwrap().prev = prev;
    }

    pub(crate) fn next_arc(self: &Arc<Self>) -> Option<Arc<ProcessorNode<A>>> {
        self.link.lock().unwrap().next_arc()
    }
}

impl<A> Link<A> {
    fn next_arc(&self) -> Option<Arc<ProcessorNode<A>>> {
        match &self.downstream {
            Downstream::Next(n) => n.clone(),
            Downstream::Dynamic(_) => None,
        }
    }
}

/// Deregisters its peeker when dropped, or explicitly via [`Self::unregister`].
pub struct PeekGuard<A> {
    node: Arc<ProcessorNode<A>>,
    index: Option<usize>,
}
impl<A: Clone + Send + Sync + 'static> PeekGuard<A> {
    pub fn unregister(mut self) {
        if let Some(index) = self.index.take() {
            self.node.unregister_peek(index);
        }
    }
}
impl<A: Clone + Send + Sync + 'static> Drop for PeekGuard<A> {
    fn drop(&mut self) {
        if let Some(index) = self.index.take() {
            self.node.unregister_peek(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeIdentity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn passthrough() -> Arc<ProcessorLogic<i32>> {
        Arc::new(|args: i32, forward: &dyn Fn(i32)| forward(args))
    }

    #[test]
    fn single_node_chain_forwards_to_tail_stub() {
        let node = ProcessorNode::new(NodeIdentity::new("n", 10), passthrough());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let tail: Capability<i32> = Arc::new(move |v: i32| {
            seen2.fetch_add(v as usize, Ordering::SeqCst);
        });
        node.set_next(None);
        node.link.lock().unwrap().downstream = Downstream::Dynamic(Box::new(move || vec![tail.clone()]));
        node.relink();
        node.inline()(5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn disabled_node_does_not_dispatch() {
        let node = ProcessorNode::new(NodeIdentity::new("n", 10), passthrough());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        node.link.lock().unwrap().downstream =
            Downstream::Dynamic(Box::new(move || vec![Arc::new({
                let seen2 = seen2.clone();
                move |v: i32| { seen2.fetch_add(v as usize, Ordering::SeqCst); }
            }) as Capability<i32>]));
        node.relink();
        node.set_enabled(false);
        node.inline()(5);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn set_error_policy_rejects_none() {
        let node = ProcessorNode::new(NodeIdentity::new("n", 10), passthrough());
        let err = node.set_error_policy(None).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidNullArgument("error_policy")));
        node.set_error_policy(Some(ErrorPolicy::Suppress)).unwrap();
        node.clear_error_policy();
    }

    #[test]
    fn set_id_rejects_empty() {
        let node = ProcessorNode::new(NodeIdentity::new("n", 10), passthrough());
        let original = node.id();
        let err = node.set_id("").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidNullArgument("id")));
        assert_eq!(node.id(), original);
        node.set_id("renamed").unwrap();
        assert_eq!(node.id(), "renamed");
    }
}
