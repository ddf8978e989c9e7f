//! Bridges an external producer type into the pipeline's payload type.

use crate::capability::Capability;
use crate::head::Head;
use crate::proxy::lockable_proxy;
use smol_str::SmolStr;
use std::sync::{Arc, Mutex, Weak};

/// Builds the external-facing `IN` value given a supplier of the head's current
/// dispatch target. Called once, at attach time.
pub trait InputMapper<IN, A>: Send + Sync {
    fn build(&self, supplier: DispatchSupplier<A>) -> IN;
}

/// A handle an [`InputMapper`] can call at any time to fetch the head's current
/// (lock-proxied) dispatch target, without needing to re-attach on every relink.
#[derive(Clone)]
pub struct DispatchSupplier<A> {
    head: Weak<Head<A>>,
}
impl<A: Clone + Send + Sync + 'static> DispatchSupplier<A> {
    pub fn get(&self) -> Capability<A> {
        match self.head.upgrade() {
            Some(head) => lockable_proxy(head.dispatch_target(), head.node.pipeline_shared()),
            None => crate::capability::empty(),
        }
    }
}

struct PassthroughMapper;
impl<A: Clone + Send + Sync + 'static> InputMapper<Capability<A>, A> for PassthroughMapper {
    fn build(&self, supplier: DispatchSupplier<A>) -> Capability<A> {
        Arc::new(move |args: A| (supplier.get())(args))
    }
}

/// An input boundary node: holds whatever `IN`-typed bridge was built for it, and
/// a weak link back to the head it's attached to.
pub struct InputTransformer<IN, A> {
    identity_name: SmolStr,
    identity_id: SmolStr,
    mapper: Arc<dyn InputMapper<IN, A>>,
    attached: Mutex<Option<(Weak<Head<A>>, IN)>>,
}

impl<A: Clone + Send + Sync + 'static> InputTransformer<Capability<A>, A> {
    /// Construct a pass-through transformer: `IN` is exactly `Capability<A>`.
    pub fn passthrough(name: impl Into<SmolStr>) -> Arc<Self> {
        Self::mapped(name, Arc::new(PassthroughMapper))
    }
}

impl<IN: Clone + Send + Sync + 'static, A: Clone + Send + Sync + 'static> InputTransformer<IN, A> {
    /// Construct a mapped transformer using an [`InputMapper`] to bridge an
    /// arbitrary external type.
    pub fn mapped(name: impl Into<SmolStr>, mapper: Arc<dyn InputMapper<IN, A>>) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            identity_id: name.clone(),
            identity_name: name,
            mapper,
            attached: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &SmolStr {
        &self.identity_name
    }

    pub fn id(&self) -> &SmolStr {
        &self.identity_id
    }

    pub fn is_attached(&self) -> bool {
        self.attached.lock().unwrap().is_some()
    }

    /// The bridge value external code should use to feed the pipeline, valid
    /// until [`Self::detach`].
    pub fn inline(&self) -> Option<IN> {
        self.attached.lock().unwrap().as_ref().map(|(_, inline)| inline.clone())
    }

    /// Attach this transformer to `head`, building its external-facing bridge.
    pub fn attach(self: &Arc<Self>, head: &Arc<Head<A>>) {
        let supplier = DispatchSupplier { head: Arc::downgrade(head) };
        let inline = self.mapper.build(supplier);
        *self.attached.lock().unwrap() = Some((Arc::downgrade(head), inline));
        head.note_attached(self.identity_id.clone());
    }

    /// Detach this transformer, reverting it to an unattached, freely reusable state.
    pub fn detach(self: &Arc<Self>) {
        let mut guard = self.attached.lock().unwrap();
        if let Some((head, _)) = guard.take() {
            if let Some(head) = head.upgrade() {
                head.note_detached(&self.identity_id);
            }
        }
    }
}
