//! Bridges the pipeline's payload type to an external consumer type, plus the
//! tail-local selection structures (switch, stack) that narrow which outputs
//! are active.

use crate::capability::Capability;
use smol_str::SmolStr;
use std::sync::{Arc, Mutex};

/// Builds the external-facing `OUT` handling given a value of `A`. Called on
/// every dispatch, mirroring [`crate::input::InputMapper`] on the way out.
pub trait OutputMapper<A, OUT>: Send + Sync {
    fn map(&self, args: A) -> OUT;
}

/// An output boundary node.
pub struct OutputTransformer<A> {
    name: SmolStr,
    id: SmolStr,
    priority: i32,
    sink: Capability<A>,
}

impl<A: Clone + Send + Sync + 'static> OutputTransformer<A> {
    /// Construct a pass-through transformer: the sink is called directly with `A`.
    pub fn passthrough(name: impl Into<SmolStr>, priority: i32, sink: Capability<A>) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self { id: name.clone(), name, priority, sink })
    }

    /// Construct a mapped transformer using an [`OutputMapper`] to bridge an
    /// arbitrary external consumer.
    pub fn mapped<OUT>(
        name: impl Into<SmolStr>,
        priority: i32,
        mapper: Arc<dyn OutputMapper<A, OUT>>,
        consume: Arc<dyn Fn(OUT) + Send + Sync>,
    ) -> Arc<Self> {
        let sink: Capability<A> = Arc::new(move |args: A| consume(mapper.map(args)));
        Self::passthrough(name, priority, sink)
    }

    pub fn name(&self) -> &SmolStr {
        &self.name
    }
    pub fn id(&self) -> &SmolStr {
        &self.id
    }
    pub fn priority(&self) -> i32 {
        self.priority
    }
    pub(crate) fn capability(&self) -> Capability<A> {
        self.sink.clone()
    }
}

type RelinkHook = Arc<dyn Fn() + Send + Sync>;

/// A selectable 1-of-N over registered outputs. Only the selected output
/// participates in the tail's fan-out.
pub struct Switch<A> {
    candidates: Mutex<Vec<Arc<OutputTransformer<A>>>>,
    selected: Mutex<Option<SmolStr>>,
    relink_hook: Mutex<Option<RelinkHook>>,
}

impl<A: Clone + Send + Sync + 'static> Default for Switch<A> {
    fn default() -> Self {
        Self {
            candidates: Mutex::new(Vec::new()),
            selected: Mutex::new(None),
            relink_hook: Mutex::new(None),
        }
    }
}

impl<A: Clone + Send + Sync + 'static> Switch<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_relink_hook(&self, hook: RelinkHook) {
        *self.relink_hook.lock().unwrap() = Some(hook);
    }

    fn trigger_relink(&self) {
        if let Some(hook) = self.relink_hook.lock().unwrap().clone() {
            hook();
        }
    }

    pub fn add_candidate(&self, output: Arc<OutputTransformer<A>>) {
        self.candidates.lock().unwrap().push(output);
    }

    pub fn select(&self, id: &str) -> bool {
        let found = self.candidates.lock().unwrap().iter().any(|c| c.id() == id);
        if found {
            *self.selected.lock().unwrap() = Some(SmolStr::new(id));
            self.trigger_relink();
        }
        found
    }

    pub fn select_index(&self, index: usize) -> bool {
        let candidates = self.candidates.lock().unwrap();
        if let Some(c) = candidates.get(index) {
            let id = c.id().clone();
            drop(candidates);
            *self.selected.lock().unwrap() = Some(id);
            self.trigger_relink();
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.lock().unwrap().is_none()
    }

    pub fn selected(&self) -> Option<SmolStr> {
        self.selected.lock().unwrap().clone()
    }

    pub fn candidates(&self) -> Vec<SmolStr> {
        self.candidates.lock().unwrap().iter().map(|c| c.id().clone()).collect()
    }

    pub(crate) fn active_target(&self) -> Option<Capability<A>> {
        let selected = self.selected.lock().unwrap().clone()?;
        self.candidates.lock().unwrap().iter().find(|c| *c.id() == selected).map(|c| c.capability())
    }
}

/// A LIFO override of the tail's active sink. While non-empty, only the top of
/// the stack participates in the tail's fan-out.
pub struct Stack<A> {
    entries: Mutex<Vec<Arc<OutputTransformer<A>>>>,
    relink_hook: Mutex<Option<RelinkHook>>,
}

impl<A: Clone + Send + Sync + 'static> Default for Stack<A> {
    fn default() -> Self {
        Self { entries: Mutex::new(Vec::new()), relink_hook: Mutex::new(None) }
    }
}

impl<A: Clone + Send + Sync + 'static> Stack<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_relink_hook(&self, hook: RelinkHook) {
        *self.relink_hook.lock().unwrap() = Some(hook);
    }

    fn trigger_relink(&self) {
        if let Some(hook) = self.relink_hook.lock().unwrap().clone() {
            hook();
        }
    }

    pub fn push(&self, output: Arc<OutputTransformer<A>>) {
        self.entries.lock().unwrap().push(output);
        self.trigger_relink();
    }

    pub fn pop(&self) -> Option<Arc<OutputTransformer<A>>> {
        let popped = self.entries.lock().unwrap().pop();
        if popped.is_some() {
            self.trigger_relink();
        }
        popped
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub(crate) fn active_target(&self) -> Option<Capability<A>> {
        self.entries.lock().unwrap().last().map(|c| c.capability())
    }

    pub fn top_id(&self) -> Option<SmolStr> {
        self.entries.lock().unwrap().last().map(|c| c.id().clone())
    }
}
