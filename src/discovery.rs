//! Build-time substitute for reflection-based processor discovery: Rust has no
//! runtime introspection, so candidates are gathered by an explicit,
//! macro-driven registration call instead.

use crate::capability::Capability;
use crate::processor::ProcessorLogic;
use smol_str::SmolStr;
use std::sync::Arc;

/// One discoverable processor candidate: enough to build a [`ProcessorLogic`]
/// on demand, plus the metadata [`ProcessorSource::discover`] sorts by.
pub struct ProcessorDescriptor<A> {
    pub name: SmolStr,
    pub priority: i32,
    pub enabled: bool,
    pub make: Arc<dyn Fn() -> Arc<ProcessorLogic<A>> + Send + Sync>,
}

/// Accumulates [`ProcessorDescriptor`]s in the order `register_processor!` is
/// called. Visiting superclass-equivalent registration first and subclass
/// registration after (by having a wrapper type's `register` call the inner
/// type's `register` before appending its own) reproduces "walk the class and
/// each superclass" without any runtime type walk.
pub struct ProcessorRegistry<A> {
    entries: Vec<ProcessorDescriptor<A>>,
}

impl<A> Default for ProcessorRegistry<A> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<A> ProcessorRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, descriptor: ProcessorDescriptor<A>) {
        self.entries.push(descriptor);
    }
}

/// A type that exposes annotated processor candidates.
pub trait ProcessorSource<A> {
    /// Register every candidate this type (and, for a wrapper type, whatever it
    /// wraps) exposes.
    fn register(registry: &mut ProcessorRegistry<A>);

    /// Registered candidates, sorted ascending by priority; ties broken by
    /// registration order (a stable sort, so `register`'s own ordering is the
    /// tiebreaker).
    fn discover() -> Vec<ProcessorDescriptor<A>>
    where
        Self: Sized,
    {
        let mut registry = ProcessorRegistry::new();
        Self::register(&mut registry);
        registry.entries.sort_by_key(|d| d.priority);
        registry.entries
    }
}

/// Register a processor candidate. `$make` must be an expression evaluating to
/// `Arc<dyn Fn() -> Arc<ProcessorLogic<A>> + Send + Sync>` — a compile-time
/// check standing in for the distilled spec's runtime "parameter assignability"
/// check, enforced earlier and more strongly.
#[macro_export]
macro_rules! register_processor {
    ($registry:expr, name: $name:expr, priority: $priority:expr, enabled: $enabled:expr, make: $make:expr $(,)?) => {
        $registry.push($crate::discovery::ProcessorDescriptor {
            name: smol_str::SmolStr::new($name),
            priority: $priority,
            enabled: $enabled,
            make: std::sync::Arc::new($make),
        })
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Source;
    impl ProcessorSource<i32> for Source {
        fn register(registry: &mut ProcessorRegistry<i32>) {
            register_processor!(
                registry,
                name: "b",
                priority: 50,
                enabled: true,
                make: || Arc::new(|v: i32, f: &dyn Fn(i32)| f(v)) as Arc<ProcessorLogic<i32>>,
            );
            register_processor!(
                registry,
                name: "a",
                priority: 10,
                enabled: true,
                make: || Arc::new(|v: i32, f: &dyn Fn(i32)| f(v)) as Arc<ProcessorLogic<i32>>,
            );
            register_processor!(
                registry,
                name: "c",
                priority: 10,
                enabled: false,
                make: || Arc::new(|v: i32, f: &dyn Fn(i32)| f(v)) as Arc<ProcessorLogic<i32>>,
            );
        }
    }

    #[test]
    fn discover_sorts_by_priority_then_registration_order() {
        let discovered = Source::discover();
        let names: Vec<_> = discovered.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "b"]);
    }
}
