//! Consumer-side typed properties. This is deliberately narrow: a processor or
//! host application gets type-safe get/set/change-notify, but the full settings
//! registry (discovery, parsing grammar, on-disk persistence) is an external
//! collaborator this crate does not implement.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type ChangeListener<T> = Box<dyn FnMut(&T, &T) + Send>;

struct Inner<T> {
    value: T,
    listeners: Vec<(usize, ChangeListener<T>)>,
}

/// A single typed, observable setting.
pub struct Property<T> {
    inner: Mutex<Inner<T>>,
    next_listener_id: AtomicUsize,
}

impl<T: Clone + PartialEq> Property<T> {
    pub fn new(initial: T) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner { value: initial, listeners: Vec::new() }),
            next_listener_id: AtomicUsize::new(0),
        })
    }

    pub fn get(&self) -> T {
        self.inner.lock().unwrap().value.clone()
    }

    pub fn set(self: &Arc<Self>, value: T) {
        let mut inner = self.inner.lock().unwrap();
        if inner.value == value {
            return;
        }
        let old = std::mem::replace(&mut inner.value, value.clone());
        for (_, listener) in &mut inner.listeners {
            listener(&old, &value);
        }
    }

    /// Register a change listener, returning a guard that deregisters it on drop.
    pub fn on_change(self: &Arc<Self>, listener: impl FnMut(&T, &T) + Send + 'static) -> ChangeGuard<T> {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().unwrap().listeners.push((id, Box::new(listener)));
        ChangeGuard { property: self.clone(), id: Some(id) }
    }

    fn unregister(&self, id: usize) {
        self.inner.lock().unwrap().listeners.retain(|(i, _)| *i != id);
    }
}

impl<T: FromStr + Clone + PartialEq> Property<T> {
    pub fn parse(&self, text: &str) -> Result<T, T::Err> {
        text.parse()
    }
}

impl<T: ToString + Clone + PartialEq> Property<T> {
    pub fn serialize(&self) -> String {
        self.get().to_string()
    }
}

/// Deregisters its change listener when dropped.
pub struct ChangeGuard<T> {
    property: Arc<Property<T>>,
    id: Option<usize>,
}
impl<T> Drop for ChangeGuard<T> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.property.unregister(id);
        }
    }
}
impl<T> ChangeGuard<T> {
    pub fn unregister(mut self) {
        if let Some(id) = self.id.take() {
            self.property.unregister(id);
        }
    }
}

/// Writes a property's current serialized form to an external sink. No concrete
/// file-backed implementation is provided: on-disk persistence belongs to the
/// external settings registry, documented (not implemented) in `SPEC_FULL.md`.
/// The expected grammar there is `[section]\nkey=value`.
pub trait PropertyWriter {
    fn write(&self, section: &str, key: &str, value: &str) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_skips_listener_when_value_unchanged() {
        let prop = Property::new(1i32);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let _guard = prop.on_change(move |_old, _new| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        prop.set(1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        prop.set(2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guard_unregisters_on_drop() {
        let prop = Property::new(1i32);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let guard = prop.on_change(move |_old, _new| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        drop(guard);
        prop.set(5);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
