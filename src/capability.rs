//! The payload type every pipeline is polymorphic over, and the fan-out helpers
//! used to compose several dispatch targets into one.

use std::sync::Arc;

/// A first-class, `Arc`-shared dispatch target. This is the data-type descriptor
/// the rest of the crate is generic over: every node's `inline` and `output` are
/// values of this type.
pub type Capability<A> = Arc<dyn Fn(A) + Send + Sync>;

/// A capability that does nothing when invoked. A legal, harmless sink.
pub fn empty<A>() -> Capability<A> {
    Arc::new(|_: A| {})
}

/// Compose several capabilities into one that invokes each of them in order,
/// cloning the argument for every invocation but the last.
///
/// Callers are expected to have already removed any "no candidate" entries;
/// see [`optimize_array`] for the compacting variant.
pub fn wrap_array<A: Clone + 'static>(items: Vec<Capability<A>>) -> Capability<A> {
    Arc::new(move |args: A| {
        if let Some((last, rest)) = items.split_last() {
            for item in rest {
                item(args.clone());
            }
            last(args);
        }
    })
}

/// Compact out `None` entries, then return the cheapest capability that is
/// observationally equivalent to fanning out to what remains:
/// [`empty`] for zero entries, the lone entry for one, [`wrap_array`] for more.
pub fn optimize_array<A: Clone + 'static>(
    items: impl IntoIterator<Item = Option<Capability<A>>>,
) -> Capability<A> {
    let mut compacted: Vec<Capability<A>> = items.into_iter().flatten().collect();
    match compacted.len() {
        0 => empty(),
        1 => compacted.pop().unwrap(),
        _ => wrap_array(compacted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn empty_is_harmless() {
        let cap: Capability<i32> = empty();
        cap(42);
    }

    #[test]
    fn optimize_array_zero_entries_is_empty() {
        let cap: Capability<i32> = optimize_array(std::iter::empty());
        cap(1);
    }

    #[test]
    fn optimize_array_single_entry_is_passthrough() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let cap: Capability<i32> = optimize_array([Some(Arc::new(move |v: i32| {
            seen2.fetch_add(v as usize, Ordering::SeqCst);
        }) as Capability<i32>)]);
        cap(7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn optimize_array_compacts_before_wrapping() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mk = |tag: u8| {
            let order = order.clone();
            Arc::new(move |_: i32| order.lock().unwrap().push(tag)) as Capability<i32>
        };
        let cap = optimize_array([Some(mk(1)), None, Some(mk(2)), None, Some(mk(3))]);
        cap(0);
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }
}
