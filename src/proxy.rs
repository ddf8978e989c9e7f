//! Wraps a dispatch target so a single read-lock acquisition covers an entire
//! end-to-end traversal, rather than one acquisition per node.

use crate::capability::Capability;
use crate::shared::PipelineShared;
use std::sync::Arc;

/// Wrap `delegate` so invoking the returned capability acquires `shared`'s read
/// lock for the duration of the call, then releases it once the whole downstream
/// chain has finished running (since every node called along the way runs inside
/// this same stack frame).
pub fn lockable_proxy<A: 'static>(delegate: Capability<A>, shared: Arc<PipelineShared>) -> Capability<A> {
    Arc::new(move |args: A| {
        shared.lock.read_voided(|| delegate(args));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::empty;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn proxy_acquires_read_lock_around_delegate() {
        let shared = PipelineShared::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let delegate: Capability<i32> = Arc::new(move |v: i32| {
            seen2.fetch_add(v as usize, Ordering::SeqCst);
        });
        let proxied = lockable_proxy(delegate, shared);
        proxied(3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        let _ = empty::<i32>();
    }
}
