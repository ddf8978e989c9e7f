//! A readers/writer lock whose write side is reentrant on the owning thread.
//!
//! The data path only ever takes the read side, once per end-to-end dispatch
//! ([`crate::proxy`]). Structural mutation takes the write side and may call back
//! into other write-locked operations from the same thread while propagating a
//! relink; neither [`std::sync::RwLock`] nor `no_deadlocks::RwLock` allow that, so
//! this is hand-rolled over a condvar-guarded state machine instead.

use std::sync::{Condvar, Mutex};
use std::thread::ThreadId;

#[cfg(feature = "debug-tools")]
type InnerMutex<T> = no_deadlocks::Mutex<T>;
#[cfg(not(feature = "debug-tools"))]
type InnerMutex<T> = Mutex<T>;

#[derive(Debug, Default)]
enum LockState {
    #[default]
    Idle,
    Read(usize),
    Write(ThreadId, usize),
}

#[derive(Debug, Default)]
pub struct PipelineLock {
    state: InnerMutex<LockState>,
    cond: Condvar,
}

impl PipelineLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_read(&self) {
        let mut state = self.state.lock().unwrap();
        loop {
            match &mut *state {
                LockState::Idle => {
                    *state = LockState::Read(1);
                    return;
                }
                LockState::Read(n) => {
                    *n += 1;
                    return;
                }
                LockState::Write(owner, _) if *owner == std::thread::current().id() => {
                    // A reentrant write holder is allowed to also read; track it as
                    // part of the same write acquisition rather than blocking itself.
                    return;
                }
                LockState::Write(..) => {
                    state = self.cond.wait(state).unwrap();
                }
            }
        }
    }

    fn unlock_read(&self) {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            LockState::Read(n) if *n > 1 => *n -= 1,
            LockState::Read(_) => {
                *state = LockState::Idle;
                self.cond.notify_all();
            }
            LockState::Write(owner, _) if *owner == std::thread::current().id() => {}
            _ => unreachable!("unbalanced read unlock"),
        }
    }

    fn lock_write(&self) {
        let this = std::thread::current().id();
        let mut state = self.state.lock().unwrap();
        loop {
            match &mut *state {
                LockState::Idle => {
                    *state = LockState::Write(this, 1);
                    return;
                }
                LockState::Write(owner, depth) if *owner == this => {
                    *depth += 1;
                    return;
                }
                LockState::Read(..) | LockState::Write(..) => {
                    state = self.cond.wait(state).unwrap();
                }
            }
        }
    }

    fn unlock_write(&self) {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            LockState::Write(owner, depth) if *owner == std::thread::current().id() => {
                if *depth > 1 {
                    *depth -= 1;
                } else {
                    *state = LockState::Idle;
                    self.cond.notify_all();
                }
            }
            _ => unreachable!("unbalanced write unlock"),
        }
    }

    /// Run `f` under the read lock, releasing it on every exit path including a panic.
    pub fn read_voided<R>(&self, f: impl FnOnce() -> R) -> R {
        self.lock_read();
        struct Guard<'a>(&'a PipelineLock);
        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.0.unlock_read();
            }
        }
        let _guard = Guard(self);
        f()
    }

    /// Run `f` under the write lock, releasing it on every exit path including a panic.
    pub fn write_voided<R>(&self, f: impl FnOnce() -> R) -> R {
        self.lock_write();
        struct Guard<'a>(&'a PipelineLock);
        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.0.unlock_write();
            }
        }
        let _guard = Guard(self);
        f()
    }

    /// As [`Self::read_voided`], for closures returning a `Result`.
    pub fn read_result<R, E>(&self, f: impl FnOnce() -> Result<R, E>) -> Result<R, E> {
        self.read_voided(f)
    }

    /// As [`Self::write_voided`], for closures returning a `Result`.
    pub fn write_result<R, E>(&self, f: impl FnOnce() -> Result<R, E>) -> Result<R, E> {
        self.write_voided(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn reentrant_write_from_same_thread() {
        let lock = Arc::new(PipelineLock::new());
        lock.write_voided(|| {
            lock.write_voided(|| {
                lock.write_voided(|| {});
            });
        });
    }

    #[test]
    fn write_holder_can_also_read() {
        let lock = PipelineLock::new();
        lock.write_voided(|| {
            lock.read_voided(|| {});
        });
    }

    #[test]
    fn concurrent_readers_proceed() {
        let lock = Arc::new(PipelineLock::new());
        let l2 = lock.clone();
        let t = std::thread::spawn(move || {
            l2.read_voided(|| std::thread::sleep(std::time::Duration::from_millis(20)));
        });
        lock.read_voided(|| std::thread::sleep(std::time::Duration::from_millis(20)));
        t.join().unwrap();
    }

    #[test]
    fn write_releases_on_panic() {
        let lock = Arc::new(PipelineLock::new());
        let l2 = lock.clone();
        let res = std::panic::catch_unwind(move || {
            l2.write_voided(|| panic!("boom"));
        });
        assert!(res.is_err());
        // lock must be free again
        lock.write_voided(|| {});
    }
}
