//! Cooperative shutdown barrier.
//!
//! Every externally triggered wallet operation registers with a
//! [`ThreadGroup`] before doing work. Once [`ThreadGroup::stop`] is called,
//! new registrations fail with [`WalletError::Shutdown`], the caller waits
//! for all outstanding operations to finish, and teardown hooks run in LIFO
//! order. Operations that began before the stop run to completion so that
//! on-disk invariants hold.

use std::sync::{Arc, Condvar, Mutex};

use crate::errors::{WalletError, WalletResult};

#[derive(Default)]
struct GroupState {
    stopped: bool,
    outstanding: usize,
    after_stop: Vec<Box<dyn FnOnce() + Send>>,
}

/// Tracks outstanding operations and coordinates orderly teardown.
#[derive(Clone, Default)]
pub struct ThreadGroup {
    state: Arc<(Mutex<GroupState>, Condvar)>,
}

impl std::fmt::Debug for ThreadGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadGroup").finish_non_exhaustive()
    }
}

impl ThreadGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation. Fails once shutdown has begun. The returned
    /// guard deregisters on drop.
    pub fn add(&self) -> WalletResult<ThreadGuard> {
        let (lock, _) = &*self.state;
        let mut state = lock.lock().expect("thread group lock poisoned");
        if state.stopped {
            return Err(WalletError::Shutdown);
        }
        state.outstanding += 1;
        Ok(ThreadGuard {
            state: Arc::clone(&self.state),
        })
    }

    /// Queue a teardown hook. Hooks run during [`stop`](Self::stop), after
    /// all outstanding operations have completed, most recently registered
    /// first.
    pub fn after_stop(&self, f: impl FnOnce() + Send + 'static) {
        let (lock, _) = &*self.state;
        let mut state = lock.lock().expect("thread group lock poisoned");
        state.after_stop.push(Box::new(f));
    }

    /// Whether shutdown has begun.
    pub fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.state;
        lock.lock().expect("thread group lock poisoned").stopped
    }

    /// Begin shutdown: reject new registrations, wait for outstanding
    /// operations, then run teardown hooks in LIFO order. Idempotent; a
    /// second call returns [`WalletError::Shutdown`] without rerunning
    /// hooks.
    pub fn stop(&self) -> WalletResult<()> {
        let (lock, cvar) = &*self.state;
        let hooks = {
            let mut state = lock.lock().expect("thread group lock poisoned");
            if state.stopped {
                return Err(WalletError::Shutdown);
            }
            state.stopped = true;
            while state.outstanding > 0 {
                state = cvar.wait(state).expect("thread group lock poisoned");
            }
            std::mem::take(&mut state.after_stop)
        };
        for hook in hooks.into_iter().rev() {
            hook();
        }
        Ok(())
    }
}

/// RAII registration handle returned by [`ThreadGroup::add`].
pub struct ThreadGuard {
    state: Arc<(Mutex<GroupState>, Condvar)>,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock().expect("thread group lock poisoned");
        state.outstanding -= 1;
        if state.outstanding == 0 {
            cvar.notify_all();
        }
    }
}
