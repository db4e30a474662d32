//! Synchronization pieces: the registry's reentrant lock and exception-aware
//! lock sections.

use portable_atomic::{AtomicUsize, Ordering};

use crate::catch::{catch, throw};
use crate::substrate;

/// Owner token used before a substrate is installed. Startup is
/// single-threaded by contract, so a fixed token is enough.
const STARTUP_TOKEN: usize = usize::MAX;

fn owner_token() -> usize {
    match substrate::get() {
        Some(s) => {
            let token = s.current();
            if token == 0 {
                STARTUP_TOKEN
            } else {
                token
            }
        }
        None => STARTUP_TOKEN,
    }
}

/// Spin-based reentrant mutex.
///
/// The owner is identified by the substrate's cheap current-thread token, so
/// an owning thread may re-lock freely; that is what lets thread creation hold
/// the registry lock across registration while registration itself also takes
/// it. The depth counter is only ever touched by the owner.
pub(crate) struct ReentrantMutex {
    owner: AtomicUsize,
    depth: core::cell::UnsafeCell<usize>,
}

unsafe impl Sync for ReentrantMutex {}

impl ReentrantMutex {
    pub(crate) const fn new() -> Self {
        Self {
            owner: AtomicUsize::new(0),
            depth: core::cell::UnsafeCell::new(0),
        }
    }

    pub(crate) fn lock(&self) -> ReentrantGuard<'_> {
        let me = owner_token();
        if self.owner.load(Ordering::Acquire) != me {
            while self
                .owner
                .compare_exchange_weak(0, me, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                substrate::relax();
            }
        }
        unsafe { *self.depth.get() += 1 };
        ReentrantGuard { mutex: self }
    }
}

pub(crate) struct ReentrantGuard<'a> {
    mutex: &'a ReentrantMutex,
}

impl Drop for ReentrantGuard<'_> {
    fn drop(&mut self) {
        unsafe {
            let depth = self.mutex.depth.get();
            *depth -= 1;
            if *depth == 0 {
                self.mutex.owner.store(0, Ordering::Release);
            }
        }
    }
}

/// Run `body` under `mutex` inside its own try scope.
///
/// A throw out of `body` releases the mutex before the code is rethrown to the
/// enclosing try, so an exception can safely cross a locked region without
/// leaving it held. An `exit_try` inside `body` exits the section only.
pub fn locked_section<T>(mutex: &spin::Mutex<T>, body: impl FnOnce(&mut T)) {
    let mut guard = mutex.lock();
    let caught = catch(|| body(&mut *guard));
    drop(guard);
    if let Some(code) = caught {
        throw(code);
    }
}
