//! Interface to the external thread substrate.
//!
//! The substrate owns thread creation, identity and teardown; this crate only
//! maps its opaque handles to exception slots. On firmware the implementation
//! wraps the RTOS task API; hosted builds and tests use [`HostSubstrate`].

use crate::error::ExcResult;

/// Opaque thread identity as handed out by the substrate. Zero is reserved
/// for "no thread" and marks a free registry slot.
pub type RawHandle = usize;

/// The operations this crate consumes from the thread substrate.
///
/// `current` and `is_current` must be safe to call with interrupts disabled:
/// no allocation, no blocking. On an RTOS the natural handle is the TCB
/// pointer, which satisfies both.
pub trait ThreadSubstrate: Sync {
    /// Start a thread running `entry(arg)`. Returns its non-zero handle.
    fn create(
        &self,
        name: &str,
        priority: u32,
        entry: fn(usize),
        arg: usize,
        stack_size: usize,
    ) -> ExcResult<RawHandle>;

    /// Cheap identity of the calling thread. Doubles as the owner token of
    /// the registry's reentrant lock.
    fn current(&self) -> RawHandle;

    /// Whether `handle` names the calling thread.
    fn is_current(&self, handle: RawHandle) -> bool {
        handle == self.current()
    }

    /// Tear down a finished thread. Called by the thread on itself as its
    /// last action, so implementations must not require the thread to still
    /// be schedulable afterwards.
    fn cleanup(&self, handle: RawHandle);

    /// Polite busy-wait hint used inside lock spins.
    fn relax(&self) {
        core::hint::spin_loop();
    }
}

static SUBSTRATE: spin::Once<&'static dyn ThreadSubstrate> = spin::Once::new();

/// Install the thread substrate. Call once at startup, before any threads are
/// created or registered; later calls are ignored.
pub fn install_substrate(substrate: &'static dyn ThreadSubstrate) {
    SUBSTRATE.call_once(|| substrate);
}

pub(crate) fn get() -> Option<&'static dyn ThreadSubstrate> {
    SUBSTRATE.get().copied()
}

pub(crate) fn relax() {
    match get() {
        Some(s) => s.relax(),
        None => core::hint::spin_loop(),
    }
}

/// Substrate backed by `std::thread`, for hosted builds and the test suite.
///
/// Handles are small unique integers carried in a thread local; any thread
/// that asks for its identity gets one lazily, so the main thread and bare
/// `std::thread` spawns work too.
#[cfg(any(test, feature = "std"))]
pub struct HostSubstrate {
    next_handle: portable_atomic::AtomicUsize,
}

#[cfg(any(test, feature = "std"))]
impl HostSubstrate {
    const fn new() -> Self {
        Self {
            next_handle: portable_atomic::AtomicUsize::new(1),
        }
    }

    pub fn instance() -> &'static Self {
        static HOST: HostSubstrate = HostSubstrate::new();
        &HOST
    }
}

#[cfg(any(test, feature = "std"))]
std::thread_local! {
    static CURRENT_HANDLE: core::cell::Cell<usize> = const { core::cell::Cell::new(0) };
}

#[cfg(any(test, feature = "std"))]
impl ThreadSubstrate for HostSubstrate {
    fn create(
        &self,
        name: &str,
        _priority: u32,
        entry: fn(usize),
        arg: usize,
        stack_size: usize,
    ) -> ExcResult<RawHandle> {
        use portable_atomic::Ordering;

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let mut builder = std::thread::Builder::new().name(std::string::String::from(name));
        if stack_size > 0 {
            builder = builder.stack_size(stack_size);
        }
        let spawned = builder.spawn(move || {
            CURRENT_HANDLE.with(|current| current.set(handle));
            entry(arg);
        });
        match spawned {
            Ok(_join) => Ok(handle),
            Err(_) => Err(crate::error::THREAD_START_FAILED),
        }
    }

    fn current(&self) -> RawHandle {
        use portable_atomic::Ordering;

        CURRENT_HANDLE.with(|current| {
            if current.get() == 0 {
                current.set(self.next_handle.fetch_add(1, Ordering::SeqCst));
            }
            current.get()
        })
    }

    fn cleanup(&self, _handle: RawHandle) {
        // std threads are detached at spawn; nothing to reclaim here
    }

    fn relax(&self) {
        std::thread::yield_now();
    }
}
