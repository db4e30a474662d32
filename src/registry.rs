//! Thread registry: maps substrate handles to exception slots.
//!
//! Mutations (register, unregister, capacity raise) are serialized by one
//! reentrant lock. Lookups are lock-free linear scans over the current table
//! snapshot and must stay safe from fault context: no locks, no allocation,
//! no blocking. A thread registering concurrently with a lookup may
//! transiently resolve to the catch-all slot; callers tolerate that.

use core::cell::UnsafeCell;

use heapless::String;
use portable_atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::catch::throw;
use crate::error::{ExcResult, ExceptionCode, OUT_OF_MEMORY};
use crate::fault::FAULT_WORDS;
use crate::substrate::{self, RawHandle};
use crate::sync::{ReentrantGuard, ReentrantMutex};
use crate::frame;

/// Visible characters of a thread name, excluding any terminator.
pub const MAX_NAME_LEN: usize = 14;

/// Called on the failing thread when its body throws without catching.
pub type ExceptionCallback = fn(ExceptionCode, &ThreadInfo);

/// Per-slot thread bookkeeping.
///
/// `handle` is the liveness flag: zero marks a free slot, and it is published
/// last on registration so a concurrent scan never observes a half-filled
/// entry. The registry never owns the thread behind the handle. `name` and
/// `callback` are written only under the registry lock while the slot is
/// free; reading them for a registered slot is race-free by that discipline.
pub struct ThreadInfo {
    pub(crate) handle: AtomicUsize,
    pub(crate) name: UnsafeCell<String<MAX_NAME_LEN>>,
    pub(crate) callback: UnsafeCell<Option<ExceptionCallback>>,
    pub(crate) exception_data: [AtomicU32; FAULT_WORDS],
}

unsafe impl Sync for ThreadInfo {}

impl ThreadInfo {
    pub(crate) const fn new() -> Self {
        Self {
            handle: AtomicUsize::new(0),
            name: UnsafeCell::new(String::new()),
            callback: UnsafeCell::new(None),
            exception_data: [const { AtomicU32::new(0) }; FAULT_WORDS],
        }
    }

    /// Substrate handle of the registered thread, zero when the slot is free.
    pub fn handle(&self) -> RawHandle {
        self.handle.load(Ordering::SeqCst)
    }

    /// Snapshot of the thread name.
    pub fn name(&self) -> String<MAX_NAME_LEN> {
        unsafe { (*self.name.get()).clone() }
    }

    /// Snapshot of the register/fault-status capture from the last hardware
    /// exception delivered to this thread.
    pub fn exception_data(&self) -> [u32; FAULT_WORDS] {
        core::array::from_fn(|word| self.exception_data[word].load(Ordering::SeqCst))
    }

    pub(crate) fn callback(&self) -> Option<ExceptionCallback> {
        unsafe { *self.callback.get() }
    }

    /// Copy all fields from `other` during table growth. Caller holds the
    /// registry lock.
    pub(crate) fn copy_from(&self, other: &ThreadInfo) {
        unsafe {
            *self.name.get() = (*other.name.get()).clone();
            *self.callback.get() = *other.callback.get();
        }
        for word in 0..FAULT_WORDS {
            self.exception_data[word]
                .store(other.exception_data[word].load(Ordering::SeqCst), Ordering::SeqCst);
        }
        self.handle
            .store(other.handle.load(Ordering::SeqCst), Ordering::SeqCst);
    }
}

static REGISTRY_LOCK: ReentrantMutex = ReentrantMutex::new();

pub(crate) fn lock() -> ReentrantGuard<'static> {
    REGISTRY_LOCK.lock()
}

/// Slot assigned to the calling thread, 0 when unregistered or in interrupt
/// context. Safe with interrupts disabled; never allocates or blocks.
pub fn current_slot() -> usize {
    let tables = frame::tables();
    let Some(substrate) = substrate::get() else {
        return 0;
    };
    for slot in 1..tables.len {
        let handle = tables.infos[slot].handle.load(Ordering::SeqCst);
        if handle != 0 && substrate.is_current(handle) {
            return slot;
        }
    }
    0
}

/// Slot registered for `handle`, 0 when not found. Lock-free; callers treat
/// slot 0 as "unregistered or catch-all".
pub fn slot_of(handle: RawHandle) -> usize {
    let tables = frame::tables();
    for slot in 1..tables.len {
        if tables.infos[slot].handle.load(Ordering::SeqCst) == handle {
            return slot;
        }
    }
    log::trace!("thread {:#x} not registered, using catch-all frame", handle);
    0
}

/// Number of registered threads.
pub fn active_thread_count() -> usize {
    let tables = frame::tables();
    let mut count = 0;
    for slot in 1..tables.len {
        if tables.infos[slot].handle.load(Ordering::SeqCst) != 0 {
            count += 1;
        }
    }
    count
}

/// Total slot count, including the catch-all slot.
pub fn thread_capacity() -> usize {
    frame::tables().len
}

/// Claim the first free slot for `handle`.
///
/// The name is truncated to [`MAX_NAME_LEN`] characters. Fails with
/// [`OUT_OF_MEMORY`] when every slot is taken; thread creation surfaces that
/// as too-many-threads via its own capacity pre-check.
pub fn register_thread(
    handle: RawHandle,
    name: &str,
    callback: Option<ExceptionCallback>,
) -> ExcResult<usize> {
    let _guard = lock();
    let tables = frame::tables();
    for slot in 1..tables.len {
        let info = &tables.infos[slot];
        if info.handle.load(Ordering::SeqCst) == 0 {
            unsafe {
                let stored = &mut *info.name.get();
                stored.clear();
                for ch in name.chars().take(MAX_NAME_LEN) {
                    let _ = stored.push(ch);
                }
                *info.callback.get() = callback;
            }
            info.handle.store(handle, Ordering::SeqCst);
            return Ok(slot);
        }
    }
    Err(OUT_OF_MEMORY)
}

/// Release the calling thread's slot. Safe to call mid-exception-handling;
/// the locked path itself never throws.
pub fn unregister_current_thread() {
    let _guard = lock();
    let slot = current_slot();
    let info = &frame::tables().infos[slot];
    log::info!(
        "unregistering thread {} ({} @ {:#010x})",
        slot,
        info.name().as_str(),
        info.handle()
    );
    info.handle.store(0, Ordering::SeqCst);
}

/// Release the slot registered for `handle`; a zero handle means the calling
/// thread.
pub fn unregister_thread(handle: RawHandle) {
    if handle == 0 {
        unregister_current_thread();
        return;
    }
    let _guard = lock();
    let slot = slot_of(handle);
    let info = &frame::tables().infos[slot];
    log::info!(
        "unregistering thread {} ({} @ {:#010x})",
        slot,
        info.name().as_str(),
        info.handle()
    );
    info.handle.store(0, Ordering::SeqCst);
}

/// Raise the number of thread slots to `new_capacity` (including the
/// catch-all slot). Throws [`crate::error::INVALID_ARGUMENT`] when the new
/// capacity does not increase the current one and
/// [`crate::error::OUT_OF_MEMORY`] when allocation fails; both leave the
/// tables untouched.
pub fn raise_thread_capacity(new_capacity: usize) {
    let grown = {
        let _guard = lock();
        frame::grow(new_capacity)
    };
    if let Err(code) = grown {
        throw(code);
    }
}

/// Register/fault capture of the calling thread's slot.
pub fn current_exception_data() -> [u32; FAULT_WORDS] {
    frame::tables().infos[current_slot()].exception_data()
}

/// Bookkeeping for `slot`, `None` when out of range. Slot 0 is the
/// catch-all and never names a registered thread.
pub fn thread_info(slot: usize) -> Option<&'static ThreadInfo> {
    frame::tables().infos.get(slot)
}

pub(crate) fn info(slot: usize) -> &'static ThreadInfo {
    let tables = frame::tables();
    let slot = if slot < tables.len { slot } else { 0 };
    &tables.infos[slot]
}

/// Dump the registered threads ordered by handle value, marking `highlight`.
pub(crate) fn log_thread_table(highlight: usize) {
    let tables = frame::tables();
    let mut last_logged: RawHandle = 0;
    loop {
        let mut next: RawHandle = RawHandle::MAX;
        let mut next_slot = 0;
        for slot in 0..tables.len {
            let handle = tables.infos[slot].handle.load(Ordering::SeqCst);
            if handle > last_logged && handle < next {
                next = handle;
                next_slot = slot;
            }
        }
        if next == RawHandle::MAX {
            break;
        }
        log::info!(
            " thread {}: {:<15} @ {:#010x}{}",
            next_slot,
            tables.infos[next_slot].name().as_str(),
            next,
            if next_slot == highlight { " <<<<" } else { "" }
        );
        last_logged = next;
    }
}
