//! Per-slot exception frames and the growable arena that holds them.
//!
//! Frames and thread infos live in two parallel arrays behind a single atomic
//! snapshot pointer. Growth copies both arrays into larger ones and swaps the
//! snapshot; lock-free readers always dereference a currently-valid snapshot
//! and index it by slot, never by retained pointer. Old snapshots are leaked
//! on purpose: a reader may still be walking one, and table growth happens
//! a bounded number of times over the life of the process.
//!
//! All slot fields are atomics with SeqCst ordering: the same memory is
//! touched by application threads and by the fault bridge, and stores must be
//! visible across that boundary without compiler reordering or caching.

use alloc::boxed::Box;
use alloc::vec::Vec;

use portable_atomic::{AtomicPtr, AtomicU32, Ordering};

use crate::arch::JumpBuf;
use crate::error::{ExcResult, INVALID_ARGUMENT, NONE, OUT_OF_MEMORY};
use crate::registry::ThreadInfo;

/// One slot's exception state.
///
/// `resume` is non-null only while a try block is lexically active for the
/// slot. `code` holds [`NONE`] unless an exception is in flight or was just
/// caught.
#[repr(C)]
pub struct ExceptionFrame {
    pub(crate) resume: AtomicPtr<JumpBuf>,
    pub(crate) code: AtomicU32,
}

impl ExceptionFrame {
    pub(crate) const fn new() -> Self {
        Self {
            resume: AtomicPtr::new(core::ptr::null_mut()),
            code: AtomicU32::new(NONE),
        }
    }
}

/// One immutable snapshot of the slot tables. `frames` and `infos` are always
/// the same length; slot 0 is the catch-all and never holds a registered
/// thread.
pub(crate) struct Tables {
    pub(crate) len: usize,
    pub(crate) frames: &'static [ExceptionFrame],
    pub(crate) infos: &'static [ThreadInfo],
}

static FRAME0: [ExceptionFrame; 1] = [ExceptionFrame::new()];
static INFO0: [ThreadInfo; 1] = [ThreadInfo::new()];
static INITIAL: Tables = Tables {
    len: 1,
    frames: &FRAME0,
    infos: &INFO0,
};

static TABLES: AtomicPtr<Tables> = AtomicPtr::new(&INITIAL as *const Tables as *mut Tables);

/// Current snapshot. Safe from any context, including with interrupts
/// disabled: one atomic load, no locks, no allocation.
pub(crate) fn tables() -> &'static Tables {
    unsafe { &*TABLES.load(Ordering::SeqCst) }
}

/// The frame for `slot`. Out-of-range slots resolve to the catch-all so the
/// result is always a valid frame, even while the tables are being swapped.
pub(crate) fn frame(slot: usize) -> &'static ExceptionFrame {
    let tables = tables();
    let slot = if slot < tables.len { slot } else { 0 };
    &tables.frames[slot]
}

/// Grow both tables to `new_len` slots. Caller holds the registry lock.
///
/// Existing slot contents keep their indices and values; new slots start
/// empty. Fails with [`INVALID_ARGUMENT`] when `new_len` does not increase
/// capacity and with [`OUT_OF_MEMORY`] when the backing allocation fails, in
/// both cases leaving the previous snapshot untouched.
pub(crate) fn grow(new_len: usize) -> ExcResult<()> {
    let current = tables();
    if new_len <= current.len {
        return Err(INVALID_ARGUMENT);
    }

    let mut frames: Vec<ExceptionFrame> = Vec::new();
    if frames.try_reserve_exact(new_len).is_err() {
        return Err(OUT_OF_MEMORY);
    }
    let mut infos: Vec<ThreadInfo> = Vec::new();
    if infos.try_reserve_exact(new_len).is_err() {
        return Err(OUT_OF_MEMORY);
    }
    for _ in 0..new_len {
        frames.push(ExceptionFrame::new());
        infos.push(ThreadInfo::new());
    }
    for slot in 0..current.len {
        frames[slot]
            .resume
            .store(current.frames[slot].resume.load(Ordering::SeqCst), Ordering::SeqCst);
        frames[slot]
            .code
            .store(current.frames[slot].code.load(Ordering::SeqCst), Ordering::SeqCst);
        infos[slot].copy_from(&current.infos[slot]);
    }

    let next = Box::leak(Box::new(Tables {
        len: new_len,
        frames: Vec::leak(frames),
        infos: Vec::leak(infos),
    }));
    TABLES.store(next, Ordering::SeqCst);
    Ok(())
}
