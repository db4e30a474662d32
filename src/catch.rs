//! The throw/try/catch protocol.
//!
//! There are no language-level exceptions here: a try block captures a resume
//! point into its slot's frame, and a throw anywhere below it transfers
//! control straight back to that point, abandoning the intervening stack in a
//! single unwind. No drop glue runs for the abandoned frames.
//!
//! What survives a caught throw: state behind shared or interior-mutable
//! storage (atomics, `UnsafeCell`, statics, anything reached through a
//! pointer captured before the try). Ordinary locals of the frame that entered
//! the try may hold their capture-time values again after the transfer, and
//! the body closure of a thrown-through [`catch`] is leaked, not dropped.
//! That is the documented cost of the mechanism, not an accident; keep
//! anything that must observe the throw in shared storage.

use core::mem::ManuallyDrop;

use portable_atomic::{AtomicPtr, Ordering};

use crate::arch::{self, JumpBuf};
use crate::error::{code_name, ExceptionCode, NONE};
use crate::{frame, registry};

/// Decides the fate of an exception that reached the end of its thread's
/// frame stack. Return `true` to halt the system, `false` to continue at the
/// throw site.
pub type UnhandledHook = fn(ExceptionCode) -> bool;

/// Final unrecoverable-failure handler. Never returns.
pub type HaltHandler = fn(ExceptionCode) -> !;

static UNHANDLED_HOOK: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());
static HALT_HANDLER: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Run `body` as a try block on the calling thread's slot.
///
/// Returns `None` when `body` completes normally or leaves via [`exit_try`],
/// and `Some(code)` when a throw from inside `body` (any call depth) was
/// caught here. Nested calls save and restore the slot's previous resume
/// point, so inner catches never leak to outer ones and re-entering a try
/// from a caught branch is independent.
#[inline(never)]
pub fn catch<F: FnOnce()>(body: F) -> Option<ExceptionCode> {
    let slot = registry::current_slot();
    let mut point = JumpBuf::new();
    let previous = frame::frame(slot).resume.load(Ordering::SeqCst);
    frame::frame(slot).code.store(NONE, Ordering::SeqCst);
    frame::frame(slot)
        .resume
        .store(&mut point as *mut JumpBuf, Ordering::SeqCst);

    // ManuallyDrop keeps the abandoned-body case free of drop flags: a body
    // thrown through is leaked, never dropped.
    let mut body = ManuallyDrop::new(body);
    let caught = if unsafe { arch::capture(&mut point) } == 0 {
        run_body(unsafe { ManuallyDrop::take(&mut body) });
        frame::frame(slot).code.store(NONE, Ordering::SeqCst);
        None
    } else {
        // resumed from a throw; everything is re-read from the frame
        let code = frame::frame(slot).code.load(Ordering::SeqCst);
        if code == NONE {
            None
        } else {
            Some(code)
        }
    };
    frame::frame(slot).resume.store(previous, Ordering::SeqCst);
    caught
}

/// Guarded-body trampoline. Kept out of line so the body always runs in a
/// child frame of the captured one.
#[inline(never)]
fn run_body<F: FnOnce()>(body: F) {
    body();
}

/// Raise `code` on the calling thread.
///
/// Transfers control to the nearest enclosing [`catch`] on this thread, if
/// any. With no enclosing try the global unhandled-exception path runs
/// instead: the event is logged, the configured [`UnhandledHook`] decides,
/// and on a halt verdict the [`HaltHandler`] is invoked. `throw` returns only
/// when an unhandled exception is deliberately continued past.
pub fn throw(code: ExceptionCode) {
    let slot = registry::current_slot();
    let frame = frame::frame(slot);
    frame.code.store(code, Ordering::SeqCst);
    let resume = frame.resume.load(Ordering::SeqCst);
    if !resume.is_null() {
        unsafe { arch::resume(resume) };
    }
    unhandled(code);
}

/// Leave the nearest enclosing try block without running its catch branch.
pub fn exit_try() {
    throw(NONE);
}

/// Install the unhandled-exception hook. Intended to be set once at startup;
/// the default halts.
pub fn set_unhandled_hook(hook: UnhandledHook) {
    UNHANDLED_HOOK.store(hook as *mut (), Ordering::SeqCst);
}

/// Install the halt handler. Intended to be set once at startup; the default
/// parks the core after logging. Any log-flush grace delay belongs in the
/// handler itself.
pub fn set_halt_handler(handler: HaltHandler) {
    HALT_HANDLER.store(handler as *mut (), Ordering::SeqCst);
}

fn unhandled(code: ExceptionCode) {
    match code_name(code) {
        Some(name) => log::error!("unhandled exception {:#010x} ({})", code, name),
        None => log::error!("unhandled exception {:#010x}", code),
    }
    let hook = UNHANDLED_HOOK.load(Ordering::SeqCst);
    let halt_wanted = if hook.is_null() {
        true
    } else {
        let hook: UnhandledHook = unsafe { core::mem::transmute(hook) };
        hook(code)
    };
    if halt_wanted {
        log::error!("halting application");
        let handler = HALT_HANDLER.load(Ordering::SeqCst);
        if handler.is_null() {
            default_halt(code)
        } else {
            let handler: HaltHandler = unsafe { core::mem::transmute(handler) };
            handler(code)
        }
    }
}

fn default_halt(_code: ExceptionCode) -> ! {
    loop {
        core::hint::spin_loop();
    }
}
