//! End-to-end exercise of the public surface on the host substrate.
//!
//! Runs in its own process, so absolute capacity numbers are dependable here.

#![cfg(feature = "std")]

extern crate std;

use portable_atomic::{AtomicU32, AtomicUsize, Ordering};

use faultline::{
    activate_hardware_handlers, active_thread_count, catch, create_thread, install_substrate,
    raise_thread_capacity, set_halt_handler, terminate_current_thread, thread_capacity, throw,
    ExceptionCode, HostSubstrate, ThreadInfo, INVALID_ARGUMENT, TOO_MANY_THREADS,
};

static CRASH_CODE: AtomicU32 = AtomicU32::new(0);
static CRASH_HANDLE: AtomicUsize = AtomicUsize::new(0);

fn record_crash(code: ExceptionCode, info: &ThreadInfo) {
    CRASH_CODE.store(code, Ordering::SeqCst);
    CRASH_HANDLE.store(info.handle(), Ordering::SeqCst);
}

fn crashing_body(_arg: usize) {
    throw(0xC0DE);
}

fn quiet_body(_arg: usize) {
    terminate_current_thread();
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    while !cond() {
        assert!(
            std::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        std::thread::sleep(std::time::Duration::from_millis(2));
    }
}

fn fail_instead_of_halt(code: ExceptionCode) -> ! {
    panic!("halt requested for exception {code:#010x}");
}

/// One sequential scenario; the public API shares one process-wide registry,
/// so ordering matters and everything lives in a single test.
#[test]
fn lifecycle_scenario() {
    install_substrate(HostSubstrate::instance());
    set_halt_handler(fail_instead_of_halt);

    // fresh process: only the catch-all slot exists
    assert_eq!(thread_capacity(), 1);
    assert_eq!(active_thread_count(), 0);
    let caught = catch(|| {
        create_thread("early", 2, quiet_body, 0, 0, None);
    });
    assert_eq!(caught, Some(TOO_MANY_THREADS));

    assert_eq!(catch(|| raise_thread_capacity(4)), None);
    assert_eq!(thread_capacity(), 4);
    assert_eq!(catch(|| raise_thread_capacity(4)), Some(INVALID_ARGUMENT));

    // a crashing worker takes down only itself and reports through its callback
    let caught = catch(|| {
        create_thread("crasher", 2, crashing_body, 0, 0, Some(record_crash));
    });
    assert_eq!(caught, None);
    wait_until("crash callback", || CRASH_CODE.load(Ordering::SeqCst) != 0);
    assert_eq!(CRASH_CODE.load(Ordering::SeqCst), 0xC0DE);
    assert_ne!(CRASH_HANDLE.load(Ordering::SeqCst), 0);
    wait_until("crasher to unregister", || active_thread_count() == 0);

    // installing fault vectors off-target is a logged no-op
    activate_hardware_handlers();
}
