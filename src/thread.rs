//! Thread lifecycle wrapper: create a substrate thread whose body runs inside
//! a try scope, with a crash callback and guaranteed registration before the
//! body can observe anything.

use alloc::boxed::Box;

use crate::catch::{catch, throw};
use crate::error::{ExcResult, ExceptionCode, THREAD_START_FAILED, TOO_MANY_THREADS};
use crate::registry::{self, ExceptionCallback};
use crate::substrate::{self, RawHandle};

/// Entry point of a user thread body.
pub type ThreadEntry = fn(usize);

/// Transient record handed to the wrapper thread. Owned and reclaimed by the
/// new thread.
struct StartRecord {
    entry: ThreadEntry,
    arg: usize,
}

/// Create a registered thread running `entry(arg)` inside a try scope.
///
/// Throws [`TOO_MANY_THREADS`] when the registry has no free slot for another
/// thread and [`THREAD_START_FAILED`] when the substrate refuses the thread
/// (or none is installed); both are raised only after the creation lock has
/// been released. On success the handle is registered before the new thread
/// runs any observable work: the wrapper's first act is to block on the same
/// creation lock, so it cannot reach the throw or fault paths unregistered.
///
/// If `entry` throws without catching, `callback` (when given) runs on the
/// failing thread with the code and the slot's [`registry::ThreadInfo`], the
/// event is logged, and the thread is torn down without any cleanup of
/// resources it holds. A normally-returning `entry` is expected to call
/// [`terminate_current_thread`] itself.
pub fn create_thread(
    name: &str,
    priority: u32,
    entry: ThreadEntry,
    arg: usize,
    stack_size: usize,
    callback: Option<ExceptionCallback>,
) -> RawHandle {
    match create_inner(name, priority, entry, arg, stack_size, callback) {
        Ok(handle) => handle,
        Err(code) => {
            throw(code);
            0
        }
    }
}

fn create_inner(
    name: &str,
    priority: u32,
    entry: ThreadEntry,
    arg: usize,
    stack_size: usize,
    callback: Option<ExceptionCallback>,
) -> ExcResult<RawHandle> {
    let substrate = substrate::get().ok_or(THREAD_START_FAILED)?;
    let _guard = registry::lock();

    if registry::active_thread_count() >= registry::thread_capacity().saturating_sub(1) {
        return Err(TOO_MANY_THREADS);
    }

    let record = Box::into_raw(Box::new(StartRecord { entry, arg }));
    match substrate.create(name, priority, thread_wrapper, record as usize, stack_size) {
        Ok(handle) => {
            // still under the creation lock; the wrapper is parked on it
            registry::register_thread(handle, name, callback)?;
            Ok(handle)
        }
        Err(code) => {
            drop(unsafe { Box::from_raw(record) });
            Err(code)
        }
    }
}

/// Unregister the calling thread and hand it back to the substrate. The last
/// thing a thread body should call; also the wrapper's backstop.
pub fn terminate_current_thread() {
    let handle = substrate::get().map_or(0, |s| s.current());
    registry::unregister_current_thread();
    if let Some(substrate) = substrate::get() {
        substrate.cleanup(handle);
    }
}

/// Runs on the new thread. Waits for registration to complete, then runs the
/// user body inside a try scope.
fn thread_wrapper(arg: usize) {
    // taking and releasing the creation lock serializes against the creator,
    // even when this thread outranks it
    drop(registry::lock());

    let slot = registry::current_slot();
    {
        let info = registry::info(slot);
        log::info!(
            "thread {} ({} @ {:#010x}) started",
            slot,
            info.name().as_str(),
            info.handle()
        );
    }

    let record = unsafe { Box::from_raw(arg as *mut StartRecord) };
    let StartRecord { entry, arg } = *record;

    if let Some(code) = catch(|| entry(arg)) {
        crashed(slot, code);
    }

    terminate_current_thread();
}

fn crashed(slot: usize, code: ExceptionCode) {
    let info = registry::info(slot);
    if let Some(callback) = info.callback() {
        callback(code, info);
    }
    log::error!(
        "exception {:#010x} not handled in thread {} ({} @ {:#010x})",
        code,
        slot,
        info.name().as_str(),
        info.handle()
    );
    log::error!(
        "thread {} terminated. **WARNING: dynamic or external resources are not cleaned up**",
        slot
    );
    registry::log_thread_table(slot);
}
