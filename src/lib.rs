#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod arch;
pub mod catch;
pub mod error;
pub mod fault;
pub mod frame;
pub mod registry;
pub mod substrate;
pub mod sync;
pub mod thread;


#[cfg(all(not(test), not(feature = "std"), target_os = "none"))]
use core::panic::PanicInfo;

#[cfg(all(not(test), not(feature = "std"), target_os = "none"))]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    loop {}
}

pub use catch::{catch, exit_try, set_halt_handler, set_unhandled_hook, throw};
pub use error::{
    ExceptionCode, HARDWARE_EXCEPTION, INVALID_ARGUMENT, NONE, OUT_OF_MEMORY,
    THREAD_START_FAILED, TOO_MANY_THREADS,
};
pub use fault::{activate_hardware_handlers, FAULT_WORDS};
pub use registry::{
    active_thread_count, current_exception_data, current_slot, raise_thread_capacity,
    register_thread, slot_of, thread_capacity, thread_info, unregister_current_thread,
    unregister_thread, ExceptionCallback, ThreadInfo, MAX_NAME_LEN,
};
pub use substrate::{install_substrate, RawHandle, ThreadSubstrate};
pub use sync::locked_section;
pub use thread::{create_thread, terminate_current_thread, ThreadEntry};

#[cfg(any(test, feature = "std"))]
pub use substrate::HostSubstrate;
