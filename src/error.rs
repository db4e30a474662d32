//! Exception code taxonomy.
//!
//! Exception codes are plain `u32` values so they can be written into a slot's
//! frame from fault context without any encoding step. A handful of values are
//! reserved for the library itself; user code owns the rest of the space and
//! must not collide with them.

/// An exception identifier, carried from `throw` to the matching catch.
pub type ExceptionCode = u32;

/// Sentinel meaning "no exception in flight". Never a real exception.
pub const NONE: ExceptionCode = 0x5A5A_5A5A;

/// Backing-table allocation failed, or the registry has no free slot left.
pub const OUT_OF_MEMORY: ExceptionCode = 0x5A5A_0000;

/// The thread substrate refused to start a new thread.
pub const THREAD_START_FAILED: ExceptionCode = 0x5A5A_0001;

/// Thread creation would exceed the registered-thread capacity.
pub const TOO_MANY_THREADS: ExceptionCode = 0x5A5A_0002;

/// A capacity change that does not increase capacity, or a similar misuse.
pub const INVALID_ARGUMENT: ExceptionCode = 0x5A5A_0003;

/// A CPU-detected fault re-expressed as a software exception by the fault
/// bridge. The high-bit pattern keeps it apart from anything user code throws.
pub const HARDWARE_EXCEPTION: ExceptionCode = 0xFFFF_FF00;

/// Returns `true` for codes the library reserves for its own use.
pub fn is_reserved(code: ExceptionCode) -> bool {
    matches!(
        code,
        NONE | OUT_OF_MEMORY | THREAD_START_FAILED | TOO_MANY_THREADS | INVALID_ARGUMENT
            | HARDWARE_EXCEPTION
    )
}

/// Diagnostic name for a reserved code, `None` for user codes.
pub fn code_name(code: ExceptionCode) -> Option<&'static str> {
    match code {
        NONE => Some("none"),
        OUT_OF_MEMORY => Some("out of memory"),
        THREAD_START_FAILED => Some("thread start failed"),
        TOO_MANY_THREADS => Some("too many threads"),
        INVALID_ARGUMENT => Some("invalid argument"),
        HARDWARE_EXCEPTION => Some("hardware exception"),
        _ => None,
    }
}

/// Result alias used by the registry and lifecycle internals. Only the public
/// control-flow operations convert an `Err` into a `throw`, and they do so
/// after every lock guard has been dropped.
pub type ExcResult<T> = Result<T, ExceptionCode>;
