//! Architecture layer: continuation capture and resume, interrupt control.
//!
//! Each architecture module provides the same surface:
//!
//! - `JumpBuf`, the saved resume point (callee-saved registers, stack pointer,
//!   return address);
//! - `capture(point) -> u32`, returning 0 on the initial capture and 1 when a
//!   later `resume` transfers control back to it;
//! - `resume(point) -> !`, which re-returns from the matching `capture`;
//! - `irq_disable() -> u32` / `irq_restore(state)` / `irq_enable()`.
//!
//! `capture` and `resume` are freestanding naked functions rather than trait
//! methods: the captured return point must belong to the frame of the direct
//! caller, so no wrapper frame may sit in between.
//!
//! Only the current slot's frame may hold a pointer to a `JumpBuf`, and only
//! while the capturing function's frame is still live. The try/catch protocol
//! in `catch` upholds this; nothing else may call these primitives.

#[cfg(target_arch = "x86_64")]
pub mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use x86_64::{capture, irq_disable, irq_enable, irq_restore, resume, JumpBuf};

#[cfg(target_arch = "aarch64")]
pub mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use aarch64::{capture, irq_disable, irq_enable, irq_restore, resume, JumpBuf};

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use cortex_m::{capture, irq_disable, irq_enable, irq_restore, resume, JumpBuf};

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    all(target_arch = "arm", target_os = "none")
)))]
compile_error!("no continuation-capture support for this target architecture");
