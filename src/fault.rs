//! The hardware fault bridge, stage 2, and the staged snapshot format.
//!
//! Stage 1 lives in `arch::cortex_m`: it runs at fault entry with interrupts
//! disabled, copies the hardware-stacked registers and the fault status
//! registers into [`FAULT_STAGING`], redirects the stacked return address
//! here and performs the architectural exception return. Stage 2 below then
//! runs in ordinary thread mode on the faulting thread and pushes the fault
//! through the normal throw path as [`HARDWARE_EXCEPTION`].
//!
//! The staging buffer has a single writer at a time because the hardware
//! allows only one outstanding fault; no software locking is involved.

use core::cell::UnsafeCell;

use portable_atomic::Ordering;

use crate::catch::throw;
use crate::error::HARDWARE_EXCEPTION;
use crate::{arch, registry};

/// Words in a fault snapshot: the eight hardware-stacked registers plus HFSR
/// and CFSR.
pub const FAULT_WORDS: usize = 10;

/// Indices into a fault snapshot.
pub mod reg {
    pub const R0: usize = 0;
    pub const R1: usize = 1;
    pub const R2: usize = 2;
    pub const R3: usize = 3;
    pub const R12: usize = 4;
    pub const LR: usize = 5;
    /// Address of the faulting instruction.
    pub const PC: usize = 6;
    pub const PSR: usize = 7;
    pub const HFSR: usize = 8;
    pub const CFSR: usize = 9;
}

/// CFSR bits of interest when classifying a snapshot.
pub mod cfsr {
    /// UsageFault: divide by zero (UFSR.DIVBYZERO).
    pub const DIVBYZERO: u32 = 1 << 25;
    /// UsageFault: unaligned access (UFSR.UNALIGNED).
    pub const UNALIGNED: u32 = 1 << 24;
    /// UsageFault: undefined instruction (UFSR.UNDEFINSTR).
    pub const UNDEFINSTR: u32 = 1 << 16;
    /// BusFault: precise data access error (BFSR.PRECISERR).
    pub const PRECISERR: u32 = 1 << 9;
    /// BusFault: instruction fetch error (BFSR.IBUSERR).
    pub const IBUSERR: u32 = 1 << 8;
    /// MemManage: data access violation (MMFSR.DACCVIOL).
    pub const DACCVIOL: u32 = 1 << 1;
    /// MemManage: instruction access violation (MMFSR.IACCVIOL).
    pub const IACCVIOL: u32 = 1 << 0;
}

#[repr(C, align(4))]
pub(crate) struct StagingBuffer(pub(crate) UnsafeCell<[u32; FAULT_WORDS]>);

// single writer by the hardware's one-outstanding-fault rule
unsafe impl Sync for StagingBuffer {}

/// Written by stage 1 in fault context, drained and cleared by stage 2.
pub(crate) static FAULT_STAGING: StagingBuffer = StagingBuffer(UnsafeCell::new([0; FAULT_WORDS]));

/// Stage 2 of the fault bridge.
///
/// Entered by exception return from stage 1, on the faulting thread's stack,
/// with interrupts still disabled. Drains the staging buffer into the current
/// slot's exception data, re-enables interrupts, logs the capture and throws
/// [`HARDWARE_EXCEPTION`] through the ordinary protocol: nearest enclosing
/// try on this thread, or the global unhandled path.
pub extern "C" fn fault_stage2() {
    let snapshot = unsafe { core::ptr::read_volatile(FAULT_STAGING.0.get()) };
    unsafe { core::ptr::write_volatile(FAULT_STAGING.0.get(), [0; FAULT_WORDS]) };

    let info = registry::info(registry::current_slot());
    for word in 0..FAULT_WORDS {
        info.exception_data[word].store(snapshot[word], Ordering::SeqCst);
    }

    arch::irq_enable();

    log::error!("HARDWARE EXCEPTION CAUGHT");
    log::error!("r0   = {:#010x}", snapshot[reg::R0]);
    log::error!("r1   = {:#010x}", snapshot[reg::R1]);
    log::error!("r2   = {:#010x}", snapshot[reg::R2]);
    log::error!("r3   = {:#010x}", snapshot[reg::R3]);
    log::error!("r12  = {:#010x}", snapshot[reg::R12]);
    log::error!("lr   = {:#010x}", snapshot[reg::LR]);
    log::error!("pc   = {:#010x}", snapshot[reg::PC]);
    log::error!("psr  = {:#010x}", snapshot[reg::PSR]);
    log::error!("hfsr = {:#010x}", snapshot[reg::HFSR]);
    log::error!("cfsr = {:#010x}", snapshot[reg::CFSR]);

    throw(HARDWARE_EXCEPTION);
}

/// Redirect the four synchronous fault vectors (hard fault, mem-manage, bus
/// fault, usage fault) at the stage-1 handler, relocating the vector table
/// out of ROM first when needed. Idempotent. On targets without the Cortex-M
/// bridge this logs a warning and does nothing.
pub fn activate_hardware_handlers() {
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    arch::cortex_m::activate_hardware_handlers();

    #[cfg(not(all(target_arch = "arm", target_os = "none")))]
    log::warn!("hardware fault vectors are only installable on Cortex-M targets");
}

/// Load a synthetic snapshot into the staging buffer, standing in for stage 1
/// when exercising the bridge off-target.
#[cfg(test)]
pub(crate) fn stage_synthetic_fault(snapshot: [u32; FAULT_WORDS]) {
    unsafe { core::ptr::write_volatile(FAULT_STAGING.0.get(), snapshot) };
}
