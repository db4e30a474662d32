//! x86_64 continuation primitives (System V ABI).
//!
//! Used when the library runs hosted, for simulation and testing, or inside an
//! x86_64 kernel. Interrupt masking is owned by the surrounding host on this
//! target, so the irq functions are no-ops.

use core::arch::naked_asm;

/// Saved resume point: callee-saved registers plus stack pointer and return
/// address, in the order the assembly below stores them.
#[repr(C)]
pub struct JumpBuf {
    /// rbx, rbp, r12, r13, r14, r15, rsp, return address
    regs: [u64; 8],
}

impl JumpBuf {
    pub const fn new() -> Self {
        Self { regs: [0; 8] }
    }
}

impl Default for JumpBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Capture the caller's resume point into `point`.
///
/// Returns 0 on the initial capture; returns 1 when control comes back through
/// [`resume`].
///
/// # Safety
///
/// - `point` must be valid for writes and stay valid (and pinned) for as long
///   as a `resume` through it may occur
/// - the caller's frame must still be live when `resume` is called; resuming
///   into a dead frame is undefined behavior
/// - locals modified after the capture may hold their capture-time values
///   again after a resume; only state behind shared/interior-mutable storage
///   is guaranteed current
#[unsafe(naked)]
pub unsafe extern "C" fn capture(point: *mut JumpBuf) -> u32 {
    naked_asm!(
        "mov [rdi + 0], rbx",
        "mov [rdi + 8], rbp",
        "mov [rdi + 16], r12",
        "mov [rdi + 24], r13",
        "mov [rdi + 32], r14",
        "mov [rdi + 40], r15",
        "lea rax, [rsp + 8]",        // caller rsp, as it is after this call returns
        "mov [rdi + 48], rax",
        "mov rax, [rsp]",            // return address into the caller
        "mov [rdi + 56], rax",
        "xor eax, eax",
        "ret",
    );
}

/// Transfer control back to the matching [`capture`], which returns 1.
///
/// # Safety
///
/// `point` must have been filled by `capture`, and the capturing frame must
/// still be live. Everything on the stack below the captured stack pointer is
/// discarded without cleanup.
#[unsafe(naked)]
pub unsafe extern "C" fn resume(point: *const JumpBuf) -> ! {
    naked_asm!(
        "mov rbx, [rdi + 0]",
        "mov rbp, [rdi + 8]",
        "mov r12, [rdi + 16]",
        "mov r13, [rdi + 24]",
        "mov r14, [rdi + 32]",
        "mov r15, [rdi + 40]",
        "mov rsp, [rdi + 48]",       // unwind to the captured stack pointer
        "mov eax, 1",
        "jmp qword ptr [rdi + 56]",  // re-return from capture
    );
}

pub fn irq_disable() -> u32 {
    0
}

pub fn irq_restore(_state: u32) {}

pub fn irq_enable() {}
