//! Platform context switch.
//!
//! `asm_switch(next, current, ret_val)` saves the callee-saved registers on
//! the current stack, stores the stack pointer into `current`, restores the
//! stack pointer from `next`, pops `next`'s callee-saved registers and
//! returns into it. For a fiber being entered for the first time,
//! [`prepare_stack`] lays the stack out so that this "return" lands at the
//! start of the job function, with a trampoline to
//! [`fiber_exit`](crate::fiber::fiber_exit) as the job's return address.
//!
//! Everything here depends on the exact calling convention of the target:
//! which registers are callee-saved, how the stack must be aligned around a
//! call, and which register carries the first argument. Each supported
//! target gets its own assembly; unsupported targets fail to compile.

use std::ffi::c_void;

use crate::fiber::Fiber;
use crate::manager::JobFn;

#[cfg(all(target_arch = "x86_64", unix))]
mod imp {
    use super::*;
    use std::arch::global_asm;

    /// rbx, rbp, r12, r13, r14, r15.
    pub const NUM_CALLEE_SAVED: usize = 6;

    // System V AMD64: arguments in rdi, rsi, rdx; return value in rax.
    //
    // The save/restore order must mirror between push and pop, and the
    // job_param load relies on the field living at offset 8 of the fiber
    // (statically asserted in fiber.rs). Loading the param also happens
    // when resuming mid-job or switching to a host context; rdi is
    // caller-saved, so the stray load is harmless there.
    global_asm!(
        r#"
        .balign 16
        .global amaranth_asm_switch
        .global _amaranth_asm_switch
    amaranth_asm_switch:
    _amaranth_asm_switch:
        mov rax, rdx

        push rbx
        push rbp
        push r12
        push r13
        push r14
        push r15

        mov qword ptr [rsi], rsp
        mov rsp, qword ptr [rdi]

        pop r15
        pop r14
        pop r13
        pop r12
        pop rbp
        pop rbx

        mov rdi, qword ptr [rdi + 8]
        ret
        "#
    );

    // Runs when a job function returns: the stack prepared by
    // `prepare_stack` leaves the host and fiber pointers right above the
    // job's frame. Popping both realigns rsp to 16 bytes, so the call below
    // enters `fiber_exit` on a conforming stack. `fiber_exit` never
    // returns.
    global_asm!(
        r#"
        .balign 16
        .global amaranth_fiber_exit_thunk
        .global _amaranth_fiber_exit_thunk
    amaranth_fiber_exit_thunk:
    _amaranth_fiber_exit_thunk:
        pop rdi
        pop rsi
        call {fiber_exit}
        ud2
        "#,
        fiber_exit = sym crate::fiber::fiber_exit,
    );

    extern "C" {
        pub fn amaranth_asm_switch(
            next: *mut Fiber,
            current: *mut Fiber,
            ret_val: usize,
        ) -> usize;
        fn amaranth_fiber_exit_thunk();
    }

    /// Lay out a fresh fiber stack.
    ///
    /// From the (16-byte aligned) top downwards: the fiber and host
    /// pointers for the exit thunk, the exit thunk as the job's return
    /// address, the job function as the switch target, then zeroed slots
    /// for the callee-saved registers. With this layout the job function is
    /// entered with rsp ≡ 8 (mod 16), exactly as if it had been called.
    ///
    /// The job parameter is not stored here; `asm_switch` loads it from the
    /// fiber's `job_param` field on every switch.
    ///
    /// # Safety
    ///
    /// `top` must be the 16-byte aligned top of a live fiber stack with
    /// room for the frame; `fiber` and `host` must stay valid while the
    /// fiber can run.
    pub unsafe fn prepare_stack(
        top: *mut usize,
        fiber: *mut Fiber,
        host: *mut Fiber,
        job_fn: JobFn,
        _job_param: *mut c_void,
    ) -> *mut usize {
        let mut sp = top;
        push(&mut sp, fiber as usize);
        push(&mut sp, host as usize);
        push(&mut sp, amaranth_fiber_exit_thunk as usize);
        push(&mut sp, job_fn as usize);
        for _ in 0..NUM_CALLEE_SAVED {
            push(&mut sp, 0);
        }
        sp
    }
}

#[cfg(target_arch = "aarch64")]
mod imp {
    use super::*;
    use std::arch::global_asm;
    use std::ptr;

    /// x19–x28, fp, lr, d8–d15.
    pub const NUM_CALLEE_SAVED: usize = 20;

    // AAPCS64: arguments in x0..x7, return value in x0. The return
    // register doubles as the first-argument register, so unlike x86-64
    // the job parameter cannot be loaded inside the switch itself; the
    // entry thunk below pops it off the prepared stack instead.
    global_asm!(
        r#"
        .balign 16
        .global amaranth_asm_switch
        .global _amaranth_asm_switch
    amaranth_asm_switch:
    _amaranth_asm_switch:
        sub sp, sp, #160
        stp x19, x20, [sp, #0]
        stp x21, x22, [sp, #16]
        stp x23, x24, [sp, #32]
        stp x25, x26, [sp, #48]
        stp x27, x28, [sp, #64]
        stp x29, x30, [sp, #80]
        stp d8,  d9,  [sp, #96]
        stp d10, d11, [sp, #112]
        stp d12, d13, [sp, #128]
        stp d14, d15, [sp, #144]

        mov x9, sp
        str x9, [x1]
        ldr x9, [x0]
        mov sp, x9

        ldp x19, x20, [sp, #0]
        ldp x21, x22, [sp, #16]
        ldp x23, x24, [sp, #32]
        ldp x25, x26, [sp, #48]
        ldp x27, x28, [sp, #64]
        ldp x29, x30, [sp, #80]
        ldp d8,  d9,  [sp, #96]
        ldp d10, d11, [sp, #112]
        ldp d12, d13, [sp, #128]
        ldp d14, d15, [sp, #144]
        add sp, sp, #160

        mov x0, x2
        ret
        "#
    );

    // First entry into a fresh fiber: the restored link register points
    // here. Pops the job function and its parameter, installs the exit
    // thunk as the job's return address, and tail-jumps into the job.
    global_asm!(
        r#"
        .balign 16
        .global amaranth_fiber_entry_thunk
        .global _amaranth_fiber_entry_thunk
    amaranth_fiber_entry_thunk:
    _amaranth_fiber_entry_thunk:
        ldp x9, x0, [sp], #16
        ldp x30, x10, [sp], #16
        br x9
        "#
    );

    // Runs when a job function returns. `fiber_exit` never returns.
    global_asm!(
        r#"
        .balign 16
        .global amaranth_fiber_exit_thunk
        .global _amaranth_fiber_exit_thunk
    amaranth_fiber_exit_thunk:
    _amaranth_fiber_exit_thunk:
        ldp x0, x1, [sp], #16
        bl {fiber_exit}
        brk #0
        "#,
        fiber_exit = sym crate::fiber::fiber_exit,
    );

    extern "C" {
        pub fn amaranth_asm_switch(
            next: *mut Fiber,
            current: *mut Fiber,
            ret_val: usize,
        ) -> usize;
        fn amaranth_fiber_entry_thunk();
        fn amaranth_fiber_exit_thunk();
    }

    /// Lay out a fresh fiber stack.
    ///
    /// From the (16-byte aligned) top downwards: the host/fiber pair for
    /// the exit thunk, the exit thunk address (with a pad word keeping sp
    /// 16-byte aligned), the job function and its parameter for the entry
    /// thunk, then the register save area restored by `asm_switch`, with
    /// the saved link register pointing at the entry thunk.
    ///
    /// # Safety
    ///
    /// Same contract as the x86-64 variant.
    pub unsafe fn prepare_stack(
        top: *mut usize,
        fiber: *mut Fiber,
        host: *mut Fiber,
        job_fn: JobFn,
        job_param: *mut c_void,
    ) -> *mut usize {
        let mut sp = top;
        push(&mut sp, fiber as usize);
        push(&mut sp, host as usize);
        push(&mut sp, 0);
        push(&mut sp, amaranth_fiber_exit_thunk as usize);
        push(&mut sp, job_param as usize);
        push(&mut sp, job_fn as usize);

        sp = sp.sub(NUM_CALLEE_SAVED);
        ptr::write_bytes(sp, 0, NUM_CALLEE_SAVED);
        // The x29/x30 pair sits at byte offset 80 of the save area.
        *sp.add(11) = amaranth_fiber_entry_thunk as usize;
        sp
    }
}

#[cfg(not(any(all(target_arch = "x86_64", unix), target_arch = "aarch64")))]
compile_error!("the fiber context switch is not implemented for this target");

pub(crate) use imp::prepare_stack;

/// Switch execution to `next`, saving the running context into `current`.
///
/// Returns (in the resumed context) the `ret_val` passed by whoever
/// switches back.
///
/// # Safety
///
/// Both fibers must point at live, correctly prepared contexts; `next` must
/// not be running anywhere else.
pub(crate) unsafe fn asm_switch(next: *mut Fiber, current: *mut Fiber, ret_val: usize) -> usize {
    imp::amaranth_asm_switch(next, current, ret_val)
}

/// Push one machine word onto a downward-growing stack.
#[inline]
unsafe fn push(sp: &mut *mut usize, value: usize) {
    *sp = sp.sub(1);
    **sp = value;
}
