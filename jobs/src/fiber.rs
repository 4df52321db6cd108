//! Fibers: user-space execution contexts with their own stacks.

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ffi::c_void;
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::counter::Counter;
use crate::manager::QueuedJob;
use crate::switch;

/// Size of each fiber stack in bytes.
pub const FIBER_STACK_SIZE: usize = 64 * 1024;

/// Required by the calling conventions of every supported target.
const STACK_ALIGN: usize = 16;

const _: () = assert!(FIBER_STACK_SIZE % STACK_ALIGN == 0);

/// Owned heap allocation backing one fiber stack.
pub(crate) struct FiberStack {
    base: NonNull<u8>,
}

impl FiberStack {
    fn layout() -> Layout {
        Layout::from_size_align(FIBER_STACK_SIZE, STACK_ALIGN).expect("valid stack layout")
    }

    fn new() -> Self {
        let layout = Self::layout();
        let base = unsafe { alloc(layout) };
        let Some(base) = NonNull::new(base) else {
            handle_alloc_error(layout);
        };
        Self { base }
    }

    /// One past the highest address of the allocation; stacks grow
    /// downwards from here. 16-byte aligned because the base and size are.
    fn top(&self) -> *mut usize {
        unsafe { self.base.as_ptr().add(FIBER_STACK_SIZE).cast() }
    }
}

impl Drop for FiberStack {
    fn drop(&mut self) {
        unsafe { dealloc(self.base.as_ptr(), Self::layout()) }
    }
}

// The allocation is plain bytes; only one worker touches it at a time.
unsafe impl Send for FiberStack {}

/// An execution context a job can run in.
///
/// The first two fields are read by the assembly switch at fixed offsets
/// and must stay exactly where they are; the struct is `#[repr(C)]` and the
/// offsets are asserted below.
///
/// A fiber is claimed by at most one worker at a time (the `active` flag),
/// runs on that worker until its job completes, and stays attached to the
/// same worker across yields.
#[repr(C)]
pub(crate) struct Fiber {
    /// Saved stack pointer while the fiber is suspended.
    pub(crate) stack_top: *mut usize,
    /// Parameter handed to the job function on entry.
    pub(crate) job_param: *mut c_void,
    /// Backing stack; `None` for worker host contexts, which save onto the
    /// thread's own stack.
    stack: Option<FiberStack>,
    /// Batch counter decremented when the job completes. Owned by the
    /// manager; never freed while the fiber is still active.
    counter: Option<Arc<Counter>>,
    /// Set by `fiber_exit`, read by the dispatching worker after the switch
    /// back. Same thread both sides, no synchronization needed.
    pub(crate) completed: bool,
    /// Ownership claim; see [`try_claim`](Self::try_claim).
    active: AtomicU32,
}

const _: () = {
    assert!(mem::offset_of!(Fiber, stack_top) == 0);
    assert!(mem::offset_of!(Fiber, job_param) == 8);
};

impl Fiber {
    /// A pool fiber with its own stack.
    pub(crate) fn with_stack() -> Self {
        Self {
            stack_top: ptr::null_mut(),
            job_param: ptr::null_mut(),
            stack: Some(FiberStack::new()),
            counter: None,
            completed: false,
            active: AtomicU32::new(0),
        }
    }

    /// A worker's host context. Saves registers onto the worker thread's
    /// own stack, so it needs no allocation.
    pub(crate) fn host() -> Self {
        Self {
            stack_top: ptr::null_mut(),
            job_param: ptr::null_mut(),
            stack: None,
            counter: None,
            completed: false,
            active: AtomicU32::new(0),
        }
    }

    /// Try to claim this fiber for the calling worker.
    ///
    /// The acquire/release pairing with [`release`](Self::release) makes
    /// the previous job's stack writes visible to the next claimant.
    pub(crate) fn try_claim(&self) -> bool {
        self.active
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Return this fiber to the idle pool.
    pub(crate) fn release(&self) {
        self.active.store(0, Ordering::Release);
    }

    /// Arrange the fiber's stack so the next switch onto it enters the
    /// job's function, and record the job's parameter and counter.
    ///
    /// # Safety
    ///
    /// The caller must hold the claim on `fiber`, and `host` must outlive
    /// any execution of the fiber.
    pub(crate) unsafe fn setup(fiber: *mut Fiber, host: *mut Fiber, job: QueuedJob) {
        let top = (*fiber)
            .stack
            .as_ref()
            .expect("host contexts cannot run jobs")
            .top();

        (*fiber).stack_top = switch::prepare_stack(top, fiber, host, job.func, job.param);
        (*fiber).job_param = job.param;
        (*fiber).completed = false;
        (*fiber).counter = Some(job.counter);
    }
}

/// Final stop of every job: decrement the batch counter, mark the fiber
/// complete and hand control back to the worker's dispatch loop.
///
/// Reached through the platform exit trampoline when the job function
/// returns; never returns itself.
pub(crate) extern "C" fn fiber_exit(host: *mut Fiber, fiber: *mut Fiber) -> ! {
    unsafe {
        if let Some(counter) = (*fiber).counter.take() {
            counter.decrement();
        }
        (*fiber).completed = true;
        switch::asm_switch(host, fiber, 0);
    }

    // The switch away from a completed fiber must never come back.
    std::process::abort();
}
