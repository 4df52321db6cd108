//! Worker threads and the fiber dispatch loop.

use std::cell::Cell;
use std::collections::VecDeque;
use std::ptr::{self, addr_of_mut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::fiber::Fiber;
use crate::manager::QueuedJob;
use crate::switch;
use crate::FIBER_POOL_SIZE;

/// How long a worker sleeps when the job queue is empty.
const IDLE_SLEEP: Duration = Duration::from_micros(100);

/// State shared between the manager and its worker threads.
pub(crate) struct JobSystemShared {
    fibers: Vec<FiberCell>,
    pub(crate) queue: Mutex<VecDeque<QueuedJob>>,
    pub(crate) stop: AtomicBool,
}

impl JobSystemShared {
    pub(crate) fn new() -> Self {
        Self {
            fibers: (0..FIBER_POOL_SIZE)
                .map(|_| FiberCell::new(Fiber::with_stack()))
                .collect(),
            queue: Mutex::new(VecDeque::new()),
            stop: AtomicBool::new(false),
        }
    }

    /// Claim the first idle fiber in the pool, if any.
    fn claim_idle_fiber(&self) -> Option<*mut Fiber> {
        self.fibers.iter().find_map(FiberCell::try_claim)
    }
}

/// A fiber pool slot.
///
/// Handing out raw fiber pointers is sound because of the claim discipline:
/// the atomic `active` flag on the fiber guarantees at most one worker owns
/// a fiber at a time, and only the owner touches its non-atomic fields.
struct FiberCell(std::cell::UnsafeCell<Fiber>);

unsafe impl Send for FiberCell {}
unsafe impl Sync for FiberCell {}

impl FiberCell {
    fn new(fiber: Fiber) -> Self {
        Self(std::cell::UnsafeCell::new(fiber))
    }

    fn try_claim(&self) -> Option<*mut Fiber> {
        let fiber = self.0.get();
        unsafe { (*fiber).try_claim() }.then_some(fiber)
    }
}

/// Per-thread worker state: the host context the dispatch loop runs in and
/// the fiber currently resident on this worker.
pub(crate) struct WorkerThread {
    host: Fiber,
    /// Non-null exactly while a fiber is resident here. A yielded fiber
    /// stays resident and resumes on this worker's next dispatch round.
    current: *mut Fiber,
    shared: Arc<JobSystemShared>,
}

thread_local! {
    /// Installed for the lifetime of the worker loop so [`yield_now`] can
    /// find its way back to the dispatch loop.
    static ACTIVE_WORKER: Cell<*mut WorkerThread> = const { Cell::new(ptr::null_mut()) };
}

/// Body of every worker thread.
pub(crate) fn worker_main(shared: Arc<JobSystemShared>) {
    let worker = Box::into_raw(Box::new(WorkerThread {
        host: Fiber::host(),
        current: ptr::null_mut(),
        shared,
    }));
    ACTIVE_WORKER.with(|slot| slot.set(worker));

    unsafe {
        while !(&(*worker).shared).stop.load(Ordering::Acquire) {
            dispatch(worker);
        }
        ACTIVE_WORKER.with(|slot| slot.set(ptr::null_mut()));
        drop(Box::from_raw(worker));
    }
}

/// One dispatch round.
///
/// Without a resident fiber: pop the longest-waiting job, claim an idle
/// fiber for it and set its stack up. With one (fresh or previously
/// yielded): switch to it. Once control comes back, a completed fiber is
/// returned to the pool; a yielded one stays resident.
unsafe fn dispatch(worker: *mut WorkerThread) {
    if (*worker).current.is_null() {
        let job = {
            let mut queue = (&(*worker).shared).queue.lock();
            match queue.pop_front() {
                Some(job) => job,
                None => {
                    drop(queue);
                    // No work: relax this CPU before polling again.
                    thread::sleep(IDLE_SLEEP);
                    return;
                }
            }
        };

        let Some(fiber) = (*worker).shared.claim_idle_fiber() else {
            // Every fiber is busy. Put the job back where it came from so
            // the next dispatch round retries it in order.
            log::trace!("fiber pool exhausted, requeueing job");
            (&(*worker).shared).queue.lock().push_front(job);
            return;
        };

        Fiber::setup(fiber, addr_of_mut!((*worker).host), job);
        (*worker).current = fiber;
    }

    // Run the resident fiber until it completes or yields.
    switch::asm_switch((*worker).current, addr_of_mut!((*worker).host), 0);

    if (*(*worker).current).completed {
        (*(*worker).current).release();
        (*worker).current = ptr::null_mut();
    }
}

/// Yield the running job back to its worker's dispatch loop.
///
/// The fiber stays attached to its worker and resumes there — jobs never
/// migrate between workers. Yielding is the only suspension point besides
/// returning from the job function.
///
/// # Panics
///
/// Panics when called from a thread that is not a job-system worker.
pub fn yield_now() {
    let worker = ACTIVE_WORKER.with(Cell::get);
    assert!(
        !worker.is_null(),
        "yield_now called from a non-worker thread"
    );

    unsafe {
        let current = (*worker).current;
        debug_assert!(!current.is_null(), "worker has no resident fiber");
        switch::asm_switch(addr_of_mut!((*worker).host), current, 0);
    }
}
