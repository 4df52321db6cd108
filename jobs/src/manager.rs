//! The job manager: fiber pool, worker threads, queue and counters.

use std::ffi::c_void;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::counter::Counter;
use crate::worker::{worker_main, JobSystemShared};
use crate::MAX_WORKER_THREAD_COUNT;

/// Signature of a job entry point.
pub type JobFn = extern "C" fn(*mut c_void);

/// A unit of work: an entry point and an opaque parameter for it.
#[derive(Clone, Copy)]
pub struct Job {
    pub func: JobFn,
    pub param: *mut c_void,
}

impl Job {
    pub fn new(func: JobFn, param: *mut c_void) -> Self {
        Self { func, param }
    }
}

/// A queued job, tagged with the counter of the batch it belongs to.
pub(crate) struct QueuedJob {
    pub(crate) func: JobFn,
    pub(crate) param: *mut c_void,
    pub(crate) counter: Arc<Counter>,
}

// The raw parameter crosses to a worker thread; `run_jobs`'s contract makes
// the caller responsible for it being valid there.
unsafe impl Send for QueuedJob {}

/// Owns the fiber pool, the worker threads, the job queue and all live
/// batch counters.
///
/// Job submission and counter waits take `&mut self`: the live-counter
/// bookkeeping relies on them never running concurrently, and the exclusive
/// borrow makes that a compile-time guarantee rather than a convention.
pub struct JobManager {
    shared: Arc<JobSystemShared>,
    workers: Vec<JoinHandle<()>>,
    counters: Vec<Arc<Counter>>,
}

impl JobManager {
    /// Allocate the fiber pool and spawn `num_threads` worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `num_threads` exceeds [`MAX_WORKER_THREAD_COUNT`].
    pub fn new(num_threads: usize) -> Self {
        assert!(
            num_threads <= MAX_WORKER_THREAD_COUNT,
            "at most {MAX_WORKER_THREAD_COUNT} worker threads are supported"
        );

        let shared = Arc::new(JobSystemShared::new());

        let workers = (0..num_threads)
            .map(|index| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("amaranth-worker-{index}"))
                    .spawn(move || worker_main(shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            shared,
            workers,
            counters: Vec::new(),
        }
    }

    /// Queue a batch of jobs.
    ///
    /// Returns the batch counter, initialized to `jobs.len()`; every
    /// completing job decrements it once. The counter stays registered with
    /// the manager until retired by
    /// [`wait_for_counter_and_free`](Self::wait_for_counter_and_free).
    ///
    /// Execution order within and across batches is not guaranteed; the
    /// only guarantee is the counter reaching its final value after all
    /// jobs ran.
    ///
    /// # Safety
    ///
    /// Every job's `param` must be valid for use from a worker thread until
    /// the batch counter reaches zero.
    pub unsafe fn run_jobs(&mut self, jobs: &[Job]) -> Arc<Counter> {
        let counter = Arc::new(Counter::new(jobs.len() as u32));
        self.counters.push(Arc::clone(&counter));

        let mut queue = self.shared.queue.lock();
        for job in jobs {
            queue.push_back(QueuedJob {
                func: job.func,
                param: job.param,
                counter: Arc::clone(&counter),
            });
        }

        counter
    }

    /// Spin until `counter` reaches `target`, then retire it from the
    /// live-counter list.
    ///
    /// Call this from the thread driving the manager, never from inside a
    /// job — a spinning job would occupy its fiber forever.
    pub fn wait_for_counter_and_free(&mut self, counter: &Arc<Counter>, target: u32) {
        while counter.value() != target {
            std::hint::spin_loop();
        }

        self.counters.retain(|live| !Arc::ptr_eq(live, counter));
    }

    /// Number of batch counters not yet retired.
    pub fn live_counter_count(&self) -> usize {
        self.counters.len()
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for JobManager {
    /// Signal every worker to stop, join them, then free the fibers and
    /// any counters that were never waited on.
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("worker thread panicked during shutdown");
            }
        }
        self.counters.clear();
    }
}
