//! # Amaranth Jobs
//!
//! Fiber-based cooperative job system for the Amaranth renderer.
//!
//! Jobs run on a fixed pool of pre-allocated fibers multiplexed across
//! kernel worker threads. A fiber is a user-space execution context with
//! its own stack; switching fibers swaps the stack pointer and the
//! platform's callee-saved registers, nothing else. A job may suspend
//! itself with [`yield_now`]; a yielded fiber stays attached to its worker
//! and resumes on that worker's next dispatch round. There is no
//! preemption — the only suspension points are `yield_now` and job return.
//!
//! Completion is tracked with counters: [`JobManager::run_jobs`] returns a
//! counter initialized to the batch size, and
//! [`JobManager::wait_for_counter_and_free`] blocks until the batch is
//! done.
//!
//! # Example
//!
//! ```
//! use amaranth_jobs::{Job, JobManager};
//! use std::ffi::c_void;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! extern "C" fn work(param: *mut c_void) {
//!     let hits = unsafe { &*(param as *const AtomicU32) };
//!     hits.fetch_add(1, Ordering::Relaxed);
//! }
//!
//! let mut manager = JobManager::new(2);
//! let hits = AtomicU32::new(0);
//! let jobs = [Job::new(work, &hits as *const _ as *mut c_void); 8];
//! let counter = unsafe { manager.run_jobs(&jobs) };
//! manager.wait_for_counter_and_free(&counter, 0);
//! assert_eq!(hits.load(Ordering::Relaxed), 8);
//! ```

mod counter;
mod fiber;
mod manager;
mod switch;
mod worker;

pub use counter::Counter;
pub use fiber::FIBER_STACK_SIZE;
pub use manager::{Job, JobFn, JobManager};
pub use worker::yield_now;

/// Number of pre-allocated fibers shared by all workers of a manager.
pub const FIBER_POOL_SIZE: usize = 12;

/// Upper bound on worker threads per manager.
pub const MAX_WORKER_THREAD_COUNT: usize = 16;
