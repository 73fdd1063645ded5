//! The deferred-task queue that reactions run on.
//!
//! Every reaction dispatch goes through this queue, even when the promise is
//! already settled at the time `then` is called: a callback is never observed
//! before the registering call returns. The queue is a plain FIFO local to
//! the current thread, which is all the single-logical-thread contract needs
//! and keeps one test's jobs out of another's.
//!
//! The crate enqueues jobs on its own; callers only have to drain the queue
//! with [`run_until_idle`] at a point where nothing is on the stack.

use std::cell::RefCell;
use std::collections::VecDeque;

use log::trace;

type Job = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Job>> = RefCell::new(VecDeque::new());
}

/// Defers `job` to run after the current synchronous execution unwinds.
pub fn enqueue(job: impl FnOnce() + 'static) {
    QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        queue.push_back(Box::new(job));
        trace!("deferred job queued ({} pending)", queue.len());
    });
}

/// Runs queued jobs in FIFO order until the queue is empty, including jobs
/// enqueued by the jobs themselves. Returns how many jobs ran.
pub fn run_until_idle() -> usize {
    let mut ran = 0;
    // The queue borrow must not be held while a job runs: jobs enqueue more
    // jobs.
    loop {
        let job = QUEUE.with(|queue| queue.borrow_mut().pop_front());
        match job {
            Some(job) => {
                job();
                ran += 1;
            }
            None => break,
        }
    }
    if ran > 0 {
        trace!("drained {ran} deferred jobs");
    }
    ran
}

/// True when no deferred jobs are waiting on this thread.
pub fn is_idle() -> bool {
    QUEUE.with(|queue| queue.borrow().is_empty())
}
