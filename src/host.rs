//! The environment a promise lives in: the job queue it advances through and
//! the hook it reports unhandled rejections to. Nothing here is global; every
//! promise records the [`Host`] it was created in.
use crate::{capability::StandardConstructor, ConstructorRef, Promise};
use log::debug;
use std::{cell::RefCell, collections::VecDeque, fmt, rc::Rc};

/// A deferred unit of work.
pub type Job = Box<dyn FnOnce()>;

/// Accepts jobs and runs them later, in submission order.
pub trait Scheduler {
    fn enqueue(&self, job: Job);
}

impl<F> Scheduler for F
where
    F: Fn(Job),
{
    fn enqueue(&self, job: Job) {
        self(job)
    }
}

/// A FIFO microtask queue. Clones share the same queue.
///
/// # Examples
///
/// ```
/// use promise_out::{Host, JobQueue, Promise, Value};
/// let queue = JobQueue::new();
/// let host = Host::new(queue.clone());
/// let promise = Promise::resolved(&host, 1.into());
/// let doubled = promise.then_with(|v| Ok((v.as_number().unwrap_or(0.0) * 2.0).into()));
/// queue.run_until_idle();
/// assert_eq!(doubled.result(), Some(Value::from(2)));
/// ```
#[derive(Clone, Default)]
pub struct JobQueue {
    jobs: Rc<RefCell<VecDeque<Job>>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.borrow().is_empty()
    }

    /// Runs the oldest job. Returns `false` if there was nothing to run.
    pub fn run_next(&self) -> bool {
        // The borrow ends before the job runs, so jobs may enqueue more jobs.
        let job = self.jobs.borrow_mut().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs jobs until the queue is empty, including jobs enqueued along the
    /// way. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for JobQueue {
    fn enqueue(&self, job: Job) {
        self.jobs.borrow_mut().push_back(job);
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue").field("len", &self.len()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionOperation {
    /// A promise was rejected while nothing was attached to it.
    Reject,
    /// A reaction was attached to a promise that had been reported.
    Handle,
}

/// Host hook for unhandled-rejection bookkeeping.
pub trait RejectionTracker {
    fn on_rejection_event(&self, promise: &Promise, operation: RejectionOperation);
}

/// The default tracker. Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreRejections;

impl RejectionTracker for IgnoreRejections {
    fn on_rejection_event(&self, _promise: &Promise, _operation: RejectionOperation) {}
}

struct Inner {
    scheduler: Rc<dyn Scheduler>,
    tracker: Rc<dyn RejectionTracker>,
    constructor: ConstructorRef,
}

/// A handle on the scheduler, the rejection tracker and the standard
/// promise constructor. Cheap to clone.
#[derive(Clone)]
pub struct Host {
    inner: Rc<Inner>,
}

impl Host {
    /// A host with the default rejection tracker.
    pub fn new(scheduler: impl Scheduler + 'static) -> Self {
        Self::builder(scheduler).build()
    }

    pub fn builder(scheduler: impl Scheduler + 'static) -> HostBuilder {
        HostBuilder {
            scheduler: Rc::new(scheduler),
            tracker: Rc::new(IgnoreRejections),
        }
    }

    pub(crate) fn enqueue(&self, job: Job) {
        self.inner.scheduler.enqueue(job);
    }

    pub(crate) fn track_rejection(&self, promise: &Promise, operation: RejectionOperation) {
        debug!("rejection event {operation:?} for {promise:?}");
        self.inner.tracker.on_rejection_event(promise, operation);
    }

    /// The constructor `Promise::new` and `then` build promises with.
    pub fn promise_constructor(&self) -> &ConstructorRef {
        &self.inner.constructor
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Host({:p})", Rc::as_ptr(&self.inner))
    }
}

pub struct HostBuilder {
    scheduler: Rc<dyn Scheduler>,
    tracker: Rc<dyn RejectionTracker>,
}

impl HostBuilder {
    pub fn rejection_tracker(mut self, tracker: impl RejectionTracker + 'static) -> Self {
        self.tracker = Rc::new(tracker);
        self
    }

    pub fn build(self) -> Host {
        Host {
            inner: Rc::new(Inner {
                scheduler: self.scheduler,
                tracker: self.tracker,
                constructor: Rc::new(StandardConstructor),
            }),
        }
    }
}
