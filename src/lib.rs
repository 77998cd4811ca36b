//! A deferred value: a promise that settles once and reports its outcome to
//! continuations registered with `then`.
//!
//! Nothing here runs on its own. Continuations are handed to the
//! [`Scheduler`] of the promise's [`Host`] as jobs, and only run when the host
//! drains its queue.
//!
//! # Examples
//!
//! ```
//! use promise_out::{Host, JobQueue, Promise, Record, Value};
//! let queue = JobQueue::new();
//! let host = Host::new(queue.clone());
//!
//! let thenable = Record::thenable(|args| args[0].call(&[42.into()]));
//! let promise = Promise::resolved(&host, thenable.into());
//! queue.run_until_idle();
//! assert_eq!(promise.result(), Some(Value::from(42)));
//! ```
mod capability;
mod error;
mod host;
mod promise;
mod reaction;
mod resolve;
mod settled;
mod value;

pub use capability::{
    new_capability, reject_with, resolve_with, same_constructor, Capability, ConstructorRef,
    PromiseConstructor, StandardConstructor,
};
pub use error::{Error, SettlementError};
pub use host::{
    Host, HostBuilder, IgnoreRejections, Job, JobQueue, RejectionOperation, RejectionTracker,
    Scheduler,
};
pub use promise::{then, Promise, PromiseState};
pub use resolve::SettleGuard;
pub use settled::Settled;
pub use value::{Function, Record, ThenProbe, Value};
