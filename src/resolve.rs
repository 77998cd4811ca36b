//! Resolving functions and the resolution procedure.
//!
//! A promise is settled only through a pair of resolving functions. The pair
//! shares one [`SettleGuard`], so whichever of the two runs first wins and
//! every later call of either is ignored. Resolving with an object that has a
//! callable `then` does not recurse: adoption is deferred to a job that hands
//! a fresh pair to the thenable.
use crate::{host::Job, Function, Promise, SettlementError, ThenProbe, Value};
use log::trace;
use std::{cell::Cell, rc::Rc};

/// A one-shot flag.
#[derive(Debug, Default)]
pub struct SettleGuard(Cell<bool>);

impl SettleGuard {
    /// Returns `true` exactly once, for the first caller.
    pub fn claim(&self) -> bool {
        !self.0.replace(true)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvingFunctions {
    pub(crate) resolve: Function,
    pub(crate) reject: Function,
}

impl ResolvingFunctions {
    pub(crate) fn new(promise: &Promise) -> Self {
        let guard = Rc::new(SettleGuard::default());
        let resolve = {
            let promise = promise.clone();
            let guard = guard.clone();
            Function::unary(move |resolution| {
                if guard.claim() {
                    resolve_promise(&promise, resolution);
                }
                Ok(Value::Undefined)
            })
        };
        let reject = {
            let promise = promise.clone();
            Function::unary(move |reason| {
                if guard.claim() {
                    promise.reject(reason);
                }
                Ok(Value::Undefined)
            })
        };
        Self { resolve, reject }
    }

    /// The pair as arguments for an executor or a `then` call.
    pub(crate) fn arguments(&self) -> [Value; 2] {
        [self.resolve.clone().into(), self.reject.clone().into()]
    }

    // The functions built in `new` never raise.
    pub(crate) fn resolve(&self, value: Value) {
        let _ = self.resolve.call(&[value]);
    }

    pub(crate) fn reject(&self, reason: Value) {
        let _ = self.reject.call(&[reason]);
    }
}

fn resolve_promise(promise: &Promise, resolution: Value) {
    if let Value::Promise(target) = &resolution {
        if target.ptr_eq(promise) {
            promise.reject(SettlementError::SelfResolution.into());
            return;
        }
    }
    if !resolution.is_object() {
        promise.fulfill(resolution);
        return;
    }
    match resolution.probe_then() {
        ThenProbe::Failed(raised) => promise.reject(raised),
        ThenProbe::Absent => promise.fulfill(resolution),
        ThenProbe::Callable(then) => {
            trace!("{promise:?} adopting {resolution:?}");
            promise.host().enqueue(thenable_job(promise.clone(), then));
        }
    }
}

fn thenable_job(promise: Promise, then: Function) -> Job {
    Box::new(move || {
        let functions = ResolvingFunctions::new(&promise);
        if let Err(raised) = then.call(&functions.arguments()) {
            functions.reject(raised);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Host, JobQueue, PromiseState, Record};

    fn pending() -> (JobQueue, Promise, ResolvingFunctions) {
        let queue = JobQueue::new();
        let (promise, functions) = Promise::pending(&Host::new(queue.clone()));
        (queue, promise, functions)
    }

    #[test]
    fn guard_claims_once() {
        let guard = SettleGuard::default();
        assert!(guard.claim());
        assert!(!guard.claim());
        assert!(!guard.claim());
    }

    #[test]
    fn first_of_either_function_wins() {
        let (_queue, promise, functions) = pending();
        functions.reject("first".into());
        functions.resolve(2.into());
        functions.reject("again".into());
        assert_eq!(promise.state(), PromiseState::Rejected);
        assert_eq!(promise.result(), Some("first".into()));
    }

    #[test]
    fn self_resolution_rejects() {
        let (_queue, promise, functions) = pending();
        functions.resolve(promise.clone().into());
        assert_eq!(promise.state(), PromiseState::Rejected);
        let reason = promise.result().unwrap();
        assert_eq!(reason.as_error(), Some(&SettlementError::SelfResolution));
    }

    #[test]
    fn primitive_fulfills_without_a_job() {
        let (queue, promise, functions) = pending();
        functions.resolve("plain".into());
        assert!(queue.is_empty());
        assert_eq!(promise.result(), Some("plain".into()));
    }

    #[test]
    fn object_without_then_fulfills_with_itself() {
        let (queue, promise, functions) = pending();
        let record = Record::new().with("then", 5);
        functions.resolve(record.clone().into());
        assert!(queue.is_empty());
        assert_eq!(promise.result(), Some(record.into()));
    }

    #[test]
    fn failing_probe_rejects() {
        let (_queue, promise, functions) = pending();
        let record = Record::new().with_accessor("then", Function::new(|_| Err("getter".into())));
        functions.resolve(record.into());
        assert_eq!(promise.state(), PromiseState::Rejected);
        assert_eq!(promise.result(), Some("getter".into()));
    }

    #[test]
    fn thenable_is_adopted_one_job_later() {
        let (queue, promise, functions) = pending();
        let thenable = Record::thenable(|args| args[0].call(&[42.into()]));
        functions.resolve(thenable.into());
        assert_eq!(promise.state(), PromiseState::Pending);
        assert_eq!(queue.len(), 1);
        assert!(queue.run_next());
        assert_eq!(promise.result(), Some(42.into()));
    }

    #[test]
    fn thenable_calling_both_functions_settles_once() {
        let (queue, promise, functions) = pending();
        let thenable = Record::thenable(|args| {
            args[0].call(&[1.into()])?;
            args[1].call(&["late".into()])?;
            args[0].call(&[2.into()])
        });
        functions.resolve(thenable.into());
        queue.run_until_idle();
        assert_eq!(promise.state(), PromiseState::Fulfilled);
        assert_eq!(promise.result(), Some(1.into()));
    }

    #[test]
    fn thenable_raising_after_resolving_is_ignored() {
        let (queue, promise, functions) = pending();
        let thenable = Record::thenable(|args| {
            args[0].call(&["kept".into()])?;
            Err("ignored".into())
        });
        functions.resolve(thenable.into());
        queue.run_until_idle();
        assert_eq!(promise.result(), Some("kept".into()));
    }

    #[test]
    fn thenable_raising_rejects() {
        let (queue, promise, functions) = pending();
        functions.resolve(Record::thenable(|_| Err("thrown".into())).into());
        queue.run_until_idle();
        assert_eq!(promise.state(), PromiseState::Rejected);
        assert_eq!(promise.result(), Some("thrown".into()));
    }
}
