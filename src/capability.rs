//! Promise capabilities and constructor polymorphism.
//!
//! A [`Capability`] is a promise together with the one-shot functions that
//! settle it. Capabilities are obtained from a [`PromiseConstructor`], which
//! lets `resolve_with`/`reject_with` build promises of a caller-chosen kind.
use crate::{Error, Function, Host, Promise, SettlementError, Value};
use std::{cell::RefCell, rc::Rc};

pub type ConstructorRef = Rc<dyn PromiseConstructor>;

/// Something that can be instantiated with an executor, the way the
/// standard promise constructor is.
pub trait PromiseConstructor {
    /// Builds a new promise-like value. `new_target` is the constructor being
    /// instantiated and is what the result should record as its constructor.
    fn construct(
        &self,
        host: &Host,
        new_target: &ConstructorRef,
        executor: Value,
    ) -> Result<Value, Error>;
}

/// The constructor behind [`Promise::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConstructor;

impl PromiseConstructor for StandardConstructor {
    fn construct(
        &self,
        host: &Host,
        new_target: &ConstructorRef,
        executor: Value,
    ) -> Result<Value, Error> {
        Promise::construct(host, Some(new_target.clone()), executor).map(Value::Promise)
    }
}

pub fn same_constructor(a: &ConstructorRef, b: &ConstructorRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

#[derive(Debug, Clone)]
pub struct Capability {
    promise: Value,
    resolve: Function,
    reject: Function,
}

impl Capability {
    pub(crate) fn new(promise: Value, resolve: Function, reject: Function) -> Self {
        Self {
            promise,
            resolve,
            reject,
        }
    }

    pub fn promise(&self) -> &Value {
        &self.promise
    }

    pub fn into_promise(self) -> Value {
        self.promise
    }

    pub fn resolve(&self, value: Value) -> Result<Value, Value> {
        self.resolve.call(&[value])
    }

    pub fn reject(&self, reason: Value) -> Result<Value, Value> {
        self.reject.call(&[reason])
    }
}

#[derive(Default)]
struct Captured {
    resolve: Option<Value>,
    reject: Option<Value>,
    reinvoked: bool,
}

/// Instantiates `constructor` and captures the resolving functions it hands
/// to its executor.
pub fn new_capability(host: &Host, constructor: &ConstructorRef) -> Result<Capability, Error> {
    let captured = Rc::new(RefCell::new(Captured::default()));
    let executor = {
        let captured = captured.clone();
        Function::new(move |args| {
            let mut captured = captured.borrow_mut();
            if captured.resolve.is_some() || captured.reject.is_some() {
                captured.reinvoked = true;
                return Err(SettlementError::ExecutorReinvoked.into());
            }
            let supplied = |index: usize| {
                args.get(index)
                    .filter(|value| !matches!(value, Value::Undefined))
                    .cloned()
            };
            captured.resolve = supplied(0);
            captured.reject = supplied(1);
            Ok(Value::Undefined)
        })
    };
    let promise = constructor.construct(host, constructor, executor.into())?;
    let captured = captured.take();
    if captured.reinvoked {
        return Err(Error::CapabilityExecutorReinvoked);
    }
    match (captured.resolve, captured.reject) {
        (Some(Value::Function(resolve)), Some(Value::Function(reject))) => {
            Ok(Capability::new(promise, resolve, reject))
        }
        _ => Err(Error::CapabilityNotCallable),
    }
}

/// Returns `value` itself if it is already a promise built by `constructor`,
/// otherwise a new promise of that kind resolved with it. A raise from the
/// constructor's resolve function is returned as an error.
pub fn resolve_with(host: &Host, constructor: &ConstructorRef, value: Value) -> Result<Value, Error> {
    if let Value::Promise(promise) = &value {
        if same_constructor(promise.constructor(), constructor) {
            return Ok(value);
        }
    }
    let capability = new_capability(host, constructor)?;
    capability
        .resolve(value)
        .map_err(Error::ResolvingFunctionRaised)?;
    Ok(capability.into_promise())
}

/// A new promise of `constructor`'s kind, rejected with `reason`.
pub fn reject_with(host: &Host, constructor: &ConstructorRef, reason: Value) -> Result<Value, Error> {
    let capability = new_capability(host, constructor)?;
    capability
        .reject(reason)
        .map_err(Error::ResolvingFunctionRaised)?;
    Ok(capability.into_promise())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JobQueue, PromiseState, Record};

    /// Runs a scripted closure against the executor it is given.
    struct Scripted<F>(F);

    impl<F> PromiseConstructor for Scripted<F>
    where
        F: Fn(&Function) -> Result<(), Value>,
    {
        fn construct(
            &self,
            _host: &Host,
            _new_target: &ConstructorRef,
            executor: Value,
        ) -> Result<Value, Error> {
            let executor = executor.as_function().ok_or(Error::ExecutorNotCallable)?;
            let _ = (self.0)(executor);
            Ok(Record::new().into())
        }
    }

    fn host() -> (JobQueue, Host) {
        let queue = JobQueue::new();
        (queue.clone(), Host::new(queue))
    }

    #[test]
    fn standard_capability_settles_its_promise() {
        let (queue, host) = host();
        let capability = new_capability(&host, host.promise_constructor()).unwrap();
        capability.resolve(7.into()).unwrap();
        queue.run_until_idle();
        let promise = capability.promise().as_promise().unwrap();
        assert_eq!(promise.state(), PromiseState::Fulfilled);
        assert_eq!(promise.result(), Some(7.into()));
    }

    #[test]
    fn missing_functions_are_rejected() {
        let (_queue, host) = host();
        let constructor: ConstructorRef =
            Rc::new(Scripted(|executor: &Function| -> Result<(), Value> {
                executor.call(&[]).map(drop)
            }));
        let error = new_capability(&host, &constructor).unwrap_err();
        assert_eq!(error, Error::CapabilityNotCallable);
    }

    #[test]
    fn non_callable_functions_are_rejected() {
        let (_queue, host) = host();
        let constructor: ConstructorRef = Rc::new(Scripted(|executor: &Function| -> Result<(), Value> {
            executor.call(&[1.into(), 2.into()]).map(drop)
        }));
        let error = new_capability(&host, &constructor).unwrap_err();
        assert_eq!(error, Error::CapabilityNotCallable);
    }

    #[test]
    fn executor_may_only_run_once() {
        let (_queue, host) = host();
        let constructor: ConstructorRef = Rc::new(Scripted(|executor: &Function| -> Result<(), Value> {
            let noop: Value = Function::unary(|_| Ok(Value::Undefined)).into();
            executor.call(&[noop.clone(), noop.clone()])?;
            executor.call(&[noop.clone(), noop])?;
            Ok(())
        }));
        let error = new_capability(&host, &constructor).unwrap_err();
        assert_eq!(error, Error::CapabilityExecutorReinvoked);
    }

    #[test]
    fn resolve_with_returns_same_kind_unchanged() {
        let (_queue, host) = host();
        let promise = Promise::new(&host, |_, _| Ok(()));
        let same = resolve_with(&host, host.promise_constructor(), promise.clone().into()).unwrap();
        assert_eq!(same, Value::from(promise));
    }

    #[test]
    fn resolve_with_wraps_foreign_kind() {
        let (queue, host) = host();
        let other = Host::new(queue.clone());
        let foreign = Promise::resolved(&other, 3.into());
        let wrapped = resolve_with(&host, host.promise_constructor(), foreign.clone().into()).unwrap();
        assert_ne!(wrapped, Value::from(foreign));
        queue.run_until_idle();
        assert_eq!(wrapped.as_promise().unwrap().result(), Some(3.into()));
    }

    #[test]
    fn reject_with_always_builds_a_new_promise() {
        let (queue, host) = host();
        let rejected = reject_with(&host, host.promise_constructor(), "no".into()).unwrap();
        queue.run_until_idle();
        let promise = rejected.as_promise().unwrap();
        assert_eq!(promise.state(), PromiseState::Rejected);
        assert_eq!(promise.result(), Some("no".into()));
    }

    fn raising_constructor() -> ConstructorRef {
        Rc::new(Scripted(|executor: &Function| -> Result<(), Value> {
            let raising: Value = Function::unary(|_| Err("settle raised".into())).into();
            executor.call(&[raising.clone(), raising]).map(drop)
        }))
    }

    #[test]
    fn resolve_with_reports_a_raising_resolve() {
        let (_queue, host) = host();
        let error = resolve_with(&host, &raising_constructor(), 1.into()).unwrap_err();
        assert_eq!(error, Error::ResolvingFunctionRaised("settle raised".into()));
    }

    #[test]
    fn reject_with_reports_a_raising_reject() {
        let (_queue, host) = host();
        let error = reject_with(&host, &raising_constructor(), "no".into()).unwrap_err();
        assert_eq!(error, Error::ResolvingFunctionRaised("settle raised".into()));
    }
}
