use crate::{
    reaction::{Reaction, ReactionKind},
    resolve::ResolvingFunctions,
    Capability, ConstructorRef, Error, Function, Host, RejectionOperation, Value,
};
use log::trace;
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

/// Reactions only exist while pending, and a result only once settled.
enum State {
    Pending {
        fulfill_reactions: Vec<Reaction>,
        reject_reactions: Vec<Reaction>,
    },
    Fulfilled(Value),
    Rejected(Value),
}

struct Inner {
    host: Host,
    constructor: ConstructorRef,
    state: RefCell<State>,
    is_handled: Cell<bool>,
}

/// The eventual result of an asynchronous operation.
///
/// Clones are handles on the same promise.
///
/// # Examples
///
/// ```
/// use promise_out::{Host, JobQueue, Promise, Value};
/// let queue = JobQueue::new();
/// let host = Host::new(queue.clone());
/// let promise = Promise::new(&host, |resolve, _reject| {
///     resolve.call(&[1.into()])?;
///     Ok(())
/// });
/// let next = promise.then_with(|v| Ok((v.as_number().unwrap_or(0.0) + 1.0).into()));
/// queue.run_until_idle();
/// assert_eq!(next.result(), Some(Value::from(2)));
/// ```
#[derive(Clone)]
pub struct Promise {
    inner: Rc<Inner>,
}

impl Promise {
    /// Creates a promise and runs `setup` synchronously with its resolve and
    /// reject functions. If `setup` raises, the promise is rejected with the
    /// raised value.
    pub fn new<F>(host: &Host, setup: F) -> Promise
    where
        F: FnOnce(Function, Function) -> Result<(), Value>,
    {
        let (promise, functions) = Promise::pending_with(host, host.promise_constructor().clone());
        if let Err(raised) = setup(functions.resolve.clone(), functions.reject.clone()) {
            functions.reject(raised);
        }
        promise
    }

    /// The checked entry point used by constructors. `new_target` is the
    /// constructor being instantiated; there is none when the constructor is
    /// called as a plain function.
    pub fn construct(
        host: &Host,
        new_target: Option<ConstructorRef>,
        executor: Value,
    ) -> Result<Promise, Error> {
        let new_target = new_target.ok_or(Error::NotConstructed)?;
        let Value::Function(executor) = executor else {
            return Err(Error::ExecutorNotCallable);
        };
        let (promise, functions) = Promise::pending_with(host, new_target);
        if let Err(raised) = executor.call(&functions.arguments()) {
            functions.reject(raised);
        }
        Ok(promise)
    }

    /// `Promise.resolve`: `value` itself if it is already a promise of this
    /// host, otherwise a new promise resolved with it.
    pub fn resolved(host: &Host, value: Value) -> Promise {
        if let Value::Promise(promise) = &value {
            if crate::same_constructor(promise.constructor(), host.promise_constructor()) {
                return promise.clone();
            }
        }
        let (promise, functions) = Promise::pending(host);
        functions.resolve(value);
        promise
    }

    /// `Promise.reject`.
    pub fn rejected(host: &Host, reason: Value) -> Promise {
        let (promise, functions) = Promise::pending(host);
        functions.reject(reason);
        promise
    }

    pub(crate) fn pending(host: &Host) -> (Promise, ResolvingFunctions) {
        Promise::pending_with(host, host.promise_constructor().clone())
    }

    fn pending_with(host: &Host, constructor: ConstructorRef) -> (Promise, ResolvingFunctions) {
        let promise = Promise {
            inner: Rc::new(Inner {
                host: host.clone(),
                constructor,
                state: RefCell::new(State::Pending {
                    fulfill_reactions: Vec::new(),
                    reject_reactions: Vec::new(),
                }),
                is_handled: Cell::new(false),
            }),
        };
        let functions = ResolvingFunctions::new(&promise);
        (promise, functions)
    }

    pub fn host(&self) -> &Host {
        &self.inner.host
    }

    pub fn constructor(&self) -> &ConstructorRef {
        &self.inner.constructor
    }

    pub fn state(&self) -> PromiseState {
        match &*self.inner.state.borrow() {
            State::Pending { .. } => PromiseState::Pending,
            State::Fulfilled(_) => PromiseState::Fulfilled,
            State::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// The fulfillment value or rejection reason, once settled.
    pub fn result(&self) -> Option<Value> {
        match &*self.inner.state.borrow() {
            State::Pending { .. } => None,
            State::Fulfilled(value) | State::Rejected(value) => Some(value.clone()),
        }
    }

    pub fn is_handled(&self) -> bool {
        self.inner.is_handled.get()
    }

    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Registers handlers and returns the promise of their outcome.
    /// Non-callable handlers are treated as absent, which passes the
    /// settlement through unchanged.
    pub fn then(&self, on_fulfilled: Value, on_rejected: Value) -> Promise {
        let (derived, functions) = Promise::pending(self.host());
        let capability = Capability::new(derived.clone().into(), functions.resolve, functions.reject);
        self.perform_then(on_fulfilled, on_rejected, Some(capability));
        derived
    }

    pub fn then_with<F>(&self, on_fulfilled: F) -> Promise
    where
        F: Fn(Value) -> Result<Value, Value> + 'static,
    {
        self.then(Function::unary(on_fulfilled).into(), Value::Undefined)
    }

    pub fn catch(&self, on_rejected: Value) -> Promise {
        self.then(Value::Undefined, on_rejected)
    }

    pub fn catch_with<F>(&self, on_rejected: F) -> Promise
    where
        F: Fn(Value) -> Result<Value, Value> + 'static,
    {
        self.catch(Function::unary(on_rejected).into())
    }

    pub(crate) fn perform_then(
        &self,
        on_fulfilled: Value,
        on_rejected: Value,
        capability: Option<Capability>,
    ) {
        let fulfill_reaction = Reaction::new(
            capability.clone(),
            ReactionKind::Fulfill,
            on_fulfilled.as_function().cloned(),
        );
        let reject_reaction = Reaction::new(
            capability,
            ReactionKind::Reject,
            on_rejected.as_function().cloned(),
        );
        let settled = {
            let mut state = self.inner.state.borrow_mut();
            match &mut *state {
                State::Pending {
                    fulfill_reactions,
                    reject_reactions,
                } => {
                    fulfill_reactions.push(fulfill_reaction);
                    reject_reactions.push(reject_reaction);
                    None
                }
                State::Fulfilled(value) => Some((fulfill_reaction, value.clone())),
                State::Rejected(reason) => Some((reject_reaction, reason.clone())),
            }
        };
        if let Some((reaction, argument)) = settled {
            if reaction.kind() == ReactionKind::Reject && !self.is_handled() {
                self.host().track_rejection(self, RejectionOperation::Handle);
            }
            trace!("{self:?} scheduling {:?} reaction", reaction.kind());
            self.host().enqueue(reaction.into_job(argument));
        }
        self.inner.is_handled.set(true);
    }

    /// `then` as a callable value, bound to this promise.
    pub(crate) fn then_function(&self) -> Function {
        let promise = self.clone();
        Function::new(move |args| {
            let argument = |index: usize| args.get(index).cloned().unwrap_or_default();
            Ok(promise.then(argument(0), argument(1)).into())
        })
    }

    pub(crate) fn fulfill(&self, value: Value) {
        let Some((reactions, _)) = self.settle(State::Fulfilled(value.clone())) else {
            return;
        };
        trace!("{self:?} fulfilled with {value:?}");
        self.trigger(reactions, value);
    }

    pub(crate) fn reject(&self, reason: Value) {
        let Some((_, reactions)) = self.settle(State::Rejected(reason.clone())) else {
            return;
        };
        trace!("{self:?} rejected with {reason:?}");
        if !self.is_handled() {
            self.host().track_rejection(self, RejectionOperation::Reject);
        }
        self.trigger(reactions, reason);
    }

    /// Swaps in the terminal state, handing back the pending reactions.
    fn settle(&self, settled: State) -> Option<(Vec<Reaction>, Vec<Reaction>)> {
        let mut state = self.inner.state.borrow_mut();
        if !matches!(*state, State::Pending { .. }) {
            return None;
        }
        match std::mem::replace(&mut *state, settled) {
            State::Pending {
                fulfill_reactions,
                reject_reactions,
            } => Some((fulfill_reactions, reject_reactions)),
            State::Fulfilled(_) | State::Rejected(_) => None,
        }
    }

    fn trigger(&self, reactions: Vec<Reaction>, argument: Value) {
        for reaction in reactions {
            self.host().enqueue(reaction.into_job(argument.clone()));
        }
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Promise");
        debug.field("id", &Rc::as_ptr(&self.inner));
        match self.inner.state.try_borrow() {
            Ok(state) => match &*state {
                State::Pending { .. } => debug.field("state", &PromiseState::Pending),
                State::Fulfilled(value) => debug.field("fulfilled", value),
                State::Rejected(reason) => debug.field("rejected", reason),
            },
            Err(_) => debug.field("state", &"<borrowed>"),
        };
        debug.finish()
    }
}

/// `then` with a dynamically-typed receiver.
pub fn then(this: &Value, on_fulfilled: Value, on_rejected: Value) -> Result<Promise, Error> {
    match this {
        Value::Promise(promise) => Ok(promise.then(on_fulfilled, on_rejected)),
        _ => Err(Error::NotAPromise),
    }
}
