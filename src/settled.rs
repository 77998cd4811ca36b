//! Awaiting a promise from Rust `async` code.
//!
//! The host still has to drain its job queue; the future only observes the
//! settlement once the reaction job it registered has run.
use crate::{Function, Promise, Value};
use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
};

/// Resolves to `Ok(value)` on fulfillment and `Err(reason)` on rejection.
/// Clones observe the same promise.
///
/// # Examples
///
/// ```
/// use promise_out::{Host, JobQueue, Promise, Value};
/// use futures::executor::block_on;
/// let queue = JobQueue::new();
/// let host = Host::new(queue.clone());
/// let settled = Promise::rejected(&host, "💥".into()).settled();
/// queue.run_until_idle();
/// assert_eq!(block_on(settled), Err(Value::from("💥")));
/// ```
#[derive(Clone)]
pub struct Settled {
    inner: Rc<RefCell<Inner>>,
}

struct Inner {
    value: Option<Result<Value, Value>>,
    // Every consumer that polled while pending must be woken, not just the
    // last one.
    waker: Vec<Waker>,
}

impl Promise {
    /// Attaches a reaction that records the outcome. Marks the promise as
    /// handled.
    pub fn settled(&self) -> Settled {
        let inner = Rc::new(RefCell::new(Inner {
            value: None,
            waker: vec![],
        }));
        let on_fulfilled = {
            let inner = inner.clone();
            Function::unary(move |value| {
                complete(&inner, Ok(value));
                Ok(Value::Undefined)
            })
        };
        let on_rejected = {
            let inner = inner.clone();
            Function::unary(move |reason| {
                complete(&inner, Err(reason));
                Ok(Value::Undefined)
            })
        };
        self.then(on_fulfilled.into(), on_rejected.into());
        Settled { inner }
    }
}

fn complete(inner: &RefCell<Inner>, outcome: Result<Value, Value>) {
    let wakers = {
        let mut inner = inner.borrow_mut();
        inner.value = Some(outcome);
        std::mem::take(&mut inner.waker)
    };
    for waker in wakers {
        waker.wake()
    }
}

impl Future for Settled {
    type Output = Result<Value, Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.borrow_mut();
        match inner.value {
            Some(ref value) => Poll::Ready(value.clone()),
            None => {
                inner.waker.push(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
