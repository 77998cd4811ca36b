use crate::Value;
use thiserror::Error;

/// Contract violations. These are returned synchronously and never turn
/// into a rejection, since there may be no promise yet to reject.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Promise constructor cannot be invoked without a new target")]
    NotConstructed,
    #[error("Promise executor is not a function")]
    ExecutorNotCallable,
    #[error("then receiver must be a promise")]
    NotAPromise,
    #[error("capability executor was invoked more than once")]
    CapabilityExecutorReinvoked,
    #[error("constructor did not supply callable resolve and reject functions")]
    CapabilityNotCallable,
    /// A constructor's own resolve or reject function raised.
    #[error("resolving function raised {0:?}")]
    ResolvingFunctionRaised(Value),
}

/// Rejection reasons created by the engine itself, carried by
/// [`Value::Error`](crate::Value::Error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("promise cannot resolve to itself")]
    SelfResolution,
    #[error("resolving functions have already been captured")]
    ExecutorReinvoked,
    #[error("value is not a function")]
    NotCallable,
}
