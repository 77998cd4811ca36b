use crate::{host::Job, Capability, Function, Value};
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReactionKind {
    Fulfill,
    Reject,
}

/// A continuation waiting on one outcome of a promise.
#[derive(Debug)]
pub(crate) struct Reaction {
    capability: Option<Capability>,
    kind: ReactionKind,
    handler: Option<Function>,
}

impl Reaction {
    pub(crate) fn new(
        capability: Option<Capability>,
        kind: ReactionKind,
        handler: Option<Function>,
    ) -> Self {
        Self {
            capability,
            kind,
            handler,
        }
    }

    pub(crate) fn kind(&self) -> ReactionKind {
        self.kind
    }

    /// Binds the reaction to the settlement `argument`.
    pub(crate) fn into_job(self, argument: Value) -> Job {
        Box::new(move || self.run(argument))
    }

    fn run(self, argument: Value) {
        let Some(capability) = self.capability else {
            return;
        };
        let outcome = match (self.handler, self.kind) {
            (Some(handler), _) => handler.call(&[argument]),
            (None, ReactionKind::Fulfill) => Ok(argument),
            (None, ReactionKind::Reject) => Err(argument),
        };
        let settled = match outcome {
            Ok(value) => capability.resolve(value),
            Err(reason) => capability.reject(reason),
        };
        // Nothing may escape the job queue.
        if let Err(raised) = settled {
            if let Err(raised) = capability.reject(raised) {
                warn!("derived capability raised {raised:?}, dropped");
            }
        }
    }
}
