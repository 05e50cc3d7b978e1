//! # Owned scenario resources.
//!
//! Anything a cycle allocates (plan handles, collaborator sessions, buffers)
//! is attached to its scenario as a [`ScenarioResource`] and released during
//! cleanup. Release is best-effort by contract: a failing release is
//! reported on the event bus and never blocks the remaining resources.
//!
//! [`ResourceFn`] wraps a release closure, producing a resource without a
//! dedicated type. The closure runs **at most once**; releasing an already
//! released handle is a no-op.

use thiserror::Error;

/// Failure while releasing one resource.
///
/// Carried in events only; release failures are swallowed by design of the
/// cleanup path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ReleaseError(pub String);

impl ReleaseError {
    /// Convenience constructor.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An owned handle a scenario must release during cleanup.
///
/// Implementations must tolerate repeated calls (idempotent release).
pub trait ScenarioResource: Send {
    /// Releases the underlying handle.
    fn release(&mut self) -> Result<(), ReleaseError>;
}

/// Closure-backed resource.
///
/// Wraps `FnOnce() -> Result<(), ReleaseError>`; the closure is consumed on
/// the first release, later calls succeed trivially.
pub struct ResourceFn<F> {
    f: Option<F>,
}

impl<F> ResourceFn<F>
where
    F: FnOnce() -> Result<(), ReleaseError> + Send + 'static,
{
    /// Creates a new closure-backed resource.
    pub fn new(f: F) -> Self {
        Self { f: Some(f) }
    }

    /// Creates the resource and returns it boxed, ready for
    /// [`ScenarioManager::add_resource`](crate::scenario::ScenarioManager::add_resource).
    pub fn boxed(f: F) -> Box<dyn ScenarioResource> {
        Box::new(Self::new(f))
    }
}

impl<F> ScenarioResource for ResourceFn<F>
where
    F: FnOnce() -> Result<(), ReleaseError> + Send + 'static,
{
    fn release(&mut self) -> Result<(), ReleaseError> {
        match self.f.take() {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}
