//! # Privilege Elevation
//!
//! Job enumeration must see every job, including ones the requesting principal
//! cannot read. The host's security context is switched to the system principal
//! for the duration of the enumeration through an [`ElevatedScope`] guard,
//! which puts the previous principal back when it is dropped. Dropping also
//! happens on early returns and while unwinding from a panic.

use std::sync::{Mutex, PoisonError};
use tracing::trace;

/// Identity the host build system acts as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(String),
    System,
}

/// Host security context
pub trait SecurityContext: Send + Sync {
    /// Switch to `principal`, returning the previously active one
    fn impersonate(&self, principal: Principal) -> Principal;

    /// Reinstate a principal returned by [`SecurityContext::impersonate`]
    fn restore(&self, previous: Principal);

    /// Currently active principal
    fn current(&self) -> Principal;
}

/// Scoped system privilege
///
/// Restores the previous principal when dropped.
#[must_use = "privilege is released as soon as the scope is dropped"]
pub struct ElevatedScope<'a> {
    context: &'a dyn SecurityContext,
    previous: Option<Principal>,
}

impl<'a> ElevatedScope<'a> {
    /// Impersonate the system principal until the returned scope is dropped
    pub fn enter(context: &'a dyn SecurityContext) -> Self {
        let previous = context.impersonate(Principal::System);
        trace!(previous = ?previous, "Entered system privilege scope");
        Self {
            context,
            previous: Some(previous),
        }
    }
}

impl Drop for ElevatedScope<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            trace!(restored = ?previous, "Leaving system privilege scope");
            self.context.restore(previous);
        }
    }
}

/// Process-wide security context for a standalone deployment
#[derive(Debug)]
pub struct SharedSecurityContext {
    current: Mutex<Principal>,
}

impl SharedSecurityContext {
    /// Create a context acting as `principal`
    pub fn new(principal: Principal) -> Self {
        Self {
            current: Mutex::new(principal),
        }
    }
}

impl Default for SharedSecurityContext {
    fn default() -> Self {
        Self::new(Principal::Anonymous)
    }
}

impl SecurityContext for SharedSecurityContext {
    fn impersonate(&self, principal: Principal) -> Principal {
        // A poisoned lock still holds a valid principal
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, principal)
    }

    fn restore(&self, previous: Principal) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = previous;
    }

    fn current(&self) -> Principal {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
#[path = "security_tests.rs"]
mod tests;
