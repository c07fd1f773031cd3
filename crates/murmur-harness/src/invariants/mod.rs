//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must always hold during client execution.
//! Unlike example-based tests that check specific scenarios, invariants
//! verify behavioral properties across all possible execution paths.
//!
//! # Architecture
//!
//! The invariant system extracts observable state from a `ChatClient` into a
//! [`ClientSnapshot`], then runs registered [`Invariant`] checks against it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = ClientSnapshot::capture(&client);
//! registry.check_all(&snapshot)?;
//! ```

mod checks;
mod snapshot;

pub use checks::{
    AttemptWithinCap, MessageIdsUnique, RouterBoundToActiveSession, TypingExcludesSelf,
    TypingUniqueUsers,
};
pub use snapshot::ClientSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against client state.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a snapshot.
    fn check(&self, state: &ClientSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl std::fmt::Debug for InvariantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.invariants.iter().map(|inv| inv.name()).collect();
        f.debug_struct("InvariantRegistry").field("invariants", &names).finish()
    }
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with the standard client invariants.
    ///
    /// Includes:
    /// - [`TypingExcludesSelf`]: the current user never types remotely
    /// - [`TypingUniqueUsers`]: one typing entry per user id
    /// - [`MessageIdsUnique`]: no message id appears twice in the log
    /// - [`AttemptWithinCap`]: reconnect attempts stay within the policy
    /// - [`RouterBoundToActiveSession`]: the router listens to the live
    ///   session only
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(TypingExcludesSelf);
        registry.add(TypingUniqueUsers);
        registry.add(MessageIdsUnique);
        registry.add(AttemptWithinCap);
        registry.add(RouterBoundToActiveSession);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &ClientSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
