//! Deterministic simulation harness for Murmur client testing.
//!
//! Virtual-time implementation of the Environment trait, a scriptable auth
//! provider, and a driver that plays the transport and the backend so whole
//! connection lifecycles run in a test without sockets or sleeps.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the client
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fake_auth;
pub mod invariants;
pub mod sim_driver;
pub mod sim_env;

pub use fake_auth::FakeAuth;
pub use invariants::{
    AttemptWithinCap, ClientSnapshot, Invariant, InvariantRegistry, InvariantResult,
    MessageIdsUnique, RouterBoundToActiveSession, TypingExcludesSelf, TypingUniqueUsers,
    Violation,
};
pub use sim_driver::SimDriver;
pub use sim_env::{SimEnv, SimInstant};
