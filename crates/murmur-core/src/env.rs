//! Environment abstraction for deterministic testing.
//!
//! Decouples client logic from system time. Production uses
//! [`crate::SystemEnv`]; simulation uses a virtual clock that tests advance
//! explicitly, so typing expiry and reconnect backoff run without sleeping.

use std::{
    fmt::Debug,
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

/// Monotonic instant usable as a timer deadline.
///
/// Blanket-implemented for any type with the required arithmetic, which
/// covers `std::time::Instant` and the harness's virtual instant.
pub trait Instant:
    Copy + Ord + Send + Sync + Debug + Sub<Output = Duration> + Add<Duration, Output = Self>
{
}

impl<T> Instant for T where
    T: Copy + Ord + Send + Sync + Debug + Sub<Output = Duration> + Add<Duration, Output = T>
{
}

/// Abstract environment providing time.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - `wall_clock_ms()` is only used for message timestamps and token expiry,
///   never for timer deadlines
pub trait Environment: Clone + Send + Sync + 'static {
    /// Instant type used for deadlines.
    type Instant: Instant;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this. State machines never do.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Milliseconds since the Unix epoch.
    fn wall_clock_ms(&self) -> u64;
}
