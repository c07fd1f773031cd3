//! Virtual-time environment.
//!
//! Time only moves when a test calls [`SimEnv::advance`] (or awaits
//! [`Environment::sleep`], which advances instead of waiting). Clones share
//! one clock.

use std::{
    ops::{Add, Sub},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use murmur_core::Environment;

/// Default wall clock origin: 2024-01-01T00:00:00Z.
pub const DEFAULT_EPOCH_MS: u64 = 1_704_067_200_000;

/// Instant on the virtual clock, measured from simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time since simulation start.
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(rhs))
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Deterministic environment with a manually advanced clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    /// Nanoseconds since simulation start
    elapsed_ns: Arc<AtomicU64>,
    epoch_ms: u64,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Clock at zero, wall clock at [`DEFAULT_EPOCH_MS`].
    pub fn new() -> Self {
        Self::with_epoch_ms(DEFAULT_EPOCH_MS)
    }

    /// Clock at zero, wall clock starting at `epoch_ms`.
    pub fn with_epoch_ms(epoch_ms: u64) -> Self {
        Self { elapsed_ns: Arc::new(AtomicU64::new(0)), epoch_ms }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_ns.fetch_add(ns, Ordering::SeqCst);
    }

    /// Time since simulation start.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::SeqCst))
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.elapsed())
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn wall_clock_ms(&self) -> u64 {
        let elapsed_ms = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.epoch_ms.saturating_add(elapsed_ms)
    }
}
