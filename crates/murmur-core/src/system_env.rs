//! Production environment backed by the system clock.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::env::Environment;

/// Production environment using `std::time::Instant` and tokio sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn wall_clock_ms(&self) -> u64 {
        // A clock set before 1970 reports the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_is_after_2020() {
        assert!(SystemEnv::new().wall_clock_ms() > 1_577_836_800_000);
    }

    #[tokio::test]
    async fn system_env_sleep_works() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(20)).await;
        let elapsed = env.now() - start;

        assert!(elapsed >= Duration::from_millis(20), "Sleep should wait at least 20ms");
    }
}
