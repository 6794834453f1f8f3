use chrono::{DateTime, Utc};

/// Source of the current instant for expiry and key-lifetime checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use fixed::FixedClock;

#[cfg(any(test, feature = "test-helpers"))]
mod fixed {
    use std::sync::{Mutex, PoisonError};

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::Clock;

    /// Manually driven clock for tests.
    #[derive(Debug)]
    pub struct FixedClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn at_timestamp(seconds: i64) -> Self {
            let now = Utc
                .timestamp_opt(seconds, 0)
                .single()
                .unwrap_or_else(Utc::now);
            Self::new(now)
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
        }

        pub fn advance(&self, by: Duration) {
            let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
            *guard += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}
