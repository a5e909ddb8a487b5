//! Cache clock
//!
//! Freshness is measured against this clock so tests can age entries without
//! sleeping.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Time source for cache freshness, swappable for a manual clock in tests.
///
/// Clones of a manual clock share the same instant, so a test can keep one
/// handle and advance the clock the cache reads.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Manual(Arc<Mutex<Instant>>),
}

impl Clock {
    /// A clock that follows monotonic system time
    pub fn system() -> Self {
        Self::System
    }

    /// A clock that only moves when advanced, starting now
    pub fn manual() -> Self {
        Self::Manual(Arc::new(Mutex::new(Instant::now())))
    }

    /// Current instant according to this clock
    pub fn now(&self) -> Instant {
        match self {
            Clock::System => Instant::now(),
            Clock::Manual(at) => *at.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Move a manual clock forward.
    ///
    /// Has no effect on `Clock::System`.
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(at) = self {
            *at.lock().unwrap_or_else(PoisonError::into_inner) += by;
        }
    }
}
