use crate::pipeline::types::Point;
use instant::Instant;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Nearest-neighbour lookup over a fixed point set
pub trait NeighborIndex: Send + Sync {
    /// Index into the indexed set and Euclidean distance of the closest point.
    ///
    /// Returns `None` for an empty index or a non-finite query.
    fn nearest(&self, query: &Point) -> Option<(usize, f64)>;

    /// Number of indexed points
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the search strategy for logging
    fn strategy(&self) -> &str;
}

/// Checked by the ICP loop between iterations
pub trait StopCondition: Send + Sync {
    fn should_stop(&self) -> bool;
}

/// Never requests a stop
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopCondition for NeverStop {
    fn should_stop(&self) -> bool {
        false
    }
}

/// Stops once a wall-clock deadline has passed
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }
}

impl StopCondition for Deadline {
    fn should_stop(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Shared flag another thread can raise to cancel a running alignment
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl StopCondition for CancelFlag {
    fn should_stop(&self) -> bool {
        self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_deadline_stops() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.should_stop());
        assert!(!Deadline::after(Duration::from_secs(3600)).should_stop());
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.should_stop());
        handle.cancel();
        assert!(flag.should_stop());
    }
}
