//! Per-type rate limiting for high-frequency events.

use crate::core::scheduler::duration_ms;
use crate::event::BehaviorEventType;
use std::collections::HashMap;
use std::time::Duration;

/// Accepts at most one event per type within each window.
///
/// Rejected events are dropped by the caller, never delayed.
#[derive(Debug)]
pub struct Throttle {
    window_ms: i64,
    last_accepted: HashMap<BehaviorEventType, i64>,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: duration_ms(window),
            last_accepted: HashMap::new(),
        }
    }

    /// Check whether an event of `event_type` at `now_ms` is accepted, and
    /// if so start a new window for that type.
    pub fn try_accept(&mut self, event_type: BehaviorEventType, now_ms: i64) -> bool {
        if self.window_ms <= 0 {
            return true;
        }

        let accepted = match self.last_accepted.get(&event_type) {
            // A clock that moved backwards restarts the window.
            Some(&last) => now_ms < last || now_ms.saturating_sub(last) >= self.window_ms,
            None => true,
        };
        if accepted {
            self.last_accepted.insert(event_type, now_ms);
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_per_window() {
        let mut throttle = Throttle::new(Duration::from_millis(100));
        assert!(throttle.try_accept(BehaviorEventType::MouseMove, 1_000));
        assert!(!throttle.try_accept(BehaviorEventType::MouseMove, 1_050));
        assert!(!throttle.try_accept(BehaviorEventType::MouseMove, 1_099));
        assert!(throttle.try_accept(BehaviorEventType::MouseMove, 1_100));
        assert!(!throttle.try_accept(BehaviorEventType::MouseMove, 1_150));
    }

    #[test]
    fn test_types_are_independent() {
        let mut throttle = Throttle::new(Duration::from_millis(100));
        assert!(throttle.try_accept(BehaviorEventType::MouseMove, 0));
        assert!(throttle.try_accept(BehaviorEventType::Scroll, 10));
        assert!(!throttle.try_accept(BehaviorEventType::Scroll, 20));
    }

    #[test]
    fn test_zero_window_accepts_all() {
        let mut throttle = Throttle::new(Duration::ZERO);
        for _ in 0..5 {
            assert!(throttle.try_accept(BehaviorEventType::MouseMove, 0));
        }
    }

    #[test]
    fn test_clock_going_backwards() {
        let mut throttle = Throttle::new(Duration::from_millis(100));
        assert!(throttle.try_accept(BehaviorEventType::MouseMove, 5_000));
        assert!(throttle.try_accept(BehaviorEventType::MouseMove, 1_000));
    }

    #[test]
    fn test_huge_window_saturates() {
        let mut throttle = Throttle::new(Duration::MAX);
        assert!(throttle.try_accept(BehaviorEventType::Scroll, 0));
        assert!(!throttle.try_accept(BehaviorEventType::Scroll, i64::MAX - 1));
        assert!(throttle.try_accept(BehaviorEventType::Scroll, i64::MAX));
    }
}
