//! Exponential reconnect backoff.

use std::time::Duration;

/// Doubling delay between reconnect attempts, capped at a maximum.
///
/// ```text
/// 250ms → 500ms → 1s → 2s → 4s → 5s → 5s → ...
/// ```
///
/// Call [`Backoff::reset`] after a successful connection so the next outage
/// starts from the initial delay again.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Returns the delay to wait now and advances to the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .map_or(self.max, |next| next.min(self.max));
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_until_capped() {
        // Arrange
        let mut backoff = Backoff::new(Duration::from_millis(250), Duration::from_secs(5));

        // Act
        let delays: Vec<u128> = (0..8).map(|_| backoff.next_delay().as_millis()).collect();

        // Assert
        assert_eq!(delays, vec![250, 500, 1000, 2000, 4000, 5000, 5000, 5000]);
    }

    #[test]
    fn test_reset_restarts_from_initial_delay() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1));
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_initial_above_max_is_clamped() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_huge_max_does_not_overflow() {
        let mut backoff = Backoff::new(Duration::from_secs(u64::MAX / 2 + 1), Duration::MAX);
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), Duration::MAX);
    }
}
