#[cfg(test)]
mod backoff_test;

use tokio::time::Duration;

/// Retransmission schedule for a single outstanding request.
///
/// The pattern is an explicit list of intervals; once the list is
/// exhausted the last interval keeps growing by `multiplier` up to
/// `max_interval`. `max_attempts` bounds the total number of sends
/// (the initial send counts as attempt zero).
#[derive(Debug, Clone, PartialEq)]
pub struct BackOffPattern {
    intervals: Vec<Duration>,
    multiplier: u32,
    max_interval: Duration,
    max_attempts: usize,
}

impl BackOffPattern {
    pub fn new(
        intervals: Vec<Duration>,
        multiplier: u32,
        max_interval: Duration,
        max_attempts: usize,
    ) -> Self {
        BackOffPattern {
            intervals,
            multiplier,
            max_interval,
            max_attempts,
        }
    }

    /// The schedule used for STUN request retransmission when the
    /// caller does not supply one: 500 ms doubling to a 8 s ceiling,
    /// seven sends in total.
    pub fn rfc_rto() -> Self {
        BackOffPattern {
            intervals: vec![Duration::from_millis(500)],
            multiplier: 2,
            max_interval: Duration::from_secs(8),
            max_attempts: 7,
        }
    }

    /// Fixed short schedule for tests.
    pub fn fixed(interval: Duration, attempts: usize) -> Self {
        BackOffPattern {
            intervals: vec![interval],
            multiplier: 1,
            max_interval: interval,
            max_attempts: attempts,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Returns the wait before retransmission number `attempt`
    /// (1-based), or None once the attempt budget is spent.
    pub fn next_interval(&self, attempt: usize) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        if attempt <= self.intervals.len() {
            return Some(self.intervals[attempt - 1]);
        }

        let mut interval = *self.intervals.last()?;
        for _ in self.intervals.len()..attempt {
            interval = interval.saturating_mul(self.multiplier);
            if interval >= self.max_interval {
                return Some(self.max_interval);
            }
        }
        Some(interval)
    }

    /// Total time a request can stay outstanding before it times out.
    pub fn total_timeout(&self) -> Duration {
        let mut total = Duration::from_secs(0);
        for attempt in 1..self.max_attempts {
            if let Some(interval) = self.next_interval(attempt) {
                total += interval;
            }
        }
        // one final interval waiting for the last response
        total + self.next_interval(self.max_attempts - 1).unwrap_or(self.max_interval)
    }
}

impl Default for BackOffPattern {
    fn default() -> Self {
        Self::rfc_rto()
    }
}
