use std::time::{Duration, Instant};

const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Repeating reconnect timer driven by the event loop's receive deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryTimer {
    interval: Duration,
    next_fire: Instant,
}

impl RetryTimer {
    pub(crate) fn start(interval: Duration) -> Self {
        Self {
            interval,
            next_fire: deadline_after(interval),
        }
    }

    pub(crate) fn rearm(&mut self) {
        self.next_fire = deadline_after(self.interval);
    }

    pub(crate) const fn deadline(&self) -> Instant {
        self.next_fire
    }

    pub(crate) const fn interval(&self) -> Duration {
        self.interval
    }
}

fn deadline_after(interval: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(interval.min(MAX_DELAY)).unwrap_or(now)
}
