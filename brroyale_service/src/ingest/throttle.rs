/// Courtesy rate limiting for the CDO API.
///
/// The API allows five requests per second per token. Every request made by
/// a client goes through one `Throttle`, so the spacing holds across page
/// boundaries and across cities alike.
///
/// Backed by a single-cell `governor` limiter: one request per interval,
/// no bursts. The service is blocking, so a denied check sleeps the thread
/// for the wait time governor reports and tries again.

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::thread;
use std::time::Duration;

pub struct Throttle {
    /// `None` when the interval is zero (no spacing).
    limiter: Option<DefaultDirectRateLimiter>,
    clock: DefaultClock,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            limiter: Quota::with_period(interval).map(RateLimiter::direct),
            clock: DefaultClock::default(),
        }
    }

    /// Time still to wait before a request may go out, or `None` if one may
    /// go out now. A `None` claims the slot.
    pub fn try_acquire(&self) -> Option<Duration> {
        let limiter = self.limiter.as_ref()?;
        match limiter.check() {
            Ok(()) => None,
            Err(not_until) => Some(not_until.wait_time_from(self.clock.now())),
        }
    }

    /// Blocks until a request may go out, then claims the slot.
    pub fn wait(&self) {
        while let Some(remaining) = self.try_acquire() {
            thread::sleep(remaining);
        }
    }
}
