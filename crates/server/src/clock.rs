//! Injectable time source for expiry and rate windows.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonic time source.
pub trait Clock: Send + Sync {
	/// Returns the current instant.
	fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Instant {
		Instant::now()
	}
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
	origin: Instant,
	elapsed: Mutex<Duration>,
}

impl ManualClock {
	/// Creates a clock frozen at the current instant.
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			origin: Instant::now(),
			elapsed: Mutex::new(Duration::ZERO),
		})
	}

	/// Moves the clock forward.
	pub fn advance(&self, by: Duration) {
		*self.elapsed.lock() += by;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Instant {
		self.origin + *self.elapsed.lock()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn manual_clock_moves_only_on_advance() {
		let clock = ManualClock::new();
		let start = clock.now();
		assert_eq!(clock.now(), start);
		clock.advance(Duration::from_secs(3));
		assert_eq!(clock.now() - start, Duration::from_secs(3));
	}
}
