//! Sliding-window rate limiting per client.
//!
//! Clients are identified by the `X-Client-Id` header, or share the
//! `anonymous` bucket without one. Each client keeps the timestamps of its
//! requests inside the window.
//!
//! # Memory bound
//!
//! - Every `cleanup_interval` checks, clients with no request inside the
//!   window are dropped.
//! - The number of tracked clients never exceeds `max_tracked_clients`. A new
//!   client arriving at the cap forces a cleanup and is rejected if there is
//!   still no room.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};

/// Limiter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
	/// Requests allowed per client inside the window.
	pub max_requests: u32,
	/// Window length in seconds.
	pub window_secs: u64,
	/// Run a cleanup every this many checks.
	pub cleanup_interval: u64,
	/// Hard cap on distinct clients tracked at once.
	pub max_tracked_clients: usize,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			max_requests: 30,
			window_secs: 60,
			cleanup_interval: 100,
			max_tracked_clients: 10_000,
		}
	}
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateLimitError {
	/// The client used up its window.
	#[error("rate limit exceeded, retry in {}s", retry_after.as_secs())]
	Exceeded {
		/// Time until the oldest request leaves the window.
		retry_after: Duration,
	},
	/// Too many distinct clients are being tracked.
	#[error("too many tracked clients")]
	TooManyClients {
		/// Suggested back-off.
		retry_after: Duration,
	},
}

impl RateLimitError {
	/// Back-off advised to the client, in whole seconds (at least 1).
	pub fn retry_after_secs(&self) -> u64 {
		let (Self::Exceeded { retry_after } | Self::TooManyClients { retry_after }) = self;
		let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
		secs.max(1)
	}
}

/// In-memory sliding-window limiter.
pub struct RateLimiter {
	config: RateLimitConfig,
	state: RwLock<HashMap<String, Vec<Instant>>>,
	checks: AtomicU64,
	clock: Arc<dyn Clock>,
}

impl RateLimiter {
	/// Creates a limiter on the system clock.
	pub fn new(config: RateLimitConfig) -> Self {
		Self::with_clock(config, Arc::new(SystemClock))
	}

	/// Creates a limiter reading time from `clock`.
	pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
		Self {
			config,
			state: RwLock::new(HashMap::new()),
			checks: AtomicU64::new(0),
			clock,
		}
	}

	fn window(&self) -> Duration {
		Duration::from_secs(self.config.window_secs)
	}

	/// Records a request from `client` if it fits in the window.
	pub fn check(&self, client: &str) -> Result<(), RateLimitError> {
		let count = self.checks.fetch_add(1, Ordering::Relaxed);
		if count > 0 && count % self.config.cleanup_interval.max(1) == 0 {
			debug!(checks = count, "rate limiter periodic cleanup");
			self.cleanup();
		}

		let tracked = self.state.read().contains_key(client);
		if !tracked && self.state.read().len() >= self.config.max_tracked_clients {
			self.cleanup();
		}

		let now = self.clock.now();
		let cutoff = now.checked_sub(self.window()).unwrap_or(now);
		let mut state = self.state.write();

		if !state.contains_key(client) && state.len() >= self.config.max_tracked_clients {
			warn!(
				client,
				tracked = state.len(),
				max = self.config.max_tracked_clients,
				"rejecting new client: tracking cap reached"
			);
			return Err(RateLimitError::TooManyClients {
				retry_after: self.window(),
			});
		}

		let timestamps = state.entry(client.to_owned()).or_default();
		timestamps.retain(|&t| t > cutoff);

		if timestamps.len() >= self.config.max_requests as usize {
			let oldest = timestamps.first().copied().unwrap_or(now);
			let retry_after = (oldest + self.window()).saturating_duration_since(now);
			warn!(
				client,
				requests = timestamps.len(),
				max = self.config.max_requests,
				"rate limit exceeded"
			);
			return Err(RateLimitError::Exceeded { retry_after });
		}

		timestamps.push(now);
		Ok(())
	}

	/// Drops clients with no request inside the window.
	pub fn cleanup(&self) {
		let now = self.clock.now();
		let cutoff = now.checked_sub(self.window()).unwrap_or(now);
		self.state.write().retain(|_, timestamps| {
			timestamps.retain(|&t| t > cutoff);
			!timestamps.is_empty()
		});
	}

	/// Number of clients currently tracked.
	pub fn tracked_clients(&self) -> usize {
		self.state.read().len()
	}
}

impl std::fmt::Debug for RateLimiter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RateLimiter")
			.field("config", &self.config)
			.field("tracked_clients", &self.tracked_clients())
			.finish_non_exhaustive()
	}
}
