//! LLM call accounting.
//!
//! Every provider call is logged under [`LLM_TARGET`] with its provider,
//! model, mode, duration and outcome, and counted per provider and mode.
//! [`LlmMetrics::render`] writes the counters in the Prometheus text format
//! for the opt-in `GET /metrics` route.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use impetus_proto::Mode;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::provider::ProviderError;

/// Log target of per-call records.
pub const LLM_TARGET: &str = "impetus::llm";

/// One finished provider call.
#[derive(Debug, Clone, Copy)]
pub struct LlmCall<'a> {
	/// Provider name.
	pub provider: &'static str,
	/// Model the provider used.
	pub model: &'a str,
	/// Request mode.
	pub mode: Mode,
	/// Wall time of the call, timeout included.
	pub elapsed: Duration,
	/// Failure, if any.
	pub error: Option<&'a ProviderError>,
}

#[derive(Default)]
struct CallCounters {
	calls_total: AtomicU64,
	failures_total: AtomicU64,
	latency_us_sum: AtomicU64,
}

/// Counter snapshot for one provider and mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlmCallStats {
	/// Provider name.
	pub provider: &'static str,
	/// Request mode.
	pub mode: &'static str,
	/// Calls made.
	pub calls_total: u64,
	/// Calls that failed.
	pub failures_total: u64,
	/// Summed call latency in microseconds.
	pub latency_us_sum: u64,
}

/// Per provider and mode call counters.
#[derive(Default)]
pub struct LlmMetrics {
	counters: Mutex<BTreeMap<(&'static str, &'static str), Arc<CallCounters>>>,
}

impl LlmMetrics {
	/// Empty counters.
	pub fn new() -> Self {
		Self::default()
	}

	/// Logs `call` and counts it.
	pub fn record(&self, call: &LlmCall<'_>) {
		let duration_ms = call.elapsed.as_secs_f64() * 1_000.0;
		match call.error {
			None => info!(
				target: LLM_TARGET,
				provider = call.provider,
				model = call.model,
				mode = %call.mode,
				duration_ms,
				success = true,
				"llm call"
			),
			Some(error) => warn!(
				target: LLM_TARGET,
				provider = call.provider,
				model = call.model,
				mode = %call.mode,
				duration_ms,
				success = false,
				error_code = error.code(),
				%error,
				"llm call failed"
			),
		}

		let counters = Arc::clone(
			self.counters
				.lock()
				.entry((call.provider, call.mode.as_str()))
				.or_default(),
		);
		counters.calls_total.fetch_add(1, Ordering::Relaxed);
		if call.error.is_some() {
			counters.failures_total.fetch_add(1, Ordering::Relaxed);
		}
		let micros = u64::try_from(call.elapsed.as_micros()).unwrap_or(u64::MAX);
		counters.latency_us_sum.fetch_add(micros, Ordering::Relaxed);
	}

	/// Current counters, ordered by provider then mode.
	pub fn snapshot(&self) -> Vec<LlmCallStats> {
		self.counters
			.lock()
			.iter()
			.map(|(&(provider, mode), counters)| LlmCallStats {
				provider,
				mode,
				calls_total: counters.calls_total.load(Ordering::Relaxed),
				failures_total: counters.failures_total.load(Ordering::Relaxed),
				latency_us_sum: counters.latency_us_sum.load(Ordering::Relaxed),
			})
			.collect()
	}

	/// Prometheus text exposition of the counters.
	pub fn render(&self) -> String {
		let stats = self.snapshot();
		let mut out = String::new();
		let families: [(&str, &str, fn(&LlmCallStats) -> String); 3] = [
			(
				"impetus_llm_requests_total",
				"Provider calls made.",
				|s| s.calls_total.to_string(),
			),
			(
				"impetus_llm_failures_total",
				"Provider calls that failed.",
				|s| s.failures_total.to_string(),
			),
			(
				"impetus_llm_request_duration_seconds_sum",
				"Summed provider call latency.",
				|s| format!("{:.6}", s.latency_us_sum as f64 / 1_000_000.0),
			),
		];
		for (name, help, value) in families {
			let _ = writeln!(out, "# HELP {name} {help}");
			let _ = writeln!(out, "# TYPE {name} counter");
			for s in &stats {
				let _ = writeln!(
					out,
					"{name}{{provider=\"{}\",mode=\"{}\"}} {}",
					s.provider,
					s.mode,
					value(s)
				);
			}
		}
		out
	}
}

impl std::fmt::Debug for LlmMetrics {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LlmMetrics")
			.field("series", &self.counters.lock().len())
			.finish()
	}
}
