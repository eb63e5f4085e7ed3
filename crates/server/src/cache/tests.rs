use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::clock::ManualClock;

fn cache(ttl_secs: u64) -> (IdempotencyCache<String>, Arc<ManualClock>) {
	let clock = ManualClock::new();
	let cache = IdempotencyCache::with_clock(Duration::from_secs(ttl_secs), clock.clone());
	(cache, clock)
}

#[test]
fn entry_is_live_until_expiry() {
	let (cache, clock) = cache(15);
	cache.set("K1", "first".to_owned());

	clock.advance(Duration::from_secs(14));
	assert_eq!(cache.get("K1").as_deref(), Some("first"));

	clock.advance(Duration::from_secs(1));
	assert_eq!(cache.get("K1"), None);
	assert!(cache.is_empty());
}

#[test]
fn missing_key_is_absent() {
	let (cache, _clock) = cache(15);
	assert_eq!(cache.get("nope"), None);
}

#[test]
fn set_replaces_and_refreshes() {
	let (cache, clock) = cache(10);
	cache.set("K", "a".to_owned());
	clock.advance(Duration::from_secs(8));
	cache.set("K", "b".to_owned());
	clock.advance(Duration::from_secs(8));
	assert_eq!(cache.get("K").as_deref(), Some("b"));
}

#[test]
fn per_entry_ttl() {
	let (cache, clock) = cache(10);
	cache.set_with_ttl("short", "s".to_owned(), Duration::from_secs(1));
	cache.set("long", "l".to_owned());
	clock.advance(Duration::from_secs(2));
	assert_eq!(cache.get("short"), None);
	assert_eq!(cache.get("long").as_deref(), Some("l"));
}

#[test]
fn sweep_counts_removed_entries() {
	let (cache, clock) = cache(10);
	cache.set("a", "1".to_owned());
	cache.set("b", "2".to_owned());
	clock.advance(Duration::from_secs(5));
	cache.set("c", "3".to_owned());
	clock.advance(Duration::from_secs(5));

	assert_eq!(cache.len(), 3);
	assert_eq!(cache.sweep(), 2);
	assert_eq!(cache.len(), 1);
	assert_eq!(cache.sweep(), 0);

	cache.clear();
	assert!(cache.is_empty());
}

#[test]
fn concurrent_access_never_returns_expired_entries() {
	let (cache, clock) = cache(5);
	let cache = Arc::new(cache);
	for i in 0..64 {
		cache.set(format!("k{i}"), i.to_string());
	}
	clock.advance(Duration::from_secs(5));

	let handles: Vec<_> = (0..8)
		.map(|t| {
			let cache = Arc::clone(&cache);
			std::thread::spawn(move || {
				let mut hits = 0;
				for i in 0..64 {
					if cache.get(&format!("k{i}")).is_some() {
						hits += 1;
					}
					if t % 2 == 0 {
						cache.sweep();
					}
				}
				hits
			})
		})
		.collect();

	for handle in handles {
		assert_eq!(handle.join().unwrap(), 0);
	}
	assert!(cache.is_empty());
}

#[tokio::test]
async fn lock_key_serializes_the_same_key() {
	let cache = Arc::new(IdempotencyCache::<String>::new(Duration::from_secs(15)));
	let computed = Arc::new(AtomicUsize::new(0));

	let tasks: Vec<_> = (0..4)
		.map(|_| {
			let cache = Arc::clone(&cache);
			let computed = Arc::clone(&computed);
			tokio::spawn(async move {
				let _guard = cache.lock_key("K1").await;
				if let Some(hit) = cache.get("K1") {
					return hit;
				}
				tokio::task::yield_now().await;
				let n = computed.fetch_add(1, Ordering::SeqCst);
				let value = format!("result-{n}");
				cache.set("K1", value.clone());
				value
			})
		})
		.collect();

	let mut results = Vec::new();
	for task in tasks {
		results.push(task.await.unwrap());
	}
	assert_eq!(computed.load(Ordering::SeqCst), 1);
	assert!(results.iter().all(|r| r == "result-0"));
}

#[tokio::test]
async fn distinct_keys_do_not_block_each_other() {
	let cache = IdempotencyCache::<String>::new(Duration::from_secs(15));
	let _a = cache.lock_key("a").await;
	let b = tokio::time::timeout(Duration::from_secs(1), cache.lock_key("b")).await;
	assert!(b.is_ok());
}

#[tokio::test]
async fn sweep_drops_idle_key_locks() {
	let cache = IdempotencyCache::<String>::new(Duration::from_secs(15));
	let held = cache.lock_key("busy").await;
	drop(cache.lock_key("idle").await);

	cache.sweep();
	assert_eq!(cache.in_flight.lock().len(), 1);
	drop(held);
	cache.sweep();
	assert!(cache.in_flight.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sweeper_runs_until_shutdown() {
	let clock = ManualClock::new();
	let cache = Arc::new(IdempotencyCache::with_clock(Duration::from_secs(1), clock.clone()));
	cache.set("old", "x".to_owned());
	clock.advance(Duration::from_secs(2));

	let shutdown = CancellationToken::new();
	let handle = spawn_sweeper(Arc::clone(&cache), Duration::from_secs(30), shutdown.clone());

	tokio::time::sleep(Duration::from_secs(31)).await;
	assert!(cache.is_empty());

	shutdown.cancel();
	handle.await.unwrap();
}
