use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use ember_domain::{
	freshness::Freshness,
	query::Mode,
	source::{Source, SourceOrigin},
};
use ember_service::{FreshnessCache, StreamEvent};

use super::{
	FakeSearch, Fakes, MemoryCache, answer_text, collect_events, hit, lock, long_text,
	test_config,
};

fn source() -> Source {
	Source {
		title: "Rust".to_string(),
		url: "https://rust-lang.org".to_string(),
		content: "A language.".to_string(),
		relevance_score: 0.9,
		origin: SourceOrigin::Web,
	}
}

#[tokio::test]
async fn freshness_boundaries_follow_write_time() {
	let store = Arc::new(MemoryCache::default());
	let cache = FreshnessCache::new(store.clone(), &test_config(&["A"]).cache);
	let written_at = OffsetDateTime::now_utc();

	cache.store_at("Rust?", Mode::Fast, "answer", &[source()], written_at).await;

	for (offset, expected) in [
		(0, Freshness::Fresh),
		(60, Freshness::Fresh),
		(61, Freshness::Stale),
		(86_400, Freshness::Stale),
		(86_401, Freshness::Miss),
	] {
		let (entry, freshness) =
			cache.lookup_at("rust?", Mode::Fast, written_at + Duration::seconds(offset)).await;

		assert_eq!(freshness, expected, "offset {offset}");
		assert_eq!(entry.is_some(), expected != Freshness::Miss, "offset {offset}");
	}
}

#[tokio::test]
async fn store_then_lookup_round_trips_answer_and_sources() {
	let store = Arc::new(MemoryCache::default());
	let cache = FreshnessCache::new(store.clone(), &test_config(&["A"]).cache);

	cache.store("  What is Rust? ", Mode::Deep, "A systems language.", &[source()]).await;

	let (entry, freshness) = cache.lookup("what is rust?", Mode::Deep).await;
	let entry = entry.expect("Expected a cache entry.");

	assert_eq!(freshness, Freshness::Fresh);
	assert_eq!(entry.answer, "A systems language.");
	assert_eq!(entry.sources, vec![source()]);

	let (other_mode, freshness) = cache.lookup("what is rust?", Mode::Fast).await;

	assert!(other_mode.is_none());
	assert_eq!(freshness, Freshness::Miss);
}

#[tokio::test]
async fn last_writer_wins() {
	let store = Arc::new(MemoryCache::default());
	let cache = FreshnessCache::new(store.clone(), &test_config(&["A"]).cache);

	cache.store("q", Mode::Fast, "first", &[]).await;
	cache.store("q", Mode::Fast, "second", &[]).await;

	let (entry, _) = cache.lookup("q", Mode::Fast).await;

	assert_eq!(entry.map(|entry| entry.answer), Some("second".to_string()));
	assert_eq!(lock(&store.rows).len(), 1);
}

#[tokio::test]
async fn storage_faults_degrade_to_miss() {
	let store = Arc::new(MemoryCache::default());
	let cache = FreshnessCache::new(store.clone(), &test_config(&["A"]).cache);

	*lock(&store.fail) = true;

	cache.store("q", Mode::Fast, "answer", &[]).await;

	let (entry, freshness) = cache.lookup("q", Mode::Fast).await;

	assert!(entry.is_none());
	assert_eq!(freshness, Freshness::Miss);
	assert_eq!(store.store_count(), 0);
}

#[tokio::test]
async fn disabled_cache_never_touches_the_store() {
	let store = Arc::new(MemoryCache::default());
	let mut cfg = test_config(&["A"]).cache;

	cfg.enabled = false;

	let cache = FreshnessCache::new(store.clone(), &cfg);

	cache.store("q", Mode::Fast, "answer", &[]).await;

	let (entry, freshness) = cache.lookup("q", Mode::Fast).await;

	assert!(entry.is_none());
	assert_eq!(freshness, Freshness::Miss);
	assert_eq!(store.fetch_count(), 0);
	assert_eq!(store.store_count(), 0);
}

#[tokio::test]
async fn sweep_removes_only_expired_rows() {
	let fakes = super::Fakes::default();
	let service = fakes.service(test_config(&["A"]));
	let now = OffsetDateTime::now_utc();

	service.cache.store_at("old", Mode::Fast, "old", &[], now - Duration::days(2)).await;
	service.cache.store_at("new", Mode::Fast, "new", &[], now).await;

	let removed = service.purge_expired_cache(now).await.expect("Purge failed.");

	assert_eq!(removed, 1);
	assert_eq!(lock(&fakes.cache.rows).len(), 1);
}

#[tokio::test]
async fn unrepresentable_expiry_skips_the_write_and_still_terminates() {
	let fakes = Fakes {
		search: Arc::new(FakeSearch::with_hits(vec![hit(
			"Rust",
			"https://rust-lang.org",
			&long_text("Rust is fast."),
			0.9,
		)])),
		..Fakes::default()
	};
	let mut cfg = test_config(&["A"]);

	cfg.cache.max_ttl_secs = i64::MAX as u64;

	let service = fakes.service(cfg.clone());
	let events = collect_events(&service, "What is Rust?", Mode::Fast).await;

	assert_eq!(events.last(), Some(&StreamEvent::Terminator));
	assert!(!answer_text(&events).is_empty());
	assert_eq!(fakes.cache.store_count(), 0);

	let store = Arc::new(MemoryCache::default());
	let cache = FreshnessCache::new(store.clone(), &cfg.cache);

	cache.store_at("Rust?", Mode::Fast, "answer", &[source()], OffsetDateTime::now_utc()).await;

	assert_eq!(store.store_count(), 0);
}
