use std::sync::atomic::Ordering;

use time::{Duration, OffsetDateTime};

use ember_domain::{
	freshness::Freshness,
	identity::IDENTITY_CONTEXT,
	query::Mode,
	source::{Source, SourceOrigin},
};
use ember_service::{
	StreamEvent,
	generation::EXHAUSTED_MESSAGE,
	pipeline::{
		CACHE_FRESH_STATUS, CACHE_STALE_STATUS, IDENTITY_STATUS, THINKING_STATUS, WRITING_STATUS,
	},
	resolver::WEB_SEARCH_STATUS,
};

use super::{
	FakeSearch, Fakes, Reply, answer_text, collect_events, hit, lock, long_text, statuses,
	test_config, wait_until,
};

fn web_fakes() -> Fakes {
	Fakes {
		search: std::sync::Arc::new(FakeSearch::with_hits(vec![
			hit("Rust", "https://rust-lang.org", &long_text("Rust is fast."), 0.9),
			hit("Book", "https://doc.rust-lang.org/book", &long_text("The book."), 0.8),
		])),
		..Fakes::default()
	}
}

#[tokio::test]
async fn identity_query_skips_cache_and_search() {
	let fakes = Fakes::default();
	let service = fakes.service(test_config(&["A"]));
	let events = collect_events(&service, "Hey, who CREATED you?", Mode::Fast).await;

	assert_eq!(events.first(), Some(&StreamEvent::Status(IDENTITY_STATUS.to_string())));
	assert_eq!(&events[events.len() - 2..], &[StreamEvent::Done, StreamEvent::Terminator]);
	assert!(
		events[1..events.len() - 2]
			.iter()
			.all(|event| matches!(event, StreamEvent::AnswerChunk(_)))
	);
	assert_eq!(answer_text(&events), "Hello, world.");
	assert_eq!(fakes.cache.fetch_count(), 0);
	assert_eq!(fakes.cache.store_count(), 0);
	assert_eq!(fakes.search.search_count(), 0);
	assert!(fakes.generation.calls()[0].user.contains(IDENTITY_CONTEXT));
}

#[tokio::test]
async fn miss_streams_web_answer_then_fresh_hit_replays_it() {
	let fakes = web_fakes();
	let service = fakes.service(test_config(&["A"]));
	let first = collect_events(&service, "What is Rust?", Mode::Fast).await;

	assert_eq!(
		statuses(&first),
		vec![THINKING_STATUS, WEB_SEARCH_STATUS, WRITING_STATUS]
			.into_iter()
			.map(str::to_string)
			.collect::<Vec<_>>()
	);
	assert_eq!(first.iter().filter(|event| matches!(event, StreamEvent::Sources(_))).count(), 1);
	assert_eq!(first.last(), Some(&StreamEvent::Terminator));
	assert_eq!(fakes.cache.store_count(), 1);

	let calls_before = fakes.generation.calls().len();
	let second = collect_events(&service, "  what is rust? ", Mode::Fast).await;

	assert_eq!(second.first(), Some(&StreamEvent::Status(CACHE_FRESH_STATUS.to_string())));
	assert_eq!(answer_text(&second), answer_text(&first));
	assert!(
		second
			.iter()
			.filter_map(|event| match event {
				StreamEvent::AnswerChunk(chunk) => Some(chunk.chars().count()),
				_ => None,
			})
			.all(|len| len <= 20)
	);
	assert_eq!(&second[second.len() - 2..], &[StreamEvent::Done, StreamEvent::Terminator]);
	assert_eq!(fakes.generation.calls().len(), calls_before);
	assert_eq!(fakes.search.search_count(), 1);
}

#[tokio::test]
async fn stale_hit_serves_old_answer_and_refreshes_in_background() {
	let fakes = web_fakes();
	let service = fakes.service(test_config(&["A"]));
	let stale_source = Source {
		title: "Old".to_string(),
		url: "https://old.example".to_string(),
		content: String::new(),
		relevance_score: 0.5,
		origin: SourceOrigin::Web,
	};

	service
		.cache
		.store_at(
			"What is Rust?",
			Mode::Fast,
			"old answer",
			&[stale_source.clone()],
			OffsetDateTime::now_utc() - Duration::seconds(120),
		)
		.await;

	let events = collect_events(&service, "What is Rust?", Mode::Fast).await;

	assert_eq!(events[0], StreamEvent::Status(CACHE_STALE_STATUS.to_string()));
	assert_eq!(events[1], StreamEvent::Sources(vec![stale_source]));
	assert_eq!(answer_text(&events), "old answer");
	assert_eq!(events.last(), Some(&StreamEvent::Terminator));

	assert!(wait_until(|| fakes.cache.store_count() == 2).await, "Refresh never wrote the cache.");

	let (entry, freshness) = service.cache.lookup("What is Rust?", Mode::Fast).await;
	let entry = entry.expect("Expected a refreshed entry.");

	assert_eq!(freshness, Freshness::Fresh);
	assert_eq!(entry.answer, "Hello, world.");
	assert_eq!(entry.sources.len(), 2);
}

#[tokio::test]
async fn exhaustion_is_answer_content_and_not_cached() {
	let fakes = web_fakes();

	fakes.generation.set_default(Reply::RateLimited);

	let service = fakes.service(test_config(&["A", "B"]));
	let events = collect_events(&service, "What is Rust?", Mode::Fast).await;

	assert_eq!(answer_text(&events), EXHAUSTED_MESSAGE);
	assert_eq!(&events[events.len() - 2..], &[StreamEvent::Done, StreamEvent::Terminator]);
	assert_eq!(fakes.cache.store_count(), 0);
}

#[tokio::test]
async fn mid_stream_fault_appends_system_error_and_terminates() {
	let fakes = web_fakes();

	fakes.generation.set_default(Reply::BreakAfter(vec!["Partial".to_string()]));

	let service = fakes.service(test_config(&["A"]));
	let events = collect_events(&service, "What is Rust?", Mode::Fast).await;
	let answer = answer_text(&events);

	assert!(answer.starts_with("Partial\n\n**System Error:** "));
	assert!(!events.contains(&StreamEvent::Done));
	assert_eq!(events.last(), Some(&StreamEvent::Terminator));
	assert_eq!(fakes.cache.store_count(), 0);
}

#[tokio::test]
async fn empty_web_results_answer_without_caching() {
	let fakes = Fakes::default();

	*super::lock(&fakes.search.fail) = true;

	let service = fakes.service(test_config(&["A"]));
	let events = collect_events(&service, "Anything new?", Mode::Deep).await;

	assert!(events.contains(&StreamEvent::Sources(Vec::new())));
	assert_eq!(answer_text(&events), "Hello, world.");
	assert!(fakes.generation.calls()[0].user.contains("No results found."));
	assert_eq!(fakes.cache.store_count(), 0);
}

#[tokio::test]
async fn dropped_receiver_does_not_cancel_the_pipeline() {
	let fakes = web_fakes();
	let mut cfg = test_config(&["A"]);

	cfg.streaming.token_delay_ms = 5;
	cfg.streaming.channel_capacity = 1;

	let service = fakes.service(cfg);

	drop(service.stream("What is Rust?".to_string(), Mode::Fast));

	assert!(wait_until(|| fakes.cache.store_count() == 1).await, "Answer was never cached.");
}

async fn assert_memory_fault_falls_through_to_web(fakes: &Fakes) {
	let service = fakes.service(test_config(&["A"]));
	let events = collect_events(&service, "What is Rust?", Mode::Fast).await;

	assert_eq!(
		statuses(&events),
		vec![THINKING_STATUS, WEB_SEARCH_STATUS, WRITING_STATUS]
			.into_iter()
			.map(str::to_string)
			.collect::<Vec<_>>()
	);
	assert_eq!(events.iter().filter(|event| matches!(event, StreamEvent::Sources(_))).count(), 1);
	assert_eq!(&events[events.len() - 2..], &[StreamEvent::Done, StreamEvent::Terminator]);
	assert_eq!(fakes.search.search_count(), 1);

	let (entry, freshness) = service.cache.lookup("What is Rust?", Mode::Fast).await;
	let entry = entry.expect("Expected the web answer to be cached.");

	assert_eq!(freshness, Freshness::Fresh);
	assert_eq!(entry.answer, answer_text(&events));
	assert_eq!(entry.sources.len(), 2);
	assert!(entry.sources.iter().all(|source| source.origin == SourceOrigin::Web));
}

#[tokio::test]
async fn embedding_fault_degrades_to_web_search() {
	let fakes = web_fakes();

	*lock(&fakes.embedding.fail) = true;

	assert_memory_fault_falls_through_to_web(&fakes).await;
	assert_eq!(fakes.memory.recalls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn recall_fault_degrades_to_web_search() {
	let fakes = web_fakes();

	*lock(&fakes.memory.fail_recall) = true;

	assert_memory_fault_falls_through_to_web(&fakes).await;
	assert_eq!(fakes.memory.recalls.load(Ordering::SeqCst), 1);
}
