use std::sync::{Arc, atomic::Ordering};

use ember_domain::{
	query::Mode,
	source::SourceOrigin,
	video::{DEFAULT_VIDEO_TITLE, TRUNCATION_MARKER},
};
use ember_providers::{search::SearchDepth, transcript::Transcript};
use ember_service::{
	Error, StreamEvent,
	resolver::{
		MEMORY_FOUND_STATUS, VIDEO_ANALYZING_STATUS, VIDEO_FOUND_STATUS, VIDEO_READING_STATUS,
	},
};
use ember_storage::models::KnowledgeHit;

use super::{
	FakeMemory, FakeSearch, FakeTranscript, Fakes, Reply, answer_text, collect_events, hit, lock,
	long_text, statuses, test_config, wait_until,
};

const VIDEO_QUERY: &str = "Summarize https://youtu.be/dQw4w9WgXcQ for me";

fn video_fakes(script: Vec<ember_service::Result<Option<Transcript>>>) -> Fakes {
	let transcript = FakeTranscript::default();

	*lock(&transcript.script) = script;

	Fakes { transcript: Arc::new(transcript), ..Fakes::default() }
}

fn knowledge(title: &str, similarity: f32) -> KnowledgeHit {
	KnowledgeHit {
		url: format!("https://{}.example", title.to_lowercase()),
		title: title.to_string(),
		content: format!("{title} content"),
		similarity,
	}
}

#[tokio::test]
async fn long_transcript_is_truncated_and_cached_with_one_source() {
	let fakes = video_fakes(vec![
		Err(Error::Provider { message: "captions disabled".to_string() }),
		Ok(None),
		Ok(Some(Transcript { title: None, text: "a".repeat(10_000) })),
	]);
	let service = fakes.service(test_config(&["A"]));
	let events = collect_events(&service, VIDEO_QUERY, Mode::Fast).await;
	let calls = fakes.generation.calls();

	assert_eq!(
		statuses(&events),
		vec![
			"Thinking...",
			VIDEO_FOUND_STATUS,
			VIDEO_READING_STATUS,
			VIDEO_ANALYZING_STATUS,
			"Writing answer...",
		]
		.into_iter()
		.map(str::to_string)
		.collect::<Vec<_>>()
	);
	assert_eq!(lock(&fakes.transcript.calls).len(), 3);
	assert_eq!(calls[0].model, "deep-model");
	assert!(calls[0].user.contains(&format!("RAW TRANSCRIPT ({DEFAULT_VIDEO_TITLE}):\n")));
	assert!(calls[0].user.contains(&format!("{}{TRUNCATION_MARKER}", "a".repeat(3_500))));
	assert!(!calls[0].user.contains(&"a".repeat(3_501)));
	assert!(calls[0].user.contains("Summarize key points and answer: "));
	assert_eq!(fakes.search.search_count(), 0);
	assert_eq!(fakes.memory.recalls.load(Ordering::SeqCst), 0);

	let (entry, _) = service.cache.lookup(VIDEO_QUERY, Mode::Fast).await;
	let sources = entry.expect("Expected a cached video answer.").sources;

	assert_eq!(sources.len(), 1);
	assert_eq!(sources[0].title, DEFAULT_VIDEO_TITLE);
	assert_eq!(sources[0].url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
}

#[tokio::test]
async fn metadata_title_names_the_video() {
	let fakes = video_fakes(vec![Ok(Some(Transcript {
		title: Some("Never Gonna".to_string()),
		text: "short transcript".to_string(),
	}))]);
	let service = fakes.service(test_config(&["A"]));
	let events = collect_events(&service, VIDEO_QUERY, Mode::Fast).await;
	let sources = events.iter().find_map(|event| match event {
		StreamEvent::Sources(sources) => Some(sources.clone()),
		_ => None,
	});

	assert_eq!(sources.map(|sources| sources[0].title.clone()), Some("Never Gonna".to_string()));
	assert!(fakes.generation.calls()[0].user.contains("RAW TRANSCRIPT (Never Gonna):\nshort transcript"));
	assert!(!fakes.generation.calls()[0].user.contains(TRUNCATION_MARKER));
}

#[tokio::test]
async fn video_failure_is_visible_and_stops_the_pipeline() {
	let fakes = video_fakes(vec![
		Ok(None),
		Ok(None),
		Ok(None),
		Err(Error::Provider { message: "video unavailable".to_string() }),
	]);
	let service = fakes.service(test_config(&["A"]));
	let events = collect_events(&service, VIDEO_QUERY, Mode::Fast).await;
	let answer = answer_text(&events);

	assert!(answer.starts_with("\n**Error loading video:** Could not find transcript."));
	assert!(answer.contains("video unavailable"));
	assert!(answer.ends_with("\n\n"));
	assert_eq!(events.last(), Some(&StreamEvent::Terminator));
	assert!(!events.contains(&StreamEvent::Done));
	assert!(fakes.generation.calls().is_empty());
	assert_eq!(fakes.search.search_count(), 0);
	assert_eq!(fakes.cache.store_count(), 0);
}

#[tokio::test]
async fn memory_hit_keeps_top_three_in_similarity_order() {
	let memory = FakeMemory::default();

	*lock(&memory.hits) = vec![
		knowledge("Low", 0.86),
		knowledge("TieFirst", 0.95),
		knowledge("Below", 0.5),
		knowledge("TieSecond", 0.95),
		knowledge("Best", 0.99),
	];

	let fakes = Fakes { memory: Arc::new(memory), ..Fakes::default() };
	let service = fakes.service(test_config(&["A"]));
	let events = collect_events(&service, "Tell me about tides", Mode::Fast).await;
	let sources = events
		.iter()
		.find_map(|event| match event {
			StreamEvent::Sources(sources) => Some(sources.clone()),
			_ => None,
		})
		.expect("Expected a sources event.");
	let titles: Vec<&str> = sources.iter().map(|source| source.title.as_str()).collect();

	assert!(statuses(&events).contains(&MEMORY_FOUND_STATUS.to_string()));
	assert_eq!(titles, vec!["[Memory] Best", "[Memory] TieFirst", "[Memory] TieSecond"]);
	assert!(sources.iter().all(|source| source.origin == SourceOrigin::Memory));
	assert_eq!(sources[0].relevance_score, 0.99);
	assert_eq!(fakes.search.search_count(), 0);
	assert!(fakes.generation.calls()[0].user.contains(
		"MEMORY SOURCE (Best): Best content\n\nMEMORY SOURCE (TieFirst): TieFirst content"
	));
}

#[tokio::test]
async fn web_results_are_deduplicated_and_memorized() {
	let search = FakeSearch::with_hits(vec![
		hit("Rust", "https://rust-lang.org", &long_text("first"), 0.9),
		hit("Rust mirror", "https://rust-lang.org", &long_text("same url"), 0.8),
		hit("Rust", "https://other.example", &long_text("same title"), 0.7),
		hit("Cargo", "https://doc.rust-lang.org/cargo", &long_text("cargo"), 0.6),
	]);
	let fakes = Fakes { search: Arc::new(search), ..Fakes::default() };
	let service = fakes.service(test_config(&["A"]));
	let events = collect_events(&service, "rust tooling", Mode::Deep).await;
	let sources = events
		.iter()
		.find_map(|event| match event {
			StreamEvent::Sources(sources) => Some(sources.clone()),
			_ => None,
		})
		.expect("Expected a sources event.");
	let urls: Vec<&str> = sources.iter().map(|source| source.url.as_str()).collect();

	assert_eq!(urls, vec!["https://rust-lang.org", "https://doc.rust-lang.org/cargo"]);
	assert_eq!(
		lock(&fakes.search.searches)[0],
		("rust tooling".to_string(), SearchDepth::Advanced, 10)
	);
	assert!(wait_until(|| lock(&fakes.memory.memorized).len() == 2).await, "Results were not memorized.");
}

#[tokio::test]
async fn thin_results_are_extracted_and_summarized() {
	let search = FakeSearch::with_hits(vec![
		hit("Thin", "https://thin.example", "tiny", 0.9),
		hit("Empty", "https://empty.example", "", 0.8),
	]);

	lock(&search.pages).insert("https://thin.example".to_string(), "x".repeat(8_000));

	let fakes = Fakes { search: Arc::new(search), ..Fakes::default() };

	fakes.generation.set_for_system("Summarize key facts", Reply::text(&["- a fact"]));

	let service = fakes.service(test_config(&["A"]));
	let events = collect_events(&service, "thin pages", Mode::Fast).await;
	let calls = fakes.generation.calls();
	let summarize = calls
		.iter()
		.find(|call| call.system.starts_with("Summarize key facts"))
		.expect("Expected a summarize call.");

	assert_eq!(summarize.user.chars().count(), 6_000);
	assert_eq!(fakes.search.extracts.load(Ordering::SeqCst), 2);
	assert!(events.iter().any(|event| match event {
		StreamEvent::Sources(sources) =>
			sources.len() == 1 && sources[0].content == "- a fact",
		_ => false,
	}));
	assert_eq!(lock(&fakes.search.searches)[0].1, SearchDepth::Basic);
}

#[tokio::test]
async fn failed_summary_falls_back_to_page_excerpt() {
	let search = FakeSearch::with_hits(vec![hit("Thin", "https://thin.example", "tiny", 0.9)]);

	lock(&search.pages).insert("https://thin.example".to_string(), "y".repeat(900));

	let fakes = Fakes { search: Arc::new(search), ..Fakes::default() };

	fakes.generation.set_for_system("Summarize key facts", Reply::Fail);

	let service = fakes.service(test_config(&["A"]));
	let events = collect_events(&service, "thin pages", Mode::Fast).await;

	assert!(events.iter().any(|event| match event {
		StreamEvent::Sources(sources) => sources.len() == 1 && sources[0].content == "y".repeat(500),
		_ => false,
	}));
}
