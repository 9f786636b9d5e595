use std::sync::Arc;

use super::{FakeGeneration, Fakes, Reply, test_config};

#[tokio::test]
async fn suggestions_are_parsed_and_cached() {
	let generation = FakeGeneration::default();

	generation.set_default(Reply::text(&["Sure! ", "[\"AI Agents\", ", "\"Rust 2024\"]", " enjoy"]));

	let fakes = Fakes { generation: Arc::new(generation), ..Fakes::default() };
	let service = fakes.service(test_config(&["A"]));
	let first = service.suggestions().await;
	let second = service.suggestions().await;

	assert_eq!(first, vec!["AI Agents".to_string(), "Rust 2024".to_string()]);
	assert_eq!(second, first);
	assert_eq!(fakes.generation.calls().len(), 1);
	assert_eq!(fakes.cache.store_count(), 1);
}

#[tokio::test]
async fn unparseable_output_falls_back_to_static_list() {
	let fakes = Fakes::default();

	fakes.generation.set_default(Reply::text(&["no list here"]));

	let service = fakes.service(test_config(&["A"]));
	let suggestions = service.suggestions().await;

	assert_eq!(suggestions, service.cfg.prompts.fallback_suggestions);
	assert_eq!(suggestions.len(), 6);
	assert_eq!(fakes.cache.store_count(), 0);
}

#[tokio::test]
async fn exhausted_keys_fall_back_to_static_list() {
	let fakes = Fakes::default();

	fakes.generation.set_default(Reply::RateLimited);

	let service = fakes.service(test_config(&["A"]));

	assert_eq!(service.suggestions().await[0], "AI Agents");
}
