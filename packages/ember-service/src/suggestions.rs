use time::{Duration, OffsetDateTime};

use crate::{EmberService, cache::SUGGESTIONS_CACHE_KIND};
use ember_domain::text;

pub const SUGGESTIONS_CACHE_KEY: &str = "global";

const SUGGESTIONS_CONTEXT: &str = r#"Return a JSON list like ["Topic 1", "Topic 2"]"#;

impl EmberService {
	/// Trending search suggestions. Never fails: any fault yields the configured fallback list.
	pub async fn suggestions(&self) -> Vec<String> {
		let now = OffsetDateTime::now_utc();

		if self.cfg.cache.enabled
			&& let Some((cached, _)) = self
				.cache
				.fetch_json::<Vec<String>>(SUGGESTIONS_CACHE_KIND, SUGGESTIONS_CACHE_KEY, now)
				.await
			&& !cached.is_empty()
		{
			return cached;
		}

		match self.generator.complete(&self.cfg.prompts.suggestions, SUGGESTIONS_CONTEXT).await {
			Ok(raw) => match text::parse_suggestions(&raw) {
				Some(suggestions) => {
					let ttl = Duration::seconds(self.cfg.cache.suggestions_ttl_secs as i64);

					if self.cfg.cache.enabled
						&& let Some(expires_at) = now.checked_add(ttl)
					{
						self.cache
							.store_json(
								SUGGESTIONS_CACHE_KIND,
								SUGGESTIONS_CACHE_KEY,
								&suggestions,
								now,
								expires_at,
							)
							.await;
					}

					return suggestions;
				},
				None => tracing::warn!("Suggestion output held no JSON string array."),
			},
			Err(err) => tracing::warn!(error = %err, "Suggestion generation failed."),
		}

		self.cfg.prompts.fallback_suggestions.clone()
	}
}
