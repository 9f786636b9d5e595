//! Out-of-band regeneration of stale cache entries. Observable only through the cache.

use std::sync::Arc;

use futures_util::StreamExt;

use crate::{EmberService, GenerationRequest, pipeline::EventSink};
use ember_domain::query::Mode;

impl EmberService {
	/// Schedules a refresh of `(query, mode)` and returns immediately. No handle is kept, and
	/// concurrent refreshes of the same key are not merged.
	pub fn spawn_refresh(self: &Arc<Self>, query: String, mode: Mode) {
		let service = Arc::clone(self);

		tokio::spawn(async move {
			service.refresh(&query, mode).await;
		});
	}

	/// Re-resolves and regenerates `(query, mode)`, then overwrites the cache entry on success.
	pub async fn refresh(self: &Arc<Self>, query: &str, mode: Mode) {
		let resolution = match self.resolve(query, mode, &EventSink::detached()).await {
			Ok(resolution) => resolution,
			Err(err) => {
				tracing::debug!(error = %err, mode = mode.as_str(), "Cache refresh resolution failed.");

				return;
			},
		};
		let req = GenerationRequest {
			query: resolution.query.clone(),
			context: resolution.context.clone(),
			mode: resolution.mode,
		};
		let mut tokens = match self.generator.open(&req).await {
			Ok(tokens) => tokens,
			Err(err) => {
				tracing::warn!(error = %err, mode = mode.as_str(), "Cache refresh generation failed.");

				return;
			},
		};
		let mut answer = String::new();

		while let Some(item) = tokens.next().await {
			match item {
				Ok(token) => answer.push_str(&token),
				Err(err) => {
					tracing::warn!(error = %err, mode = mode.as_str(), "Cache refresh stream failed.");

					return;
				},
			}
		}

		if !resolution.is_cacheable(&answer) {
			tracing::debug!(
				branch = resolution.branch.as_str(),
				mode = mode.as_str(),
				"Cache refresh produced nothing to store."
			);

			return;
		}

		self.cache.store(query, mode, &answer, &resolution.sources).await;

		tracing::info!(branch = resolution.branch.as_str(), mode = mode.as_str(), "Cache refreshed.");
	}
}
