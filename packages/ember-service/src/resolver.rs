//! Context resolution: identity, video transcript, semantic memory, then web search.

use std::sync::Arc;

use crate::{EmberService, ResolveError, pipeline::EventSink};
use ember_domain::{
	identity,
	query::Mode,
	source::{self, Source, SourceOrigin},
	text, video,
};
use ember_providers::search::SearchDepth;
use ember_storage::models::NewKnowledge;

pub const VIDEO_FOUND_STATUS: &str = "Found video link...";
pub const VIDEO_READING_STATUS: &str = "Reading transcript...";
pub const VIDEO_ANALYZING_STATUS: &str = "Analyzing transcript...";
pub const MEMORY_FOUND_STATUS: &str = "Found in memory!";
pub const WEB_SEARCH_STATUS: &str = "Searching the web...";
pub const NO_RESULTS_CONTEXT: &str = "No results found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
	Identity,
	Video,
	Memory,
	Web,
}
impl Branch {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Identity => "identity",
			Self::Video => "video",
			Self::Memory => "memory",
			Self::Web => "web",
		}
	}
}

/// Everything generation needs for one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
	pub branch: Branch,
	/// The question sent to the model. Differs from the user query for videos.
	pub query: String,
	pub context: String,
	pub sources: Vec<Source>,
	pub mode: Mode,
}
impl Resolution {
	pub fn identity(query: &str, mode: Mode) -> Self {
		Self {
			branch: Branch::Identity,
			query: query.to_string(),
			context: identity::IDENTITY_CONTEXT.to_string(),
			sources: Vec::new(),
			mode,
		}
	}

	/// Whether an answer produced from this resolution may be written to the cache.
	pub fn is_cacheable(&self, answer: &str) -> bool {
		match self.branch {
			Branch::Identity => false,
			Branch::Web => !answer.is_empty() && !self.sources.is_empty(),
			Branch::Video | Branch::Memory => !answer.is_empty(),
		}
	}
}

impl EmberService {
	pub async fn resolve(
		self: &Arc<Self>,
		query: &str,
		mode: Mode,
		sink: &EventSink,
	) -> Result<Resolution, ResolveError> {
		if identity::is_identity_query(query) {
			return Ok(Resolution::identity(query, mode));
		}
		if let Some(video_id) = video::extract_video_id(query) {
			return self.resolve_video(query, &video_id, sink).await;
		}
		if let Some(resolution) = self.resolve_memory(query, mode, sink).await {
			return Ok(resolution);
		}

		Ok(self.resolve_web(query, mode, sink).await)
	}

	async fn resolve_video(
		&self,
		query: &str,
		video_id: &str,
		sink: &EventSink,
	) -> Result<Resolution, ResolveError> {
		sink.status(VIDEO_FOUND_STATUS).await;

		let transcript = self.fetch_transcript(video_id).await?;
		let title = transcript
			.title
			.map(|title| title.trim().to_string())
			.filter(|title| !title.is_empty())
			.unwrap_or_else(|| video::DEFAULT_VIDEO_TITLE.to_string());

		sink.status(VIDEO_READING_STATUS).await;

		let text = video::truncate_transcript(
			&transcript.text,
			self.cfg.retrieval.transcript_max_chars as usize,
		);
		let context = video::transcript_context(&title, &text);

		sink.status(VIDEO_ANALYZING_STATUS).await;

		tracing::info!(branch = Branch::Video.as_str(), video_id, "Video transcript resolved.");

		Ok(Resolution {
			branch: Branch::Video,
			query: video::analysis_prompt(&title, query),
			context,
			sources: vec![Source {
				title,
				url: video::canonical_url(video_id),
				content: String::new(),
				relevance_score: 1.0,
				origin: SourceOrigin::Web,
			}],
			mode: Mode::Deep,
		})
	}

	async fn fetch_transcript(
		&self,
		video_id: &str,
	) -> Result<ember_providers::transcript::Transcript, ResolveError> {
		let cfg = &self.cfg.providers.transcript;
		let last = video::TRANSCRIPT_LADDER.len() - 1;

		for (rung, options) in video::TRANSCRIPT_LADDER.iter().enumerate() {
			match self.providers.transcript.fetch(cfg, video_id, options).await {
				Ok(Some(transcript)) if !transcript.text.trim().is_empty() => return Ok(transcript),
				Ok(_) if rung == last => {
					return Err(ResolveError::Video {
						message: "Could not find transcript. (No captions available.)".to_string(),
					});
				},
				Err(err) if rung == last => {
					return Err(ResolveError::Video {
						message: format!("Could not find transcript. ({err})"),
					});
				},
				Ok(_) => {
					tracing::debug!(video_id, rung, "Transcript rung returned nothing.");
				},
				Err(err) => {
					tracing::debug!(error = %err, video_id, rung, "Transcript rung failed.");
				},
			}
		}

		Err(ResolveError::Video { message: "Could not find transcript.".to_string() })
	}

	async fn resolve_memory(&self, query: &str, mode: Mode, sink: &EventSink) -> Option<Resolution> {
		let retrieval = &self.cfg.retrieval;
		let texts = [query.to_string()];
		let embedding = match self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await
		{
			Ok(vectors) => vectors.into_iter().next()?,
			Err(err) => {
				tracing::warn!(error = %err, branch = Branch::Memory.as_str(), "Query embedding failed.");

				return None;
			},
		};
		let mut hits = match self
			.stores
			.memory
			.recall(&embedding, retrieval.memory_threshold, retrieval.memory_top_k)
			.await
		{
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(error = %err, branch = Branch::Memory.as_str(), "Memory recall failed.");

				return None;
			},
		};

		hits.retain(|hit| hit.similarity > retrieval.memory_threshold);
		hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
		hits.truncate(retrieval.memory_top_k as usize);

		if hits.is_empty() {
			return None;
		}

		sink.status(MEMORY_FOUND_STATUS).await;

		tracing::info!(branch = Branch::Memory.as_str(), hits = hits.len(), "Memory recall hit.");

		let context = hits
			.iter()
			.map(|hit| format!("MEMORY SOURCE ({}): {}", hit.title, hit.content))
			.collect::<Vec<_>>()
			.join("\n\n");
		let sources = hits
			.into_iter()
			.map(|hit| Source {
				title: format!("[Memory] {}", hit.title),
				url: hit.url,
				content: hit.content,
				relevance_score: hit.similarity,
				origin: SourceOrigin::Memory,
			})
			.collect();

		Some(Resolution { branch: Branch::Memory, query: query.to_string(), context, sources, mode })
	}

	async fn resolve_web(self: &Arc<Self>, query: &str, mode: Mode, sink: &EventSink) -> Resolution {
		sink.status(WEB_SEARCH_STATUS).await;

		let retrieval = &self.cfg.retrieval;
		let (depth, max_results) = match mode {
			Mode::Fast => (SearchDepth::Basic, retrieval.fast_max_results),
			Mode::Deep => (SearchDepth::Advanced, retrieval.deep_max_results),
		};
		let hits = match self
			.providers
			.search
			.search(&self.cfg.providers.search, query, depth, max_results)
			.await
		{
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(error = %err, branch = Branch::Web.as_str(), "Web search failed.");

				Vec::new()
			},
		};
		let mut sources = Vec::with_capacity(hits.len());

		for hit in hits {
			let content = if hit.content.chars().count() < retrieval.min_content_chars as usize {
				self.enrich_thin_result(&hit.url).await
			} else {
				hit.content
			};

			if content.trim().is_empty() {
				continue;
			}

			sources.push(Source {
				title: hit.title,
				url: hit.url,
				content,
				relevance_score: hit.score,
				origin: SourceOrigin::Web,
			});
		}

		let sources = source::dedup_sources(sources);

		tracing::info!(
			branch = Branch::Web.as_str(),
			mode = mode.as_str(),
			sources = sources.len(),
			"Web search resolved."
		);

		self.spawn_memorize(&sources);

		let context = if sources.is_empty() {
			NO_RESULTS_CONTEXT.to_string()
		} else {
			sources.iter().map(|source| source.content.as_str()).collect::<Vec<_>>().join("\n")
		};

		Resolution { branch: Branch::Web, query: query.to_string(), context, sources, mode }
	}

	/// Extracts the full page and summarizes it. Returns an empty string when nothing usable is found.
	async fn enrich_thin_result(&self, url: &str) -> String {
		let retrieval = &self.cfg.retrieval;
		let page = match self.providers.search.extract(&self.cfg.providers.search, url).await {
			Ok(Some(page)) => page,
			Ok(None) => return String::new(),
			Err(err) => {
				tracing::debug!(error = %err, url, "Page extraction failed.");

				return String::new();
			},
		};
		let (input, _) = text::truncate_chars(&page, retrieval.summarize_input_chars as usize);

		match self.generator.summarize(&self.cfg.prompts.summarize, input).await {
			Ok(summary) if !summary.trim().is_empty() => summary,
			Ok(_) => fallback_excerpt(&page, retrieval.summarize_fallback_chars),
			Err(err) => {
				tracing::warn!(error = %err, url, "Page summarization failed.");

				fallback_excerpt(&page, retrieval.summarize_fallback_chars)
			},
		}
	}

	/// Embeds and stores web results off the request path. Failures are logged and dropped.
	fn spawn_memorize(self: &Arc<Self>, sources: &[Source]) {
		let min_chars = self.cfg.retrieval.min_memorize_chars as usize;
		let worth_keeping: Vec<Source> = sources
			.iter()
			.filter(|source| source.content.chars().count() >= min_chars)
			.cloned()
			.collect();

		if worth_keeping.is_empty() {
			return;
		}

		let service = Arc::clone(self);

		tokio::spawn(async move {
			let texts: Vec<String> =
				worth_keeping.iter().map(|source| source.content.clone()).collect();
			let vectors =
				match service.providers.embedding.embed(&service.cfg.providers.embedding, &texts).await
				{
					Ok(vectors) => vectors,
					Err(err) => {
						tracing::warn!(error = %err, "Memorize embedding failed.");

						return;
					},
				};
			let rows: Vec<NewKnowledge> = worth_keeping
				.into_iter()
				.zip(vectors)
				.map(|(source, embedding)| NewKnowledge {
					url: source.url,
					title: source.title,
					content: source.content,
					embedding,
				})
				.collect();

			match service.stores.memory.memorize(&rows).await {
				Ok(count) => tracing::debug!(rows = count, "Web results memorized."),
				Err(err) => tracing::warn!(error = %err, "Memorize failed."),
			}
		});
	}
}

fn fallback_excerpt(page: &str, max_chars: u32) -> String {
	text::truncate_chars(page, max_chars as usize).0.to_string()
}
