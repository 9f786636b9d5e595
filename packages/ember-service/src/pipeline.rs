//! The per-request answer state machine and its event protocol.
//!
//! Every request ends with [`StreamEvent::Terminator`], whichever branch served it.

use std::{sync::Arc, time::Duration};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
	EmberService, GenerationRequest, Resolution, ResolveError, cache::CachedAnswer,
	generation,
};
use ember_domain::{freshness::Freshness, query::Mode, source::Source, text};

pub const IDENTITY_STATUS: &str = "Answering directly...";
pub const THINKING_STATUS: &str = "Thinking...";
pub const WRITING_STATUS: &str = "Writing answer...";
pub const CACHE_FRESH_STATUS: &str = "Instant recall from cache";
pub const CACHE_STALE_STATUS: &str = "Refreshing insights...";
pub const DONE_STATUS: &str = "Done";
pub const TERMINATOR_DATA: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
	Status(String),
	Sources(Vec<Source>),
	AnswerChunk(String),
	Done,
	Terminator,
}
impl StreamEvent {
	/// The `data:` payload of this event on the wire.
	pub fn to_data(&self) -> String {
		let value = match self {
			Self::Status(message) => serde_json::json!({ "status": message }),
			Self::Sources(sources) => serde_json::json!({ "sources": sources }),
			Self::AnswerChunk(chunk) => serde_json::json!({ "answer_chunk": chunk }),
			Self::Done => serde_json::json!({ "status": DONE_STATUS }),
			Self::Terminator => return TERMINATOR_DATA.to_string(),
		};

		value.to_string()
	}
}

/// Sending half of a request's event channel. A detached sink discards everything.
#[derive(Clone)]
pub struct EventSink {
	tx: Option<mpsc::Sender<StreamEvent>>,
}
impl EventSink {
	pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
		Self { tx: Some(tx) }
	}

	pub fn detached() -> Self {
		Self { tx: None }
	}

	pub fn is_open(&self) -> bool {
		self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
	}

	pub async fn emit(&self, event: StreamEvent) {
		if let Some(tx) = &self.tx {
			// A gone receiver is not an error; the pipeline runs to completion regardless.
			let _ = tx.send(event).await;
		}
	}

	pub async fn status(&self, message: &str) {
		self.emit(StreamEvent::Status(message.to_string())).await;
	}

	async fn pace(&self, delay_ms: u64) {
		if delay_ms > 0 && self.is_open() {
			tokio::time::sleep(Duration::from_millis(delay_ms)).await;
		}
	}
}

impl EmberService {
	/// Starts answering `query` on a new task and returns its event stream.
	pub fn stream(self: &Arc<Self>, query: String, mode: Mode) -> ReceiverStream<StreamEvent> {
		let (tx, rx) = mpsc::channel(self.cfg.streaming.channel_capacity);
		let service = Arc::clone(self);

		tokio::spawn(async move {
			service.run_pipeline(&query, mode, &EventSink::new(tx)).await;
		});

		ReceiverStream::new(rx)
	}

	pub async fn run_pipeline(self: &Arc<Self>, query: &str, mode: Mode, sink: &EventSink) {
		if ember_domain::identity::is_identity_query(query) {
			tracing::info!(branch = "identity", mode = mode.as_str(), "Identity query answered directly.");

			sink.status(IDENTITY_STATUS).await;

			let resolution = Resolution::identity(query, mode);

			self.answer(query, mode, &resolution, sink).await;
			sink.emit(StreamEvent::Terminator).await;

			return;
		}

		match self.cache.lookup(query, mode).await {
			(Some(entry), Freshness::Fresh) => {
				self.serve_cached(entry, CACHE_FRESH_STATUS, sink).await;
			},
			(Some(entry), Freshness::Stale) => {
				self.spawn_refresh(query.to_string(), mode);
				self.serve_cached(entry, CACHE_STALE_STATUS, sink).await;
			},
			_ => self.serve_miss(query, mode, sink).await,
		}

		sink.emit(StreamEvent::Terminator).await;
	}

	async fn serve_cached(&self, entry: CachedAnswer, status: &str, sink: &EventSink) {
		let streaming = &self.cfg.streaming;

		sink.status(status).await;
		sink.emit(StreamEvent::Sources(entry.sources)).await;

		for chunk in text::chunk_text(&entry.answer, streaming.cache_chunk_chars) {
			sink.emit(StreamEvent::AnswerChunk(chunk)).await;
			sink.pace(streaming.cache_chunk_delay_ms).await;
		}

		sink.emit(StreamEvent::Done).await;
	}

	async fn serve_miss(self: &Arc<Self>, query: &str, mode: Mode, sink: &EventSink) {
		sink.status(THINKING_STATUS).await;

		let resolution = match self.resolve(query, mode, sink).await {
			Ok(resolution) => resolution,
			Err(ResolveError::Video { message }) => {
				tracing::warn!(error = %message, branch = "video", "Video resolution failed.");

				sink.emit(StreamEvent::AnswerChunk(format!(
					"\n**Error loading video:** {message}\n\n"
				)))
				.await;

				return;
			},
		};

		sink.emit(StreamEvent::Sources(resolution.sources.clone())).await;
		sink.status(WRITING_STATUS).await;

		self.answer(query, mode, &resolution, sink).await;
	}

	/// Streams the generated answer, writes it back to the cache when allowed, and emits `Done`.
	/// A fault mid-stream emits a visible error chunk instead of `Done`.
	async fn answer(&self, query: &str, mode: Mode, resolution: &Resolution, sink: &EventSink) {
		let req = GenerationRequest {
			query: resolution.query.clone(),
			context: resolution.context.clone(),
			mode: resolution.mode,
		};
		let mut tokens = match self.generator.open(&req).await {
			Ok(tokens) => tokens,
			Err(err) => {
				sink.emit(StreamEvent::AnswerChunk(generation::terminal_message(&err).to_string()))
					.await;
				sink.emit(StreamEvent::Done).await;

				return;
			},
		};
		let mut answer = String::new();

		while let Some(item) = tokens.next().await {
			match item {
				Ok(token) => {
					if token.is_empty() {
						continue;
					}

					answer.push_str(&token);
					sink.emit(StreamEvent::AnswerChunk(token)).await;
					sink.pace(self.cfg.streaming.token_delay_ms).await;
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						branch = resolution.branch.as_str(),
						mode = mode.as_str(),
						"Generation stream failed."
					);

					sink.emit(StreamEvent::AnswerChunk(format!("\n\n**System Error:** {err}"))).await;

					return;
				},
			}
		}

		if resolution.is_cacheable(&answer) {
			self.cache.store(query, mode, &answer, &resolution.sources).await;
		}

		sink.emit(StreamEvent::Done).await;
	}
}
