pub mod cache;
pub mod generation;
pub mod pipeline;
pub mod refresh;
pub mod resolver;
pub mod suggestions;
pub mod sweep;

mod error;

pub use cache::{CachedAnswer, FreshnessCache};
pub use error::{Error, ResolveError, Result};
pub use generation::{GenerationClient, GenerationRequest, KeyOrder, TokenStream};
pub use pipeline::StreamEvent;
pub use resolver::{Branch, Resolution};

use std::{future::Future, pin::Pin, sync::Arc};

use futures_util::StreamExt;
use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;

use ember_config::{
	Config, EmbeddingProviderConfig, GenerationProviderConfig, SearchProviderConfig,
	TranscriptProviderConfig,
};
use ember_domain::video::TranscriptOptions;
use ember_providers::{
	embedding,
	generation::{self as generation_http, ChatMessage, GenerationParams},
	search::{self, SearchDepth, SearchHit},
	transcript::{self, Transcript},
};
use ember_storage::{
	db::Db,
	knowledge,
	models::{CacheRow, KnowledgeHit, NewKnowledge},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait GenerationBackend
where
	Self: Send + Sync,
{
	/// Opens a token stream. A failure here means no token was produced yet.
	fn open_stream<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		api_key: &'a str,
		params: &'a GenerationParams,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<TokenStream>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait SearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		query: &'a str,
		depth: SearchDepth,
		max_results: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>>;

	fn extract<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		url: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>>;
}

pub trait TranscriptProvider
where
	Self: Send + Sync,
{
	fn fetch<'a>(
		&'a self,
		cfg: &'a TranscriptProviderConfig,
		video_id: &'a str,
		options: &'a TranscriptOptions,
	) -> BoxFuture<'a, Result<Option<Transcript>>>;
}

pub trait CacheStore
where
	Self: Send + Sync,
{
	fn fetch<'a>(
		&'a self,
		cache_kind: &'a str,
		cache_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<CacheRow>>>;

	fn store<'a>(
		&'a self,
		cache_kind: &'a str,
		cache_key: &'a str,
		payload: &'a Value,
		written_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;

	fn purge_expired(&self, now: OffsetDateTime) -> BoxFuture<'_, Result<u64>>;
}

pub trait MemoryStore
where
	Self: Send + Sync,
{
	fn recall<'a>(
		&'a self,
		embedding: &'a [f32],
		threshold: f32,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<KnowledgeHit>>>;

	fn memorize<'a>(&'a self, rows: &'a [NewKnowledge]) -> BoxFuture<'a, Result<u64>>;
}

#[derive(Clone)]
pub struct Providers {
	pub generation: Arc<dyn GenerationBackend>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub search: Arc<dyn SearchProvider>,
	pub transcript: Arc<dyn TranscriptProvider>,
}
impl Providers {
	pub fn new(
		generation: Arc<dyn GenerationBackend>,
		embedding: Arc<dyn EmbeddingProvider>,
		search: Arc<dyn SearchProvider>,
		transcript: Arc<dyn TranscriptProvider>,
	) -> Self {
		Self { generation, embedding, search, transcript }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			generation: provider.clone(),
			embedding: provider.clone(),
			search: provider.clone(),
			transcript: provider,
		}
	}
}

#[derive(Clone)]
pub struct Stores {
	pub cache: Arc<dyn CacheStore>,
	pub memory: Arc<dyn MemoryStore>,
}
impl Stores {
	pub fn new(cache: Arc<dyn CacheStore>, memory: Arc<dyn MemoryStore>) -> Self {
		Self { cache, memory }
	}

	pub fn postgres(db: Db) -> Self {
		let store = Arc::new(PgStores { pool: db.pool });

		Self { cache: store.clone(), memory: store }
	}
}

pub struct EmberService {
	pub cfg: Config,
	pub providers: Providers,
	pub stores: Stores,
	pub cache: FreshnessCache,
	pub generator: GenerationClient,
}
impl EmberService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self::with_providers(cfg, Providers::default(), Stores::postgres(db))
	}

	pub fn with_providers(cfg: Config, providers: Providers, stores: Stores) -> Self {
		let cache = FreshnessCache::new(stores.cache.clone(), &cfg.cache);
		let generator = GenerationClient::new(
			providers.generation.clone(),
			cfg.providers.generation.clone(),
			cfg.prompts.system.clone(),
		);

		Self { cfg, providers, stores, cache, generator }
	}
}

struct DefaultProviders;
impl GenerationBackend for DefaultProviders {
	fn open_stream<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		api_key: &'a str,
		params: &'a GenerationParams,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<TokenStream>> {
		Box::pin(async move {
			let tokens = generation_http::open_stream(cfg, api_key, params, messages).await?;
			let tokens: TokenStream = Box::pin(tokens.map(|item| item.map_err(Error::from)));

			Ok(tokens)
		})
	}
}
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl SearchProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		query: &'a str,
		depth: SearchDepth,
		max_results: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(async move { Ok(search::search(cfg, query, depth, max_results).await?) })
	}

	fn extract<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		url: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(async move { Ok(search::extract(cfg, url).await?) })
	}
}
impl TranscriptProvider for DefaultProviders {
	fn fetch<'a>(
		&'a self,
		cfg: &'a TranscriptProviderConfig,
		video_id: &'a str,
		options: &'a TranscriptOptions,
	) -> BoxFuture<'a, Result<Option<Transcript>>> {
		Box::pin(async move {
			Ok(transcript::fetch(cfg, video_id, options.languages, options.with_metadata).await?)
		})
	}
}

struct PgStores {
	pool: PgPool,
}
impl CacheStore for PgStores {
	fn fetch<'a>(
		&'a self,
		cache_kind: &'a str,
		cache_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<CacheRow>>> {
		Box::pin(async move {
			Ok(ember_storage::cache::fetch_cache_payload(&self.pool, cache_kind, cache_key, now)
				.await?)
		})
	}

	fn store<'a>(
		&'a self,
		cache_kind: &'a str,
		cache_key: &'a str,
		payload: &'a Value,
		written_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			Ok(ember_storage::cache::store_cache_payload(
				&self.pool, cache_kind, cache_key, payload, written_at, expires_at,
			)
			.await?)
		})
	}

	fn purge_expired(&self, now: OffsetDateTime) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move { Ok(ember_storage::cache::purge_expired(&self.pool, now).await?) })
	}
}
impl MemoryStore for PgStores {
	fn recall<'a>(
		&'a self,
		embedding: &'a [f32],
		threshold: f32,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<KnowledgeHit>>> {
		Box::pin(async move { Ok(knowledge::recall(&self.pool, embedding, threshold, limit).await?) })
	}

	fn memorize<'a>(&'a self, rows: &'a [NewKnowledge]) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(knowledge::insert_knowledge(&self.pool, rows).await?) })
	}
}
