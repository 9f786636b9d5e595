//! Stale-while-revalidate answer cache over a [`CacheStore`].
//!
//! Every fault is logged and swallowed: lookups degrade to [`Freshness::Miss`] and stores to no-ops.

use std::sync::Arc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{CacheStore, Result};
use ember_domain::{
	freshness::{Freshness, FreshnessPolicy},
	query::{self, Mode},
	source::Source,
};

pub const ANSWER_CACHE_KIND: &str = "answer";
pub const SUGGESTIONS_CACHE_KIND: &str = "suggestions";

#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnswer {
	pub answer: String,
	pub sources: Vec<Source>,
	pub written_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnswerPayload {
	answer: String,
	#[serde(default)]
	sources: Vec<Source>,
}

pub struct FreshnessCache {
	store: Arc<dyn CacheStore>,
	policy: FreshnessPolicy,
	enabled: bool,
}
impl FreshnessCache {
	pub fn new(store: Arc<dyn CacheStore>, cfg: &ember_config::Cache) -> Self {
		Self { store, policy: FreshnessPolicy::from_config(cfg), enabled: cfg.enabled }
	}

	pub fn policy(&self) -> FreshnessPolicy {
		self.policy
	}

	pub async fn lookup(&self, query: &str, mode: Mode) -> (Option<CachedAnswer>, Freshness) {
		self.lookup_at(query, mode, OffsetDateTime::now_utc()).await
	}

	pub async fn lookup_at(
		&self,
		query: &str,
		mode: Mode,
		now: OffsetDateTime,
	) -> (Option<CachedAnswer>, Freshness) {
		if !self.enabled {
			return (None, Freshness::Miss);
		}

		let key = match answer_cache_key(query, mode) {
			Ok(key) => key,
			Err(err) => {
				tracing::warn!(error = %err, "Cache key build failed.");

				return (None, Freshness::Miss);
			},
		};
		let Some((payload, written_at)) =
			self.fetch_json::<AnswerPayload>(ANSWER_CACHE_KIND, &key, now).await
		else {
			return (None, Freshness::Miss);
		};
		let freshness = self.policy.classify(written_at, now);

		tracing::info!(
			cache_kind = ANSWER_CACHE_KIND,
			cache_key_prefix = cache_key_prefix(&key),
			mode = mode.as_str(),
			freshness = freshness.as_str(),
			"Cache hit."
		);

		if freshness == Freshness::Miss {
			return (None, Freshness::Miss);
		}

		let entry = CachedAnswer { answer: payload.answer, sources: payload.sources, written_at };

		(Some(entry), freshness)
	}

	/// Overwrites the entry for `(mode, query)`. Last writer wins.
	pub async fn store(&self, query: &str, mode: Mode, answer: &str, sources: &[Source]) {
		self.store_at(query, mode, answer, sources, OffsetDateTime::now_utc()).await
	}

	pub async fn store_at(
		&self,
		query: &str,
		mode: Mode,
		answer: &str,
		sources: &[Source],
		written_at: OffsetDateTime,
	) {
		if !self.enabled {
			return;
		}

		let key = match answer_cache_key(query, mode) {
			Ok(key) => key,
			Err(err) => {
				tracing::warn!(error = %err, "Cache key build failed.");

				return;
			},
		};
		let Some(expires_at) = self.policy.expires_at(written_at) else {
			tracing::warn!(
				cache_key_prefix = cache_key_prefix(&key),
				"Cache expiry is out of range. Skipping write."
			);

			return;
		};
		let payload = AnswerPayload { answer: answer.to_string(), sources: sources.to_vec() };

		self.store_json(ANSWER_CACHE_KIND, &key, &payload, written_at, expires_at).await;
	}

	pub(crate) async fn fetch_json<T>(
		&self,
		cache_kind: &str,
		key: &str,
		now: OffsetDateTime,
	) -> Option<(T, OffsetDateTime)>
	where
		T: DeserializeOwned,
	{
		let row = match self.store.fetch(cache_kind, key, now).await {
			Ok(Some(row)) => row,
			Ok(None) => {
				tracing::debug!(
					cache_kind,
					cache_key_prefix = cache_key_prefix(key),
					"Cache miss."
				);

				return None;
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind,
					cache_key_prefix = cache_key_prefix(key),
					"Cache read failed."
				);

				return None;
			},
		};

		match serde_json::from_value(row.payload) {
			Ok(value) => Some((value, row.written_at)),
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind,
					cache_key_prefix = cache_key_prefix(key),
					"Cache payload decode failed."
				);

				None
			},
		}
	}

	pub(crate) async fn store_json<T>(
		&self,
		cache_kind: &str,
		key: &str,
		payload: &T,
		written_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) where
		T: Serialize,
	{
		let payload = match serde_json::to_value(payload) {
			Ok(value) => value,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind,
					cache_key_prefix = cache_key_prefix(key),
					"Cache payload encode failed."
				);

				return;
			},
		};

		match self.store.store(cache_kind, key, &payload, written_at, expires_at).await {
			Ok(()) => tracing::info!(
				cache_kind,
				cache_key_prefix = cache_key_prefix(key),
				"Cache stored."
			),
			Err(err) => tracing::warn!(
				error = %err,
				cache_kind,
				cache_key_prefix = cache_key_prefix(key),
				"Cache write failed."
			),
		}
	}
}

pub fn answer_cache_key(query: &str, mode: Mode) -> Result<String> {
	hash_cache_key(&serde_json::json!({
		"kind": ANSWER_CACHE_KIND,
		"mode": mode.as_str(),
		"query": query::normalize_query(query),
	}))
}

pub fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload)?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}
