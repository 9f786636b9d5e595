mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, EmbeddingProviderConfig, GenerationProviderConfig, GenerationTier, Postgres,
	Prompts, Providers, Retrieval, SearchProviderConfig, Service, Storage, Streaming,
	TranscriptProviderConfig,
};

use std::{env, fs, path::Path};

/// Longest cache lifetime accepted for any entry kind: one year.
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	resolve_env_keys(&mut cfg)?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.stale_after_secs == 0 {
		return Err(Error::Validation {
			message: "cache.stale_after_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.max_ttl_secs <= cfg.cache.stale_after_secs {
		return Err(Error::Validation {
			message: "cache.max_ttl_secs must be greater than cache.stale_after_secs.".to_string(),
		});
	}
	if cfg.cache.suggestions_ttl_secs == 0 {
		return Err(Error::Validation {
			message: "cache.suggestions_ttl_secs must be greater than zero.".to_string(),
		});
	}

	for (label, ttl) in [
		("cache.max_ttl_secs", cfg.cache.max_ttl_secs),
		("cache.suggestions_ttl_secs", cfg.cache.suggestions_ttl_secs),
	] {
		if ttl > MAX_CACHE_TTL_SECS {
			return Err(Error::Validation {
				message: format!("{label} must be at most {MAX_CACHE_TTL_SECS}."),
			});
		}
	}
	if cfg.cache.sweep_interval_secs == 0 {
		return Err(Error::Validation {
			message: "cache.sweep_interval_secs must be greater than zero.".to_string(),
		});
	}

	let generation = &cfg.providers.generation;

	if generation.api_keys.is_empty() {
		return Err(Error::Validation {
			message: "providers.generation.api_keys must contain at least one key.".to_string(),
		});
	}

	for (label, model) in [
		("providers.generation.fast_model", &generation.fast_model),
		("providers.generation.deep_model", &generation.deep_model),
		("providers.embedding.model", &cfg.providers.embedding.model),
	] {
		if model.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}
	for (label, tier) in
		[("providers.generation.fast", &generation.fast), ("providers.generation.deep", &generation.deep)]
	{
		if tier.max_tokens == 0 {
			return Err(Error::Validation {
				message: format!("{label}.max_tokens must be greater than zero."),
			});
		}
		if !tier.temperature.is_finite() || !(0.0..=2.0).contains(&tier.temperature) {
			return Err(Error::Validation {
				message: format!("{label}.temperature must be in the range 0.0-2.0."),
			});
		}
	}

	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("search", &cfg.providers.search.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	let retrieval = &cfg.retrieval;

	if !retrieval.memory_threshold.is_finite() || !(0.0..=1.0).contains(&retrieval.memory_threshold)
	{
		return Err(Error::Validation {
			message: "retrieval.memory_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}

	for (label, value) in [
		("retrieval.memory_top_k", retrieval.memory_top_k),
		("retrieval.transcript_max_chars", retrieval.transcript_max_chars),
		("retrieval.fast_max_results", retrieval.fast_max_results),
		("retrieval.deep_max_results", retrieval.deep_max_results),
		("retrieval.summarize_input_chars", retrieval.summarize_input_chars),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if cfg.streaming.channel_capacity == 0 {
		return Err(Error::Validation {
			message: "streaming.channel_capacity must be greater than zero.".to_string(),
		});
	}
	if cfg.streaming.cache_chunk_chars == 0 {
		return Err(Error::Validation {
			message: "streaming.cache_chunk_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.prompts.system.trim().is_empty() {
		return Err(Error::Validation { message: "prompts.system must be non-empty.".to_string() });
	}
	if cfg.prompts.fallback_suggestions.is_empty() {
		return Err(Error::Validation {
			message: "prompts.fallback_suggestions must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn resolve_env_keys(cfg: &mut Config) -> Result<()> {
	let Some(name) = cfg.providers.generation.api_keys_env.as_deref().map(str::trim) else {
		return Ok(());
	};

	if name.is_empty() {
		return Ok(());
	}

	let raw = env::var(name).map_err(|_| Error::MissingEnv {
		field: "providers.generation.api_keys_env".to_string(),
		name: name.to_string(),
	})?;

	cfg.providers.generation.api_keys.extend(split_keys(&raw));

	Ok(())
}

fn split_keys(raw: &str) -> impl Iterator<Item = String> + '_ {
	raw.split(',').map(str::trim).filter(|key| !key.is_empty()).map(str::to_string)
}

fn normalize(cfg: &mut Config) {
	let keys = std::mem::take(&mut cfg.providers.generation.api_keys);
	let mut normalized: Vec<String> = Vec::with_capacity(keys.len());

	for key in keys {
		let key = key.trim();

		if !key.is_empty() && !normalized.iter().any(|existing| existing == key) {
			normalized.push(key.to_string());
		}
	}

	cfg.providers.generation.api_keys = normalized;

	if cfg.providers.transcript.api_key.trim().is_empty() {
		cfg.providers.transcript.api_key.clear();
	}
}
