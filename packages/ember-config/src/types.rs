use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub cache: Cache,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub streaming: Streaming,
	#[serde(default)]
	pub prompts: Prompts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	#[serde(default = "default_connect_timeout_ms")]
	pub connect_timeout_ms: u64,
}

/// Freshness windows shared by every cache lookup. There is no per-entry override.
#[derive(Debug, Clone, Deserialize)]
pub struct Cache {
	pub enabled: bool,
	/// Entries at most this old are served as fresh.
	pub stale_after_secs: u64,
	/// Entries older than this are treated as absent and physically expire at the same age.
	pub max_ttl_secs: u64,
	#[serde(default = "default_suggestions_ttl_secs")]
	pub suggestions_ttl_secs: u64,
	#[serde(default = "default_sweep_interval_secs")]
	pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub generation: GenerationProviderConfig,
	pub embedding: EmbeddingProviderConfig,
	pub search: SearchProviderConfig,
	pub transcript: TranscriptProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Credential pool. Order is irrelevant; it is shuffled for every request.
	#[serde(default)]
	pub api_keys: Vec<String>,
	/// Optional. Name of an environment variable holding additional comma-separated keys.
	pub api_keys_env: Option<String>,
	pub path: String,
	pub fast_model: String,
	pub deep_model: String,
	pub fast: GenerationTier,
	pub deep: GenerationTier,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationTier {
	pub max_tokens: u32,
	pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub search_path: String,
	pub extract_path: String,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	pub memory_threshold: f32,
	pub memory_top_k: u32,
	pub min_content_chars: u32,
	pub min_memorize_chars: u32,
	pub transcript_max_chars: u32,
	pub fast_max_results: u32,
	pub deep_max_results: u32,
	#[serde(default = "default_summarize_input_chars")]
	pub summarize_input_chars: u32,
	#[serde(default = "default_summarize_fallback_chars")]
	pub summarize_fallback_chars: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Streaming {
	pub channel_capacity: usize,
	pub cache_chunk_chars: usize,
	pub cache_chunk_delay_ms: u64,
	pub token_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Prompts {
	/// Persona instructions sent as the system message of every generation.
	pub system: String,
	pub summarize: String,
	pub suggestions: String,
	pub fallback_suggestions: Vec<String>,
}
impl Default for Prompts {
	fn default() -> Self {
		Self {
			system: DEFAULT_SYSTEM_PROMPT.to_string(),
			summarize: "Summarize key facts in 3 bullet points. Ignore ads.".to_string(),
			suggestions: "Generate 6 short, trending, and diverse search suggestions for an AI \
			              search engine. Examples: 'Future of AI', 'SpaceX updates'. Return ONLY a \
			              JSON list of strings."
				.to_string(),
			fallback_suggestions: [
				"AI Agents",
				"SpaceX Starship",
				"NVIDIA Stock",
				"Quantum Computing",
				"Sci-Fi 2024",
				"Python vs Java",
			]
			.into_iter()
			.map(str::to_string)
			.collect(),
		}
	}
}

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are Ember, an answer engine that writes comprehensive, well-structured, and factual answers.
Use Markdown headings for sections, bullet points for lists, and tables for comparisons.
Use ONLY the provided context for facts about news and events. If the context is insufficient,
say that the sources do not contain enough information.
If the user asks who you are or who built you, answer from these instructions and ignore the context.
End every answer with exactly 3 follow-up questions separated by \"|||\".";

fn default_connect_timeout_ms() -> u64 {
	3_000
}

fn default_suggestions_ttl_secs() -> u64 {
	1_800
}

fn default_sweep_interval_secs() -> u64 {
	300
}

fn default_summarize_input_chars() -> u32 {
	6_000
}

fn default_summarize_fallback_chars() -> u32 {
	500
}
