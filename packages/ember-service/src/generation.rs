//! Key-rotating generation client.
//!
//! Credentials are shuffled once per call. For each credential every model tier is tried in order
//! until a stream opens; a rate limit skips the remaining tiers of that credential.

use std::{pin::Pin, sync::Arc};

use futures_util::{Stream, StreamExt, stream};
use rand::seq::SliceRandom;

use crate::{Error, GenerationBackend, Result};
use ember_config::GenerationProviderConfig;
use ember_domain::query::Mode;
use ember_providers::generation::{ChatMessage, GenerationParams};

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

pub const EXHAUSTED_MESSAGE: &str = "System Error: All API keys exhausted.";
pub const MISSING_KEY_MESSAGE: &str = "Error: Generation API key missing.";

const SUMMARY_MAX_TOKENS: u32 = 200;
const SUMMARY_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
	pub query: String,
	pub context: String,
	pub mode: Mode,
}

/// Order in which the credential pool is walked on each call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyOrder {
	#[default]
	Shuffled,
	Configured,
}

pub struct GenerationClient {
	backend: Arc<dyn GenerationBackend>,
	cfg: GenerationProviderConfig,
	keys: Arc<[String]>,
	key_order: KeyOrder,
	system_prompt: String,
}
impl GenerationClient {
	pub fn new(
		backend: Arc<dyn GenerationBackend>,
		cfg: GenerationProviderConfig,
		system_prompt: String,
	) -> Self {
		let keys = cfg.api_keys.clone().into();

		Self { backend, cfg, keys, key_order: KeyOrder::default(), system_prompt }
	}

	pub fn with_key_order(mut self, key_order: KeyOrder) -> Self {
		self.key_order = key_order;

		self
	}

	/// Model tiers for `mode`, best first.
	pub fn tiers(&self, mode: Mode) -> Vec<GenerationParams> {
		let (models, tier) = match mode {
			Mode::Fast => (vec![&self.cfg.fast_model], &self.cfg.fast),
			Mode::Deep => (vec![&self.cfg.deep_model, &self.cfg.fast_model], &self.cfg.deep),
		};

		models
			.into_iter()
			.map(|model| GenerationParams {
				model: model.clone(),
				max_tokens: tier.max_tokens,
				temperature: tier.temperature,
			})
			.collect()
	}

	/// Opens the answer stream, failing only with [`Error::CredentialsMissing`] or
	/// [`Error::CredentialsExhausted`].
	pub async fn open(&self, req: &GenerationRequest) -> Result<TokenStream> {
		let messages = [
			ChatMessage::system(self.system_prompt.as_str()),
			ChatMessage::user(user_message(&req.query, &req.context)),
		];

		self.open_rotating(&messages, &self.tiers(req.mode), req.mode).await
	}

	/// Like [`Self::open`], but exhaustion becomes a single visible text fragment.
	pub async fn generate(&self, req: &GenerationRequest) -> TokenStream {
		match self.open(req).await {
			Ok(tokens) => tokens,
			Err(err) => Box::pin(stream::once(async move { Ok(terminal_message(&err).to_string()) })),
		}
	}

	/// Collects a FAST answer into one string.
	pub async fn complete(&self, query: &str, context: &str) -> Result<String> {
		let req = GenerationRequest {
			query: query.to_string(),
			context: context.to_string(),
			mode: Mode::Fast,
		};
		let tokens = self.open(&req).await?;

		collect(tokens).await
	}

	/// Condenses `text` with the summarize prompt on the fast model.
	pub async fn summarize(&self, system_prompt: &str, text: &str) -> Result<String> {
		let messages = [ChatMessage::system(system_prompt), ChatMessage::user(text)];
		let tiers = [GenerationParams {
			model: self.cfg.fast_model.clone(),
			max_tokens: SUMMARY_MAX_TOKENS,
			temperature: SUMMARY_TEMPERATURE,
		}];
		let tokens = self.open_rotating(&messages, &tiers, Mode::Fast).await?;

		collect(tokens).await
	}

	async fn open_rotating(
		&self,
		messages: &[ChatMessage],
		tiers: &[GenerationParams],
		mode: Mode,
	) -> Result<TokenStream> {
		if self.keys.is_empty() {
			tracing::error!("Generation requested without any API key.");

			return Err(Error::CredentialsMissing);
		}

		let mut keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();

		if self.key_order == KeyOrder::Shuffled {
			keys.shuffle(&mut rand::thread_rng());
		}

		let mut attempt = 0_u32;

		for key in keys {
			for params in tiers {
				attempt += 1;

				match self.backend.open_stream(&self.cfg, key, params, messages).await {
					Ok(tokens) => {
						tracing::debug!(
							attempt,
							mode = mode.as_str(),
							model = params.model.as_str(),
							key_suffix = key_suffix(key),
							"Generation stream opened."
						);

						return Ok(tokens);
					},
					Err(err) if err.is_rate_limited() => {
						tracing::warn!(
							error = %err,
							attempt,
							model = params.model.as_str(),
							key_suffix = key_suffix(key),
							"Generation key rate limited. Rotating key."
						);

						break;
					},
					Err(err) => {
						tracing::warn!(
							error = %err,
							attempt,
							model = params.model.as_str(),
							key_suffix = key_suffix(key),
							"Generation attempt failed."
						);
					},
				}
			}
		}

		tracing::error!(attempts = attempt, mode = mode.as_str(), "All generation keys exhausted.");

		Err(Error::CredentialsExhausted)
	}
}

/// The visible text for a generation failure that happened before any token.
pub fn terminal_message(err: &Error) -> &'static str {
	match err {
		Error::CredentialsMissing => MISSING_KEY_MESSAGE,
		_ => EXHAUSTED_MESSAGE,
	}
}

pub fn user_message(query: &str, context: &str) -> String {
	format!("CONTEXT:\n{context}\n\nUSER QUESTION:\n{query}")
}

async fn collect(mut tokens: TokenStream) -> Result<String> {
	let mut out = String::new();

	while let Some(token) = tokens.next().await {
		out.push_str(&token?);
	}

	Ok(out)
}

fn key_suffix(key: &str) -> String {
	let chars: Vec<char> = key.chars().collect();
	let start = chars.len().saturating_sub(4);

	chars[start..].iter().collect()
}
