//! OpenAI-compatible chat completions with `stream: true`.
//!
//! The response body is server-sent events: one `data: {json}` line per delta and a final
//! `data: [DONE]`. Only `choices[0].delta.content` is forwarded.

use std::{pin::Pin, time::Duration};

use futures_util::{Stream, StreamExt, stream};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
	pub role: &'static str,
	pub content: String,
}
impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: "system", content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: "user", content: content.into() }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
	pub model: String,
	pub max_tokens: u32,
	pub temperature: f32,
}

/// Opens a token stream. Errors returned here happen before any token was produced, so callers
/// may retry with another key or model; errors yielded by the stream may not be retried.
pub async fn open_stream(
	cfg: &ember_config::GenerationProviderConfig,
	api_key: &str,
	params: &GenerationParams,
	messages: &[ChatMessage],
) -> Result<TokenStream> {
	// `timeout_ms` bounds connecting and each idle gap, not the whole answer.
	let timeout = Duration::from_millis(cfg.timeout_ms);
	let client = Client::builder().connect_timeout(timeout).read_timeout(timeout).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": params.model,
		"messages": messages,
		"max_tokens": params.max_tokens,
		"temperature": params.temperature,
		"stream": true,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let res = crate::ensure_success(res).await?;
	let bytes = Box::pin(res.bytes_stream());
	let batches = stream::unfold((bytes, SseDecoder::default()), |(mut bytes, mut decoder)| async move {
		if decoder.finished {
			return None;
		}

		loop {
			match bytes.next().await {
				Some(Ok(chunk)) => {
					let batch = decoder.push(&chunk);

					if batch.is_empty() && !decoder.finished {
						continue;
					}

					return Some((batch, (bytes, decoder)));
				},
				Some(Err(err)) => {
					decoder.finished = true;

					return Some((vec![Err(Error::from(err))], (bytes, decoder)));
				},
				None => {
					let batch = decoder.finish();

					return if batch.is_empty() { None } else { Some((batch, (bytes, decoder))) };
				},
			}
		}
	});

	Ok(Box::pin(batches.flat_map(stream::iter)))
}

#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
	buffer: Vec<u8>,
	pub(crate) finished: bool,
}
impl SseDecoder {
	pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Result<String>> {
		self.buffer.extend_from_slice(chunk);

		let mut out = Vec::new();

		while !self.finished {
			let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') else {
				break;
			};
			let line: Vec<u8> = self.buffer.drain(..=newline).collect();

			self.decode_line(&line, &mut out);
		}

		out
	}

	pub(crate) fn finish(&mut self) -> Vec<Result<String>> {
		let mut out = Vec::new();

		if !self.finished && !self.buffer.is_empty() {
			let line = std::mem::take(&mut self.buffer);

			self.decode_line(&line, &mut out);
		}

		self.finished = true;

		out
	}

	fn decode_line(&mut self, line: &[u8], out: &mut Vec<Result<String>>) {
		let line = String::from_utf8_lossy(line);
		let Some(payload) = line.trim().strip_prefix("data:").map(str::trim) else {
			return;
		};

		if payload.is_empty() {
			return;
		}
		if payload == "[DONE]" {
			self.finished = true;

			return;
		}

		match parse_delta(payload) {
			Ok(Some(token)) => out.push(Ok(token)),
			Ok(None) => {},
			Err(err) => {
				self.finished = true;

				out.push(Err(err));
			},
		}
	}
}

fn parse_delta(payload: &str) -> Result<Option<String>> {
	let json: Value = serde_json::from_str(payload)?;

	if let Some(message) = json.get("error").and_then(|err| err.get("message")).and_then(Value::as_str)
	{
		return Err(Error::InvalidResponse { message: format!("Stream error: {message}") });
	}

	let token = json
		.get("choices")
		.and_then(Value::as_array)
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("delta"))
		.and_then(|delta| delta.get("content"))
		.and_then(Value::as_str)
		.filter(|content| !content.is_empty())
		.map(str::to_string);

	Ok(token)
}
