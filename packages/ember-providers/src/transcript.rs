//! Client for a JSON transcript service: `GET {path}?video_id=..&languages=..&with_metadata=..`
//! answering `{ "title": string | null, "text": string }`, or 404 when no captions match.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Transcript {
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub text: String,
}

pub async fn fetch(
	cfg: &ember_config::TranscriptProviderConfig,
	video_id: &str,
	languages: &[&str],
	with_metadata: bool,
) -> Result<Option<Transcript>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut query = vec![
		("video_id", video_id.to_string()),
		("with_metadata", with_metadata.to_string()),
	];

	if !languages.is_empty() {
		query.push(("languages", languages.join(",")));
	}

	let res = client
		.get(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.query(&query)
		.send()
		.await?;

	if res.status() == StatusCode::NOT_FOUND {
		return Ok(None);
	}

	let transcript: Transcript = crate::ensure_success(res).await?.json().await?;

	if transcript.text.trim().is_empty() {
		return Ok(None);
	}

	Ok(Some(transcript))
}
