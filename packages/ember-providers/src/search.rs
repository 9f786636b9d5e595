//! Tavily-compatible web search and page extraction.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDepth {
	Basic,
	Advanced,
}
impl SearchDepth {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Basic => "basic",
			Self::Advanced => "advanced",
		}
	}
}

/// One search result. Missing or `null` fields read as empty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
	#[serde(default, deserialize_with = "null_as_default")]
	pub title: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub url: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub content: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub score: f32,
}

pub async fn search(
	cfg: &ember_config::SearchProviderConfig,
	query: &str,
	depth: SearchDepth,
	max_results: u32,
) -> Result<Vec<SearchHit>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.search_path);
	let body = serde_json::json!({
		"query": query,
		"search_depth": depth.as_str(),
		"max_results": max_results,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = crate::ensure_success(res).await?.json().await?;

	parse_search_response(json)
}

/// Fetches the full readable text of a page. `Ok(None)` means the provider could not extract it.
pub async fn extract(cfg: &ember_config::SearchProviderConfig, page_url: &str) -> Result<Option<String>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.extract_path);
	let body = serde_json::json!({ "urls": [page_url] });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = crate::ensure_success(res).await?.json().await?;

	parse_extract_response(json, page_url)
}

fn parse_search_response(json: Value) -> Result<Vec<SearchHit>> {
	let Some(results) = json.get("results").and_then(Value::as_array) else {
		return Err(Error::InvalidResponse {
			message: "Search response is missing results array.".to_string(),
		});
	};

	// A malformed entry is skipped so the rest of the page survives.
	let hits = results
		.iter()
		.filter_map(|item| SearchHit::deserialize(item).ok())
		.filter(|hit| !hit.url.is_empty())
		.collect();

	Ok(hits)
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn parse_extract_response(json: Value, page_url: &str) -> Result<Option<String>> {
	let results = json.get("results").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: "Extract response is missing results array.".to_string() }
	})?;
	let text = results
		.iter()
		.find(|item| item.get("url").and_then(Value::as_str) == Some(page_url))
		.or_else(|| results.first())
		.and_then(|item| item.get("raw_content"))
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|text| !text.is_empty())
		.map(str::to_string);

	Ok(text)
}
