use ahash::AHashSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
	Web,
	Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
	pub title: String,
	pub url: String,
	#[serde(default)]
	pub content: String,
	#[serde(rename = "score", default)]
	pub relevance_score: f32,
	pub origin: SourceOrigin,
}

/// Drops any source whose URL or title was already seen. The first occurrence wins.
pub fn dedup_sources(sources: Vec<Source>) -> Vec<Source> {
	let mut seen_urls = AHashSet::with_capacity(sources.len());
	let mut seen_titles = AHashSet::with_capacity(sources.len());
	let mut unique = Vec::with_capacity(sources.len());

	for source in sources {
		if seen_urls.contains(&source.url) || seen_titles.contains(&source.title) {
			continue;
		}

		seen_urls.insert(source.url.clone());
		seen_titles.insert(source.title.clone());
		unique.push(source);
	}

	unique
}
