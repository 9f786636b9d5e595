use serde_json::Value;
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct CacheRow {
	pub payload: Value,
	pub written_at: OffsetDateTime,
}

/// A passage recalled from the knowledge table together with its cosine similarity to the query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KnowledgeHit {
	pub url: String,
	pub title: String,
	pub content: String,
	pub similarity: f32,
}

#[derive(Debug, Clone)]
pub struct NewKnowledge {
	pub url: String,
	pub title: String,
	pub content: String,
	pub embedding: Vec<f32>,
}
