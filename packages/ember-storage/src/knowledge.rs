use sqlx::PgPool;
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{KnowledgeHit, NewKnowledge},
};

pub async fn insert_knowledge(pool: &PgPool, rows: &[NewKnowledge]) -> Result<u64> {
	if rows.is_empty() {
		return Ok(0);
	}

	let mut tx = pool.begin().await?;
	let mut inserted = 0;

	for row in rows {
		if row.embedding.is_empty() {
			return Err(Error::InvalidArgument(format!(
				"Knowledge row for {} has an empty embedding.",
				row.url
			)));
		}

		let vec_text = vector_to_pg(&row.embedding);

		sqlx::query(
			"\
INSERT INTO knowledge (knowledge_id, url, title, content, embedding)
VALUES ($1, $2, $3, $4, $5::text::vector)",
		)
		.bind(Uuid::new_v4())
		.bind(row.url.as_str())
		.bind(row.title.as_str())
		.bind(row.content.as_str())
		.bind(vec_text.as_str())
		.execute(&mut *tx)
		.await?;

		inserted += 1;
	}

	tx.commit().await?;

	tracing::debug!(rows = inserted, "Knowledge rows inserted.");

	Ok(inserted)
}

/// Nearest neighbours first, then the threshold. The inner `ORDER BY embedding <=> .. LIMIT` is the
/// shape the HNSW index can serve.
const RECALL_SQL: &str = "\
SELECT url, title, content, (1 - distance)::real AS similarity
FROM (
	SELECT url, title, content, created_at, embedding <=> $1::text::vector AS distance
	FROM knowledge
	ORDER BY embedding <=> $1::text::vector
	LIMIT $3
) nearest
WHERE (1 - distance)::real > $2
ORDER BY distance ASC, created_at ASC";

/// Passages whose cosine similarity to `embedding` is strictly above `threshold`, best first.
pub async fn recall(
	pool: &PgPool,
	embedding: &[f32],
	threshold: f32,
	limit: u32,
) -> Result<Vec<KnowledgeHit>> {
	if embedding.is_empty() {
		return Err(Error::InvalidArgument("Query embedding is empty.".to_string()));
	}

	let vec_text = vector_to_pg(embedding);
	let hits = sqlx::query_as::<_, KnowledgeHit>(RECALL_SQL)
		.bind(vec_text.as_str())
		.bind(threshold)
		.bind(i64::from(limit))
		.fetch_all(pool)
		.await?;

	Ok(hits)
}

pub fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}
