//! Rows of `answer_cache`. A row is readable up to and including its `expires_at` instant and
//! removed by [`purge_expired`] afterwards.

use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::{Result, models::CacheRow};

pub async fn fetch_cache_payload(
	pool: &PgPool,
	cache_kind: &str,
	cache_key: &str,
	now: OffsetDateTime,
) -> Result<Option<CacheRow>> {
	let row = sqlx::query_as::<_, CacheRow>(
		"\
SELECT payload, written_at
FROM answer_cache
WHERE cache_kind = $1 AND cache_key = $2 AND expires_at >= $3",
	)
	.bind(cache_kind)
	.bind(cache_key)
	.bind(now)
	.fetch_optional(pool)
	.await?;

	Ok(row)
}

pub async fn store_cache_payload(
	pool: &PgPool,
	cache_kind: &str,
	cache_key: &str,
	payload: &Value,
	written_at: OffsetDateTime,
	expires_at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO answer_cache (cache_kind, cache_key, payload, written_at, expires_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (cache_kind, cache_key) DO UPDATE
SET
	payload = EXCLUDED.payload,
	written_at = EXCLUDED.written_at,
	expires_at = EXCLUDED.expires_at",
	)
	.bind(cache_kind)
	.bind(cache_key)
	.bind(payload)
	.bind(written_at)
	.bind(expires_at)
	.execute(pool)
	.await?;

	Ok(())
}

pub async fn purge_expired(pool: &PgPool, now: OffsetDateTime) -> Result<u64> {
	let result = sqlx::query("DELETE FROM answer_cache WHERE expires_at < $1")
		.bind(now)
		.execute(pool)
		.await?;

	Ok(result.rows_affected())
}
