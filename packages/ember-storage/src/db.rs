use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, schema};

#[derive(Clone)]
pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &ember_config::Postgres) -> Result<Self> {
		let pool = pool_options(cfg).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	/// Builds the pool without opening a connection. Queries fail individually while the
	/// database is unreachable and recover once it comes back.
	pub fn connect_lazy(cfg: &ember_config::Postgres) -> Result<Self> {
		let pool = pool_options(cfg).connect_lazy(&cfg.dsn)?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self, vector_dim: u32) -> Result<()> {
		let sql = schema::render_schema(vector_dim);
		let lock_id: i64 = 7_120_115;
		// Advisory locks are held per connection; the transaction scopes it to one connection.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(lock_id).execute(&mut *tx).await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}

fn pool_options(cfg: &ember_config::Postgres) -> PgPoolOptions {
	PgPoolOptions::new()
		.max_connections(cfg.pool_max_conns)
		.acquire_timeout(Duration::from_millis(cfg.connect_timeout_ms))
}
