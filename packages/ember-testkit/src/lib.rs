//! Throwaway Postgres databases for the ignored integration tests.
//!
//! Tests call [`TestDatabase::from_env`], which yields `None` when `EMBER_PG_DSN` is unset so the
//! test can skip itself. Every database is dropped with `FORCE` on cleanup, or on drop as a fallback.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection,
	postgres::{PgConnectOptions, PgConnection},
};
use uuid::Uuid;

pub const DSN_ENV: &str = "EMBER_PG_DSN";

pub struct TestDatabase {
	name: String,
	dsn: String,
	admin: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	/// Creates a database next to the one `EMBER_PG_DSN` points at. `Ok(None)` when the variable is
	/// unset.
	pub async fn from_env() -> Result<Option<Self>> {
		match env::var(DSN_ENV) {
			Ok(base_dsn) => Ok(Some(Self::create(&base_dsn).await?)),
			Err(_) => Ok(None),
		}
	}

	pub async fn create(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Invalid {DSN_ENV}: {err}.")))?;
		let (admin, mut conn) = admin_connection(&base).await?;
		let name = format!("ember_test_{}", Uuid::new_v4().simple());

		sqlx::raw_sql(&format!(r#"CREATE DATABASE "{name}""#)).execute(&mut conn).await?;
		conn.close().await?;

		let dsn = base.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, admin, dropped: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// Storage settings pointing at this database, sized for a single test.
	pub fn postgres(&self) -> ember_config::Postgres {
		ember_config::Postgres {
			dsn: self.dsn.clone(),
			pool_max_conns: 2,
			connect_timeout_ms: 3_000,
		}
	}

	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.admin, &self.name).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let admin = self.admin.clone();
		let name = std::mem::take(&mut self.name);
		// The caller may be inside a runtime, so the drop runs on its own thread and runtime.
		let worker = thread::spawn(move || {
			tokio::runtime::Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| Error::Message(err.to_string()))
				.and_then(|runtime| runtime.block_on(drop_database(&admin, &name)))
		});

		match worker.join() {
			Ok(Err(err)) => eprintln!("Test database cleanup failed: {err}."),
			Err(_) => eprintln!("Test database cleanup thread panicked."),
			Ok(Ok(())) => {},
		}
	}
}

async fn admin_connection(base: &PgConnectOptions) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in ["postgres", "template1"] {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => last_err = Some(err),
		}
	}

	Err(Error::Message(format!("No admin database is reachable: {last_err:?}.")))
}

async fn drop_database(admin: &PgConnectOptions, name: &str) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin).await?;

	sqlx::raw_sql(&format!(r#"DROP DATABASE IF EXISTS "{name}" WITH (FORCE)"#))
		.execute(&mut conn)
		.await?;
	conn.close().await?;

	Ok(())
}
