use std::sync::Arc;

use ember_service::EmberService;
use ember_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<EmberService>,
}
impl AppState {
	pub fn new(service: Arc<EmberService>) -> Self {
		Self { service }
	}

	/// Builds the production service. Postgres is optional at startup: the pool connects lazily
	/// and a failed schema bootstrap only degrades caching and memory.
	pub async fn connect(config: ember_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect_lazy(&config.storage.postgres)?;

		if let Err(err) = db.ensure_schema(config.providers.embedding.dimensions).await {
			tracing::warn!(error = %err, "Schema bootstrap failed. Cache and memory are degraded.");
		}

		let service = EmberService::new(config, db);

		Ok(Self::new(Arc::new(service)))
	}
}
