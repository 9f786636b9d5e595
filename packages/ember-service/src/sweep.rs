use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::{EmberService, Result};

impl EmberService {
	/// Deletes cache rows whose `expires_at` has passed.
	pub async fn purge_expired_cache(&self, now: OffsetDateTime) -> Result<u64> {
		let count = self.stores.cache.purge_expired(now).await?;

		if count > 0 {
			tracing::info!(count, "Purged expired cache entries.");
		}

		Ok(count)
	}

	/// Runs [`Self::purge_expired_cache`] every `cache.sweep_interval_secs` until the task is
	/// aborted.
	pub fn spawn_cache_sweep(self: &Arc<Self>) -> JoinHandle<()> {
		let service = Arc::clone(self);
		let period = Duration::from_secs(self.cfg.cache.sweep_interval_secs);

		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(period);

			loop {
				ticker.tick().await;

				if let Err(err) = service.purge_expired_cache(OffsetDateTime::now_utc()).await {
					tracing::error!(error = %err, "Cache sweep failed.");
				}
			}
		})
	}
}
