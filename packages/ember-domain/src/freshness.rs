use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Freshness {
	Fresh,
	Stale,
	Miss,
}
impl Freshness {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Fresh => "FRESH",
			Self::Stale => "STALE",
			Self::Miss => "MISS",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
	pub stale_after: Duration,
	pub max_ttl: Duration,
}
impl FreshnessPolicy {
	pub fn from_config(cfg: &ember_config::Cache) -> Self {
		Self {
			stale_after: Duration::seconds(cfg.stale_after_secs as i64),
			max_ttl: Duration::seconds(cfg.max_ttl_secs as i64),
		}
	}

	/// Classifies an entry by age. Both boundaries are inclusive on the younger side.
	pub fn classify(&self, written_at: OffsetDateTime, now: OffsetDateTime) -> Freshness {
		let age = now - written_at;

		if age <= self.stale_after {
			Freshness::Fresh
		} else if age <= self.max_ttl {
			Freshness::Stale
		} else {
			Freshness::Miss
		}
	}

	/// `None` when `written_at + max_ttl` leaves the representable date range.
	pub fn expires_at(&self, written_at: OffsetDateTime) -> Option<OffsetDateTime> {
		written_at.checked_add(self.max_ttl)
	}
}
