use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	#[default]
	Fast,
	Deep,
}
impl Mode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Fast => "fast",
			Self::Deep => "deep",
		}
	}
}
impl fmt::Display for Mode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Mode {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_lowercase().as_str() {
			"fast" => Ok(Self::Fast),
			"deep" => Ok(Self::Deep),
			other => Err(format!("Unknown mode {other:?}; expected fast or deep.")),
		}
	}
}

/// Case-folds and trims a query so cache lookups are stable across cosmetic differences.
pub fn normalize_query(query: &str) -> String {
	query.trim().to_lowercase()
}
